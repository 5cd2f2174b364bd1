//! Concurrent quote fan-out across venues.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::error::VenueError;
use crate::metrics;
use crate::venue::gateway::VenueGateway;
use crate::venue::types::Pair;

use super::types::QuoteSet;

/// Fetch one quote per venue concurrently, each bounded by `timeout`.
///
/// Venues that error or exceed the timeout are excluded from the round and
/// logged; the round itself always succeeds with whatever subset answered.
/// A quote is either fully present or fully absent, never torn, and total
/// latency is bounded by `timeout` plus constant overhead regardless of the
/// number of venues.
#[instrument(skip(venues), fields(pair = %pair, venues = venues.len()))]
pub async fn aggregate_quotes(
    venues: &[Arc<dyn VenueGateway>],
    pair: &Pair,
    timeout: Duration,
) -> QuoteSet {
    let round_start = Instant::now();

    let requests = venues.iter().map(|venue| {
        let venue = Arc::clone(venue);
        let pair = pair.clone();
        async move {
            let start = Instant::now();
            let result = tokio::time::timeout(timeout, venue.quote(&pair)).await;
            let outcome = match result {
                Ok(Ok(quote)) => Ok(quote),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(VenueError::Timeout {
                    venue: venue.id().clone(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }),
            };
            (venue.id().clone(), outcome)
        }
    });

    let mut quotes = Vec::with_capacity(venues.len());
    let mut missing = Vec::new();

    for (venue_id, outcome) in join_all(requests).await {
        match outcome {
            Ok(quote) if quote.is_sane() => {
                debug!(venue = %venue_id, bid = %quote.bid, ask = %quote.ask, "Quote received");
                quotes.push(quote);
            }
            Ok(quote) => {
                warn!(
                    venue = %venue_id,
                    bid = %quote.bid,
                    ask = %quote.ask,
                    "Dropping degenerate quote"
                );
                metrics::inc_venue_errors(venue_id.as_str());
                missing.push(venue_id);
            }
            Err(e) => {
                warn!(venue = %venue_id, error = %e, "Venue excluded from round");
                metrics::inc_venue_errors(venue_id.as_str());
                missing.push(venue_id);
            }
        }
    }

    metrics::record_quote_round_latency(round_start);

    QuoteSet {
        pair: pair.clone(),
        quotes,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::mock::MockVenue;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn collects_quotes_from_all_responsive_venues() {
        let pair = Pair::new("BTC", "USDT");
        let a = MockVenue::new("binance").with_quote(&pair, dec!(100), dec!(101));
        let b = MockVenue::new("kucoin").with_quote(&pair, dec!(99), dec!(100));
        let venues: Vec<Arc<dyn VenueGateway>> = vec![Arc::new(a), Arc::new(b)];

        let set = aggregate_quotes(&venues, &pair, Duration::from_secs(1)).await;

        assert_eq!(set.len(), 2);
        assert!(set.missing.is_empty());
    }

    #[tokio::test]
    async fn slow_venue_is_excluded_not_fatal() {
        let pair = Pair::new("BTC", "USDT");
        let fast = MockVenue::new("binance").with_quote(&pair, dec!(100), dec!(101));
        let slow = MockVenue::new("kucoin")
            .with_quote(&pair, dec!(99), dec!(100))
            .with_latency(Duration::from_millis(500));
        let venues: Vec<Arc<dyn VenueGateway>> = vec![Arc::new(fast), Arc::new(slow)];

        let set = aggregate_quotes(&venues, &pair, Duration::from_millis(50)).await;

        assert_eq!(set.len(), 1);
        assert_eq!(set.quotes[0].venue.as_str(), "binance");
        assert_eq!(set.missing, vec![crate::venue::types::VenueId::new("kucoin")]);
    }

    #[tokio::test]
    async fn erroring_venue_is_excluded() {
        let pair = Pair::new("BTC", "USDT");
        let ok = MockVenue::new("binance").with_quote(&pair, dec!(100), dec!(101));
        let broken = MockVenue::new("gate").failing_quotes();
        let venues: Vec<Arc<dyn VenueGateway>> = vec![Arc::new(ok), Arc::new(broken)];

        let set = aggregate_quotes(&venues, &pair, Duration::from_secs(1)).await;

        assert_eq!(set.len(), 1);
        assert_eq!(set.missing.len(), 1);
    }

    #[tokio::test]
    async fn round_latency_is_bounded_by_timeout_not_venue_count() {
        let pair = Pair::new("BTC", "USDT");
        let venues: Vec<Arc<dyn VenueGateway>> = (0..8)
            .map(|i| {
                Arc::new(
                    MockVenue::new(format!("venue-{i}"))
                        .with_quote(&pair, dec!(100), dec!(101))
                        .with_latency(Duration::from_millis(40)),
                ) as Arc<dyn VenueGateway>
            })
            .collect();

        let start = Instant::now();
        let set = aggregate_quotes(&venues, &pair, Duration::from_secs(1)).await;
        let elapsed = start.elapsed();

        assert_eq!(set.len(), 8);
        // Serial fetching would take ~320ms; fan-out stays near one request.
        assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
    }
}

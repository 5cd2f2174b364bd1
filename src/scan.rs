//! The scan loop: fan out quotes, score, report, and optionally execute.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::arbitrage::{
    self, score_cross_venue, score_cycles, CostModel, Cycle, Opportunity,
};
use crate::config::Config;
use crate::error::{ExecutionError, Result};
use crate::execution::Orchestrator;
use crate::metrics;
use crate::notify::{Notifier, NotifyEvent};
use crate::quotes::{aggregate_quotes, Quote};
use crate::venue::registry::VenueRegistry;
use crate::venue::types::{Pair, VenueId};

/// Running totals exposed on the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Scan rounds completed.
    pub rounds: u64,
    /// Opportunities that cleared the reporting threshold.
    pub opportunities_found: u64,
    /// Executions handed to the orchestrator.
    pub executions_started: u64,
    /// Best profit fraction seen so far.
    pub best_profit_fraction: Option<Decimal>,
    /// When the last round finished.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_round_at: Option<OffsetDateTime>,
}

/// Drives scan rounds until shutdown.
pub struct Scanner {
    venues: Arc<VenueRegistry>,
    orchestrator: Arc<Orchestrator>,
    notifier: Arc<Notifier>,
    costs: CostModel,
    pairs: Vec<Pair>,
    cycles: Vec<Cycle>,
    stats: Arc<RwLock<ScanStats>>,
    investment: Decimal,
    min_report: Decimal,
    min_execute: Decimal,
    auto_execute: bool,
    quote_timeout: Duration,
    scan_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        venues: Arc<VenueRegistry>,
        orchestrator: Arc<Orchestrator>,
        notifier: Arc<Notifier>,
        pairs: Vec<Pair>,
        cycles: Vec<Cycle>,
        stats: Arc<RwLock<ScanStats>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let costs = CostModel::from_profiles(venues.profiles());
        Self {
            venues,
            orchestrator,
            notifier,
            costs,
            pairs,
            cycles,
            stats,
            investment: config.investment,
            min_report: config.min_report_threshold,
            min_execute: config.min_execute_threshold,
            auto_execute: config.auto_execute,
            quote_timeout: Duration::from_millis(config.quote_timeout_ms),
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            shutdown,
        }
    }

    /// Loop scan rounds on the configured interval until shutdown.
    pub async fn run(mut self) {
        info!(
            pairs = self.pairs.len(),
            cycles = self.cycles.len(),
            venues = self.venues.len(),
            auto_execute = self.auto_execute,
            "Scanner started"
        );
        let mut ticker = tokio::time::interval(self.scan_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.scan_round().await {
                        warn!(%err, "scan round failed");
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Scanner stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One complete round: quotes in, opportunities out, maybe an execution.
    #[instrument(skip(self))]
    pub async fn scan_round(&self) -> Result<Vec<Opportunity>> {
        let _timer = metrics::timer_scan_round();

        let gateways = self.venues.all();
        let rounds = join_all(
            self.pairs
                .iter()
                .map(|pair| aggregate_quotes(&gateways, pair, self.quote_timeout)),
        )
        .await;

        // Cross-venue: each pair's quote set independently.
        let mut opportunities = Vec::new();
        let mut quote_map: HashMap<(VenueId, Pair), Quote> = HashMap::new();
        for set in &rounds {
            for quote in &set.quotes {
                quote_map.insert((quote.venue.clone(), quote.pair.clone()), quote.clone());
            }
            let cross =
                score_cross_venue(set, &self.costs, self.investment, self.min_report)?;
            opportunities.extend(cross);
        }

        // Cyclic: every pre-built cycle against this round's quotes.
        let cyclic = score_cycles(
            &self.cycles,
            &quote_map,
            &self.costs,
            self.investment,
            self.min_report,
        )?;
        opportunities.extend(cyclic);
        arbitrage::rank(&mut opportunities);

        for opportunity in &opportunities {
            metrics::inc_opportunities_detected(&opportunity.kind.to_string());
            info!(
                kind = %opportunity.kind,
                path = %opportunity.path(),
                profit = %opportunity.profit_fraction,
                "opportunity"
            );
        }

        // Only the best candidate of the round goes out to the sinks.
        if let Some(best) = opportunities.first() {
            self.notifier
                .send(&NotifyEvent::OpportunityFound {
                    opportunity: best.clone(),
                })
                .await;
        }

        {
            let mut stats = self.stats.write().await;
            stats.rounds += 1;
            stats.opportunities_found += opportunities.len() as u64;
            stats.last_round_at = Some(OffsetDateTime::now_utc());
            if let Some(best) = opportunities.first() {
                if stats
                    .best_profit_fraction
                    .map_or(true, |prev| best.profit_fraction > prev)
                {
                    stats.best_profit_fraction = Some(best.profit_fraction);
                }
            }
        }

        if self.auto_execute {
            if let Some(best) = opportunities.first() {
                if best.profit_fraction > self.min_execute {
                    self.spawn_execution(best.clone()).await;
                } else {
                    debug!(
                        profit = %best.profit_fraction,
                        threshold = %self.min_execute,
                        "best opportunity below execute threshold"
                    );
                }
            }
        }

        Ok(opportunities)
    }

    /// Hand an opportunity to the orchestrator without blocking the loop.
    async fn spawn_execution(&self, opportunity: Opportunity) {
        self.stats.write().await.executions_started += 1;
        let orchestrator = Arc::clone(&self.orchestrator);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match orchestrator.execute(opportunity).await {
                Ok(execution) => {
                    notifier.send(&NotifyEvent::from_execution(execution)).await;
                }
                Err(ExecutionError::SlotBusy { asset, buy_venue, sell_venue }) => {
                    debug!(%asset, %buy_venue, %sell_venue, "execution slot busy");
                }
                Err(err) => warn!(%err, "execution rejected"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::build_triangles;
    use crate::execution::{ExecutionSettings, ExecutionSlots};
    use crate::venue::mock::MockVenue;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn config() -> Config {
        let cfg = r#"{}"#;
        let mut cfg: Config = serde_json::from_str(cfg).expect("defaults");
        cfg.auto_execute = false;
        cfg.quote_timeout_ms = 200;
        cfg
    }

    fn scanner(venues: Vec<MockVenue>, cfg: &Config, pairs: Vec<Pair>) -> Scanner {
        let mut registry = VenueRegistry::new();
        for venue in venues {
            registry.register(Arc::new(venue));
        }
        let registry = Arc::new(registry);

        let mut cycles = Vec::new();
        for gateway in registry.all() {
            cycles.extend(build_triangles(
                gateway.id(),
                &cfg.anchor_currency,
                &pairs,
            ));
        }

        let (_tx, rx) = watch::channel(false);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&registry),
            Arc::new(ExecutionSlots::new()),
            ExecutionSettings::default(),
            rx.clone(),
        ));

        Scanner::new(
            cfg,
            registry,
            orchestrator,
            Arc::new(Notifier::new()),
            pairs,
            cycles,
            Arc::new(RwLock::new(ScanStats::default())),
            rx,
        )
    }

    #[tokio::test]
    async fn round_finds_cross_venue_spread() {
        let pair = Pair::new("BTC", "USDT");
        let cheap = MockVenue::new("alpha")
            .with_quote(&pair, dec!(99.5), dec!(100))
            .with_taker_fee(dec!(0.001));
        let rich = MockVenue::new("beta")
            .with_quote(&pair, dec!(102), dec!(102.5))
            .with_taker_fee(dec!(0.001));

        let cfg = config();
        let scanner = scanner(vec![cheap, rich], &cfg, vec![pair]);

        let opportunities = scanner.scan_round().await.unwrap();

        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].buy_venue().as_str(), "alpha");
        assert_eq!(scanner.stats.read().await.rounds, 1);
        assert_eq!(scanner.stats.read().await.opportunities_found, 1);
    }

    #[tokio::test]
    async fn round_finds_cycles_alongside_spreads() {
        let btc_usdt = Pair::new("BTC", "USDT");
        let eth_btc = Pair::new("ETH", "BTC");
        let eth_usdt = Pair::new("ETH", "USDT");
        let venue = MockVenue::new("gamma")
            .with_quote(&btc_usdt, dec!(49990), dec!(50000))
            .with_quote(&eth_btc, dec!(0.0199), dec!(0.02))
            .with_quote(&eth_usdt, dec!(1050), dec!(1051))
            .with_taker_fee(dec!(0.001));

        let cfg = config();
        let scanner = scanner(
            vec![venue],
            &cfg,
            vec![btc_usdt, eth_btc, eth_usdt],
        );

        let opportunities = scanner.scan_round().await.unwrap();

        // Single venue: no cross-venue pairs, one profitable triangle.
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].profit_fraction, dec!(0.04685314895));
    }

    #[tokio::test]
    async fn quiet_market_reports_nothing() {
        let pair = Pair::new("BTC", "USDT");
        let a = MockVenue::new("alpha").with_quote(&pair, dec!(100.0), dec!(100.1));
        let b = MockVenue::new("beta").with_quote(&pair, dec!(100.0), dec!(100.1));

        let cfg = config();
        let scanner = scanner(vec![a, b], &cfg, vec![pair]);

        let opportunities = scanner.scan_round().await.unwrap();
        assert!(opportunities.is_empty());
        assert_eq!(scanner.stats.read().await.opportunities_found, 0);
    }

    #[tokio::test]
    async fn dead_venue_does_not_poison_the_round() {
        let pair = Pair::new("BTC", "USDT");
        let cheap = MockVenue::new("alpha")
            .with_quote(&pair, dec!(99.5), dec!(100))
            .with_taker_fee(dec!(0.001));
        let rich = MockVenue::new("beta")
            .with_quote(&pair, dec!(102), dec!(102.5))
            .with_taker_fee(dec!(0.001));
        let dead = MockVenue::new("gamma").failing_quotes();

        let cfg = config();
        let scanner = scanner(vec![cheap, rich, dead], &cfg, vec![pair]);

        let opportunities = scanner.scan_round().await.unwrap();
        assert_eq!(opportunities.len(), 1);
    }
}

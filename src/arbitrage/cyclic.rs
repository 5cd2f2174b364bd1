//! Cyclic (triangular) opportunity scoring on a single venue.
//!
//! A cycle starts and ends in the anchor currency. Cycles are enumerated
//! once at startup from the venue's listed pairs and validated so every
//! leg's input currency is exactly what the previous leg produced.

use std::collections::HashMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::ArbitrageError;
use crate::quotes::Quote;
use crate::venue::types::{Pair, Side, VenueId};

use super::cross::rank;
use super::types::{CostModel, Leg, Opportunity, OpportunityKind};

/// One hop of a cycle. Buying a pair consumes its quote currency and
/// produces its base; selling consumes the base and produces the quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLeg {
    pub pair: Pair,
    pub side: Side,
}

impl CycleLeg {
    fn consumes(&self) -> &str {
        match self.side {
            Side::Buy => &self.pair.quote,
            Side::Sell => &self.pair.base,
        }
    }

    fn produces(&self) -> &str {
        match self.side {
            Side::Buy => &self.pair.base,
            Side::Sell => &self.pair.quote,
        }
    }
}

/// A validated three-leg cycle on one venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub venue: VenueId,
    pub anchor: String,
    pub legs: Vec<CycleLeg>,
}

impl Cycle {
    /// Build a cycle, checking that the legs chain: the first leg consumes
    /// the anchor, each leg consumes what the previous one produced, and the
    /// last leg produces the anchor again.
    pub fn new(
        venue: VenueId,
        anchor: impl Into<String>,
        legs: Vec<CycleLeg>,
    ) -> Result<Self, ArbitrageError> {
        let anchor = anchor.into();
        let mut held = anchor.as_str();
        for leg in &legs {
            if leg.consumes() != held {
                return Err(ArbitrageError::BrokenCycle {
                    held: held.to_string(),
                    needed: leg.consumes().to_string(),
                });
            }
            held = leg.produces();
        }
        if held != anchor {
            return Err(ArbitrageError::BrokenCycle {
                held: held.to_string(),
                needed: anchor.clone(),
            });
        }
        Ok(Self {
            venue,
            anchor,
            legs,
        })
    }

    /// Currencies visited, anchor first.
    pub fn currencies(&self) -> Vec<&str> {
        let mut out = vec![self.anchor.as_str()];
        for leg in &self.legs[..self.legs.len() - 1] {
            out.push(leg.produces());
        }
        out
    }
}

/// Enumerate every valid triangle on a venue from its listed pairs.
///
/// Both orientations are covered: anchor -> B -> C -> anchor where the
/// middle hop either buys C with B or sells B for C.
pub fn build_triangles(venue: &VenueId, anchor: &str, pairs: &[Pair]) -> Vec<Cycle> {
    let mut cycles = Vec::new();

    for first in pairs {
        if first.quote != anchor {
            continue;
        }
        let mid = first.base.as_str();

        for second in pairs {
            if second == first {
                continue;
            }
            let (side, third_currency) = if second.quote == mid {
                (Side::Buy, second.base.as_str())
            } else if second.base == mid {
                (Side::Sell, second.quote.as_str())
            } else {
                continue;
            };
            if third_currency == anchor || third_currency == mid {
                continue;
            }

            let closing = Pair::new(third_currency, anchor);
            if !pairs.contains(&closing) {
                continue;
            }

            let legs = vec![
                CycleLeg {
                    pair: first.clone(),
                    side: Side::Buy,
                },
                CycleLeg {
                    pair: second.clone(),
                    side,
                },
                CycleLeg {
                    pair: closing,
                    side: Side::Sell,
                },
            ];
            match Cycle::new(venue.clone(), anchor, legs) {
                Ok(cycle) => cycles.push(cycle),
                Err(_) => continue,
            }
        }
    }

    cycles
}

/// Score a set of pre-built cycles against the latest quotes.
///
/// Cycles missing a quote for any leg are skipped silently; a venue that
/// failed this round must not poison the others. Output ranking matches the
/// cross-venue scorer.
pub fn score_cycles(
    cycles: &[Cycle],
    quotes: &HashMap<(VenueId, Pair), Quote>,
    costs: &CostModel,
    investment: Decimal,
    min_profit: Decimal,
) -> Result<Vec<Opportunity>, ArbitrageError> {
    if investment <= Decimal::ZERO {
        return Err(ArbitrageError::InvalidInvestment(investment));
    }

    let mut opportunities = Vec::new();
    for cycle in cycles {
        if let Some(opp) = score_cycle(cycle, quotes, costs, investment, min_profit) {
            opportunities.push(opp);
        }
    }

    rank(&mut opportunities);
    Ok(opportunities)
}

fn score_cycle(
    cycle: &Cycle,
    quotes: &HashMap<(VenueId, Pair), Quote>,
    costs: &CostModel,
    investment: Decimal,
    min_profit: Decimal,
) -> Option<Opportunity> {
    let mut net_yield = Decimal::ONE;
    let mut legs = Vec::with_capacity(cycle.legs.len());

    for leg in &cycle.legs {
        let quote = quotes.get(&(cycle.venue.clone(), leg.pair.clone()))?;
        if !quote.is_sane() {
            return None;
        }
        let fee = costs.taker_fee(&cycle.venue, &leg.pair);
        let (price, multiplier) = match leg.side {
            Side::Buy => (quote.ask, Decimal::ONE / quote.ask),
            Side::Sell => (quote.bid, quote.bid),
        };
        net_yield *= multiplier * (Decimal::ONE - fee);
        legs.push(Leg {
            venue: cycle.venue.clone(),
            pair: leg.pair.clone(),
            side: leg.side,
            price,
        });
    }

    let profit_fraction = net_yield - Decimal::ONE;
    if profit_fraction <= min_profit {
        return None;
    }

    Some(Opportunity {
        kind: OpportunityKind::Cyclic,
        legs,
        investment,
        expected_net: investment * net_yield,
        profit_fraction,
        transfer_minutes: None,
        detected_at: OffsetDateTime::now_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::types::VenueProfile;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn venue() -> VenueId {
        VenueId::new("binance")
    }

    fn pairs() -> Vec<Pair> {
        vec![
            Pair::new("BTC", "USDT"),
            Pair::new("ETH", "BTC"),
            Pair::new("ETH", "USDT"),
        ]
    }

    fn quote_map(entries: &[(&str, &str, Decimal, Decimal)]) -> HashMap<(VenueId, Pair), Quote> {
        entries
            .iter()
            .map(|(base, quote, bid, ask)| {
                let pair = Pair::new(*base, *quote);
                (
                    (venue(), pair.clone()),
                    Quote {
                        venue: venue(),
                        pair,
                        bid: *bid,
                        ask: *ask,
                        observed_at: OffsetDateTime::now_utc(),
                    },
                )
            })
            .collect()
    }

    fn flat_fee_model(taker: Decimal) -> CostModel {
        let profile = VenueProfile {
            id: venue(),
            taker_fee: taker,
            maker_fee: taker,
            pair_taker_fees: HashMap::new(),
            withdrawal_fees: HashMap::new(),
            transfer_minutes: HashMap::new(),
        };
        CostModel::from_profiles([&profile])
    }

    #[test]
    fn legs_must_chain_back_to_the_anchor() {
        // BTC/USDT buy then ETH/USDT sell: the second leg needs ETH but
        // the first produced BTC.
        let result = Cycle::new(
            venue(),
            "USDT",
            vec![
                CycleLeg {
                    pair: Pair::new("BTC", "USDT"),
                    side: Side::Buy,
                },
                CycleLeg {
                    pair: Pair::new("ETH", "USDT"),
                    side: Side::Sell,
                },
            ],
        );
        assert!(matches!(result, Err(ArbitrageError::BrokenCycle { .. })));
    }

    #[test]
    fn triangle_enumeration_finds_both_orientations() {
        let cycles = build_triangles(&venue(), "USDT", &pairs());

        assert_eq!(cycles.len(), 2);
        let paths: Vec<Vec<&str>> = cycles.iter().map(|c| c.currencies()).collect();
        assert!(paths.contains(&vec!["USDT", "BTC", "ETH"]));
        assert!(paths.contains(&vec!["USDT", "ETH", "BTC"]));
    }

    #[test]
    fn triangle_without_closing_pair_is_skipped() {
        let open = vec![Pair::new("BTC", "USDT"), Pair::new("ETH", "BTC")];
        assert!(build_triangles(&venue(), "USDT", &open).is_empty());
    }

    // USDT -> BTC at ask 50000 -> ETH at ask 0.02 -> USDT at bid 1050,
    // 0.1% fee per leg: gross yield 1.05, net 1.05 * 0.999^3.
    #[test]
    fn profitable_cycle_is_scored_net_of_fees() {
        let cycles = build_triangles(&venue(), "USDT", &pairs());
        let quotes = quote_map(&[
            ("BTC", "USDT", dec!(49990), dec!(50000)),
            ("ETH", "BTC", dec!(0.0199), dec!(0.02)),
            ("ETH", "USDT", dec!(1050), dec!(1051)),
        ]);
        let costs = flat_fee_model(dec!(0.001));

        let opps = score_cycles(&cycles, &quotes, &costs, dec!(1000), dec!(0.01)).unwrap();

        let forward: Vec<&Opportunity> = opps
            .iter()
            .filter(|o| o.legs[0].pair == Pair::new("BTC", "USDT"))
            .collect();
        assert_eq!(forward.len(), 1);
        let opp = forward[0];
        assert_eq!(opp.kind, OpportunityKind::Cyclic);
        assert_eq!(opp.profit_fraction, dec!(0.04685314895));
        assert_eq!(opp.expected_net, dec!(1046.85314895000));
        assert_eq!(opp.transfer_minutes, None);
    }

    #[test]
    fn balanced_books_yield_nothing_after_fees() {
        // Gross yield exactly 1.0; fees push it below any threshold.
        let cycles = build_triangles(&venue(), "USDT", &pairs());
        let quotes = quote_map(&[
            ("BTC", "USDT", dec!(50000), dec!(50000)),
            ("ETH", "BTC", dec!(0.02), dec!(0.02)),
            ("ETH", "USDT", dec!(1000), dec!(1000)),
        ]);
        let costs = flat_fee_model(dec!(0.001));

        let opps = score_cycles(&cycles, &quotes, &costs, dec!(1000), dec!(0.0)).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn missing_quote_skips_the_cycle() {
        let cycles = build_triangles(&venue(), "USDT", &pairs());
        let quotes = quote_map(&[
            ("BTC", "USDT", dec!(49990), dec!(50000)),
            ("ETH", "USDT", dec!(1050), dec!(1051)),
        ]);
        let costs = flat_fee_model(dec!(0.001));

        let opps = score_cycles(&cycles, &quotes, &costs, dec!(1000), dec!(0.0)).unwrap();
        assert!(opps.is_empty());
    }
}

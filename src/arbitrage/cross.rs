//! Cross-venue opportunity scoring.
//!
//! Pure: quotes and the cost model in, ranked opportunities out. Uses
//! top-of-book prices only; depth and slippage are deliberately not modeled
//! (a known limitation inherited from the profit model, not a bug).

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::ArbitrageError;
use crate::quotes::{Quote, QuoteSet};
use crate::venue::types::Side;

use super::types::{CostModel, Leg, Opportunity, OpportunityKind};

/// Score every ordered (buy, sell) venue pair in a quote round.
///
/// Emits an opportunity when the profit fraction exceeds `min_profit`,
/// ranked descending by profit fraction, ties broken by larger absolute
/// profit and then lexical (buy, sell) venue order.
pub fn score_cross_venue(
    quotes: &QuoteSet,
    costs: &CostModel,
    investment: Decimal,
    min_profit: Decimal,
) -> Result<Vec<Opportunity>, ArbitrageError> {
    if investment <= Decimal::ZERO {
        return Err(ArbitrageError::InvalidInvestment(investment));
    }

    let mut opportunities = Vec::new();

    for buy in &quotes.quotes {
        for sell in &quotes.quotes {
            if buy.venue == sell.venue {
                continue;
            }
            if let Some(opp) = score_venue_pair(buy, sell, costs, investment, min_profit) {
                opportunities.push(opp);
            }
        }
    }

    rank(&mut opportunities);
    Ok(opportunities)
}

/// Score one ordered (buy, sell) pair.
fn score_venue_pair(
    buy: &Quote,
    sell: &Quote,
    costs: &CostModel,
    investment: Decimal,
    min_profit: Decimal,
) -> Option<Opportunity> {
    if buy.ask <= Decimal::ZERO || sell.bid <= Decimal::ZERO {
        return None;
    }

    let asset = &buy.pair.base;
    let buy_fee = costs.taker_fee(&buy.venue, &buy.pair);
    let sell_fee = costs.taker_fee(&sell.venue, &sell.pair);
    let withdrawal_fee = costs.withdrawal_fee(&buy.venue, asset);

    let amount_bought = investment / buy.ask * (Decimal::ONE - buy_fee);
    let amount_after_transfer = amount_bought - withdrawal_fee;
    if amount_after_transfer <= Decimal::ZERO {
        return None;
    }

    let proceeds = amount_after_transfer * sell.bid * (Decimal::ONE - sell_fee);
    let profit_fraction = proceeds / investment - Decimal::ONE;

    if profit_fraction <= min_profit {
        return None;
    }

    Some(Opportunity {
        kind: OpportunityKind::CrossVenue,
        legs: vec![
            Leg {
                venue: buy.venue.clone(),
                pair: buy.pair.clone(),
                side: Side::Buy,
                price: buy.ask,
            },
            Leg {
                venue: sell.venue.clone(),
                pair: sell.pair.clone(),
                side: Side::Sell,
                price: sell.bid,
            },
        ],
        investment,
        expected_net: proceeds,
        profit_fraction,
        transfer_minutes: Some(costs.transfer_minutes(&buy.venue, &sell.venue)),
        detected_at: OffsetDateTime::now_utc(),
    })
}

/// Deterministic ranking shared by both scorers: profit fraction first,
/// absolute profit second, then lexical venue order.
pub fn rank(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.profit_fraction
            .cmp(&a.profit_fraction)
            .then_with(|| b.expected_profit().cmp(&a.expected_profit()))
            .then_with(|| a.buy_venue().cmp(b.buy_venue()))
            .then_with(|| a.sell_venue().cmp(b.sell_venue()))
    });
}

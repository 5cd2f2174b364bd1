//! End-to-end tests over mock venues: scan rounds feeding the execution
//! saga, with no network involved.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::{watch, RwLock};

use venue_arb::arbitrage::{build_triangles, Cycle, OpportunityKind};
use venue_arb::config::Config;
use venue_arb::execution::{
    ExecutionSettings, ExecutionSlots, ExecutionState, FailureReason, Orchestrator,
};
use venue_arb::notify::Notifier;
use venue_arb::scan::{ScanStats, Scanner};
use venue_arb::venue::{MockVenue, Pair, VenueRegistry};

fn test_config() -> Config {
    let mut config: Config = serde_json::from_str("{}").expect("defaults");
    config.quote_timeout_ms = 200;
    config.auto_execute = false;
    config
}

fn registry_of(venues: Vec<MockVenue>) -> Arc<VenueRegistry> {
    let mut registry = VenueRegistry::new();
    for venue in venues {
        registry.register(Arc::new(venue));
    }
    Arc::new(registry)
}

fn scanner_for(
    config: &Config,
    registry: Arc<VenueRegistry>,
    pairs: Vec<Pair>,
    cycles: Vec<Cycle>,
) -> (Scanner, Arc<Orchestrator>, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        Arc::new(ExecutionSlots::new()),
        ExecutionSettings {
            deposit_poll_interval: Duration::from_millis(10),
            deposit_timeout: Duration::from_millis(500),
            deposit_tolerance: dec!(0.01),
            dry_run: false,
        },
        rx.clone(),
    ));
    let scanner = Scanner::new(
        config,
        registry,
        Arc::clone(&orchestrator),
        Arc::new(Notifier::new()),
        pairs,
        cycles,
        Arc::new(RwLock::new(ScanStats::default())),
        rx,
    );
    (scanner, orchestrator, tx)
}

// A 2% raw spread between two venues survives fees and is both detected
// and executed, including the simulated on-chain transfer.
#[tokio::test]
async fn cross_venue_spread_detected_and_executed() {
    let pair = Pair::new("BTC", "USDT");
    let cheap = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_balance("USDT", dec!(5000))
        .with_taker_fee(dec!(0.001));
    let rich = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![cheap.clone(), rich.clone()]);
    let (scanner, orchestrator, _tx) =
        scanner_for(&config, registry, vec![pair.clone()], vec![]);

    let opportunities = scanner.scan_round().await.expect("scan round");
    assert_eq!(opportunities.len(), 1);
    let best = opportunities[0].clone();
    assert_eq!(best.kind, OpportunityKind::CrossVenue);
    assert_eq!(best.buy_venue().as_str(), "alpha");
    assert_eq!(best.sell_venue().as_str(), "beta");
    assert_eq!(best.profit_fraction, dec!(0.01796102));

    // The transfer lands while the orchestrator is polling.
    let landing = rich.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        landing.push_deposit("BTC", dec!(9.99));
    });

    let record = orchestrator.execute(best).await.expect("execution started");
    assert_eq!(record.state, ExecutionState::Completed);
    assert_eq!(record.actual_profit, Some(dec!(17.96102)));
    assert_eq!(cheap.placed_orders().len(), 1);
    assert_eq!(cheap.withdrawals().len(), 1);
    assert_eq!(rich.placed_orders().len(), 1);
}

// A profitable triangle on a single venue is detected by the same round and
// executes its three legs in order, no withdrawal involved.
#[tokio::test]
async fn triangular_cycle_detected_and_executed() {
    let btc_usdt = Pair::new("BTC", "USDT");
    let eth_btc = Pair::new("ETH", "BTC");
    let eth_usdt = Pair::new("ETH", "USDT");
    let venue = MockVenue::new("gamma")
        .with_quote(&btc_usdt, dec!(49990), dec!(50000))
        .with_quote(&eth_btc, dec!(0.0199), dec!(0.02))
        .with_quote(&eth_usdt, dec!(1050), dec!(1051))
        .with_balance("USDT", dec!(5000))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![venue.clone()]);
    let pairs = vec![btc_usdt, eth_btc, eth_usdt];
    let cycles = build_triangles(
        registry.all()[0].id(),
        &config.anchor_currency,
        &pairs,
    );
    let (scanner, orchestrator, _tx) = scanner_for(&config, registry, pairs, cycles);

    let opportunities = scanner.scan_round().await.expect("scan round");
    assert_eq!(opportunities.len(), 1);
    let best = opportunities[0].clone();
    assert_eq!(best.kind, OpportunityKind::Cyclic);
    assert_eq!(best.profit_fraction, dec!(0.04685314895));

    let record = orchestrator.execute(best).await.expect("execution started");
    assert_eq!(record.state, ExecutionState::Completed);
    assert_eq!(record.actual_profit, Some(dec!(46.85314895)));
    assert_eq!(venue.placed_orders().len(), 3);
    assert!(venue.withdrawals().is_empty());
    assert!(record.withdrawal.is_none());
}

// A venue that answers too slowly is dropped from the round; the remaining
// venues still produce a result well inside the per-venue deadline budget.
#[tokio::test]
async fn slow_venue_is_excluded_without_stalling_the_round() {
    let pair = Pair::new("BTC", "USDT");
    let fast_a = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_taker_fee(dec!(0.001));
    let fast_b = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));
    let slow = MockVenue::new("gamma")
        .with_quote(&pair, dec!(150), dec!(151))
        .with_latency(Duration::from_secs(5));

    let config = test_config();
    let registry = registry_of(vec![fast_a, fast_b, slow]);
    let (scanner, _orchestrator, _tx) = scanner_for(&config, registry, vec![pair], vec![]);

    let started = std::time::Instant::now();
    let opportunities = scanner.scan_round().await.expect("scan round");
    assert!(started.elapsed() < Duration::from_secs(2));

    // Only the (alpha, beta) spread: gamma never answered in time.
    assert_eq!(opportunities.len(), 1);
    assert_eq!(opportunities[0].sell_venue().as_str(), "beta");
}

// When the withdrawal is rejected the saga sells the stranded position back
// on the buy venue and records the reversal.
#[tokio::test]
async fn rejected_withdrawal_is_compensated() {
    let pair = Pair::new("BTC", "USDT");
    let cheap = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_balance("USDT", dec!(5000))
        .with_taker_fee(dec!(0.001))
        .failing_withdrawals();
    let rich = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![cheap.clone(), rich.clone()]);
    let (scanner, orchestrator, _tx) =
        scanner_for(&config, registry, vec![pair], vec![]);

    let opportunities = scanner.scan_round().await.expect("scan round");
    let best = opportunities[0].clone();

    let record = orchestrator.execute(best).await.expect("execution started");
    assert_eq!(record.state, ExecutionState::Failed);
    assert_eq!(record.failure, Some(FailureReason::WithdrawalRejected));
    let compensation = record.compensation.expect("reversal recorded");
    assert!(compensation.succeeded());
    assert_eq!(compensation.amount, dec!(9.99));
    // Nothing ever reached the sell venue.
    assert!(rich.placed_orders().is_empty());
}

// A first leg that only half fills is liquidated on the buy venue before
// the saga fails; the transfer never starts.
#[tokio::test]
async fn partial_first_leg_is_liquidated_on_the_buy_venue() {
    let pair = Pair::new("BTC", "USDT");
    let cheap = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_balance("USDT", dec!(5000))
        .with_taker_fee(dec!(0.001))
        .with_fill_fraction(dec!(0.5));
    let rich = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![cheap.clone(), rich.clone()]);
    let (scanner, orchestrator, _tx) =
        scanner_for(&config, registry, vec![pair], vec![]);

    let opportunities = scanner.scan_round().await.expect("scan round");
    let best = opportunities[0].clone();

    let record = orchestrator.execute(best).await.expect("execution started");
    assert_eq!(record.state, ExecutionState::Failed);
    assert_eq!(record.failure, Some(FailureReason::PartialFill { leg: 0 }));
    // Half of the 9.99 BTC buy was acquired and sold back in place.
    let compensation = record.compensation.expect("reversal recorded");
    assert_eq!(compensation.amount, dec!(4.995));
    assert!(cheap.withdrawals().is_empty());
    assert!(rich.placed_orders().is_empty());
}

// Two rounds seeing the same spread cannot run two executions at once for
// the same asset and venue pair.
#[tokio::test]
async fn concurrent_executions_share_one_slot() {
    let pair = Pair::new("BTC", "USDT");
    let cheap = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_balance("USDT", dec!(50000))
        .with_taker_fee(dec!(0.001));
    let rich = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![cheap, rich.clone()]);
    let (scanner, orchestrator, _tx) =
        scanner_for(&config, registry, vec![pair], vec![]);

    let best = scanner.scan_round().await.expect("scan round")[0].clone();

    // First execution parks on the deposit wait; the deposit lands late.
    let landing = rich.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        landing.push_deposit("BTC", dec!(9.99));
    });

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let opportunity = best.clone();
        tokio::spawn(async move { orchestrator.execute(opportunity).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = orchestrator.execute(best.clone()).await;
    assert!(second.is_err(), "second execution must be rejected");

    let record = first.await.expect("join").expect("execution started");
    assert_eq!(record.state, ExecutionState::Completed);

    // Terminal record frees the slot; a later attempt may start again.
    rich.push_deposit("BTC", dec!(9.99));
    let third = orchestrator.execute(best).await.expect("slot released");
    assert_eq!(third.state, ExecutionState::Completed);
}

// Dry-run mode reports the full saga without touching any venue.
#[tokio::test]
async fn dry_run_walks_the_saga_without_orders() {
    let pair = Pair::new("BTC", "USDT");
    let cheap = MockVenue::new("alpha")
        .with_quote(&pair, dec!(99.5), dec!(100))
        .with_balance("USDT", dec!(5000))
        .with_taker_fee(dec!(0.001));
    let rich = MockVenue::new("beta")
        .with_quote(&pair, dec!(102), dec!(102.5))
        .with_taker_fee(dec!(0.001));

    let config = test_config();
    let registry = registry_of(vec![cheap.clone(), rich]);

    let (tx, rx) = watch::channel(false);
    drop(tx);
    let orchestrator = Orchestrator::new(
        Arc::clone(&registry),
        Arc::new(ExecutionSlots::new()),
        ExecutionSettings::default(), // dry_run = true
        rx.clone(),
    );
    let scanner = Scanner::new(
        &config,
        Arc::clone(&registry),
        Arc::new(Orchestrator::new(
            registry,
            Arc::new(ExecutionSlots::new()),
            ExecutionSettings::default(),
            rx.clone(),
        )),
        Arc::new(Notifier::new()),
        vec![pair],
        vec![],
        Arc::new(RwLock::new(ScanStats::default())),
        rx,
    );

    let best = scanner.scan_round().await.expect("scan round")[0].clone();
    let record = orchestrator.execute(best).await.expect("execution started");

    assert_eq!(record.state, ExecutionState::Completed);
    assert!(record.dry_run);
    assert!(cheap.placed_orders().is_empty());
    assert!(cheap.withdrawals().is_empty());
}

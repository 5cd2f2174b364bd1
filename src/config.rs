//! Application configuration: environment variables for the engine itself,
//! plus a JSON file describing the connected venues.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::venue::types::{Pair, VenueId, VenueProfile};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Universe ===
    /// Path to the venues JSON file.
    #[serde(default = "default_venues_file")]
    pub venues_file: String,

    /// Pairs to scan, comma separated (e.g. "BTC/USDT,ETH/USDT").
    #[serde(default = "default_symbols")]
    pub symbols: String,

    /// Currency every cycle starts and ends in.
    #[serde(default = "default_anchor")]
    pub anchor_currency: String,

    // === Thresholds ===
    /// Opportunities above this fraction are reported.
    #[serde(default = "default_report_threshold")]
    pub min_report_threshold: Decimal,

    /// Opportunities above this fraction may be auto-executed.
    #[serde(default = "default_execute_threshold")]
    pub min_execute_threshold: Decimal,

    /// Investment per execution, in the quote/anchor currency.
    #[serde(default = "default_investment")]
    pub investment: Decimal,

    // === Timing ===
    /// Seconds between scan rounds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Per-venue quote deadline in milliseconds.
    #[serde(default = "default_quote_timeout")]
    pub quote_timeout_ms: u64,

    /// Give up waiting for an inter-venue deposit after this long.
    #[serde(default = "default_deposit_wait")]
    pub deposit_wait_timeout_secs: u64,

    /// Seconds between deposit-history polls.
    #[serde(default = "default_deposit_poll")]
    pub deposit_poll_secs: u64,

    // === Operation Modes ===
    /// Execute qualifying opportunities without operator action.
    #[serde(default)]
    pub auto_execute: bool,

    /// Simulation mode (no real orders or withdrawals).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    // === Notifications ===
    /// Optional webhook receiving opportunity and execution events.
    #[serde(default)]
    pub webhook_url: Option<String>,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_venues_file() -> String {
    "venues.json".to_string()
}

fn default_symbols() -> String {
    "BTC/USDT".to_string()
}

fn default_anchor() -> String {
    "USDT".to_string()
}

fn default_report_threshold() -> Decimal {
    Decimal::new(1, 2) // 1%
}

fn default_execute_threshold() -> Decimal {
    Decimal::new(2, 2) // 2%
}

fn default_investment() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_scan_interval() -> u64 {
    5
}

fn default_quote_timeout() -> u64 {
    3000
}

fn default_deposit_wait() -> u64 {
    3600
}

fn default_deposit_poll() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.investment <= Decimal::ZERO {
            return Err("INVESTMENT must be positive".to_string());
        }

        if self.min_report_threshold < Decimal::ZERO {
            return Err("MIN_REPORT_THRESHOLD must not be negative".to_string());
        }

        if self.min_execute_threshold < self.min_report_threshold {
            return Err(
                "MIN_EXECUTE_THRESHOLD must be at least MIN_REPORT_THRESHOLD".to_string(),
            );
        }

        if self.scan_interval_secs == 0 {
            return Err("SCAN_INTERVAL_SECS must be at least 1".to_string());
        }

        if self.quote_timeout_ms == 0 {
            return Err("QUOTE_TIMEOUT_MS must be at least 1".to_string());
        }

        if self.pairs().is_err() {
            return Err(format!("SYMBOLS could not be parsed: {}", self.symbols));
        }

        Ok(())
    }

    /// Parse the scanned pairs from the symbols list.
    pub fn pairs(&self) -> Result<Vec<Pair>, String> {
        self.symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Pair>().map_err(|e| e.to_string()))
            .collect()
    }
}

/// One venue's connection and fee settings, from the venues JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueSettings {
    /// Stable venue identifier.
    pub id: VenueId,

    /// REST API base URL.
    pub base_url: String,

    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,

    /// Default taker fee as a fraction.
    #[serde(default = "default_taker_fee")]
    pub taker_fee: Decimal,

    /// Default maker fee as a fraction.
    #[serde(default = "default_taker_fee")]
    pub maker_fee: Decimal,

    /// Pair-specific taker fee overrides, keyed by "BASE/QUOTE".
    #[serde(default)]
    pub pair_taker_fees: HashMap<String, Decimal>,

    /// Flat withdrawal fee per currency, in that currency.
    #[serde(default)]
    pub withdrawal_fees: HashMap<String, Decimal>,

    /// Estimated transfer time in minutes, keyed by destination venue id.
    #[serde(default)]
    pub transfer_minutes: HashMap<String, u64>,

    /// Request budget enforced by the shared limiter.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_sec: u32,
}

fn default_taker_fee() -> Decimal {
    Decimal::new(2, 3) // 0.2%
}

fn default_rate_limit() -> u32 {
    10
}

impl VenueSettings {
    /// Build the immutable profile handed to gateways and the cost model.
    pub fn profile(&self) -> VenueProfile {
        let pair_taker_fees = self
            .pair_taker_fees
            .iter()
            .filter_map(|(key, fee)| {
                key.parse::<Pair>().ok().map(|pair| (pair.to_string(), *fee))
            })
            .collect();
        VenueProfile {
            id: self.id.clone(),
            taker_fee: self.taker_fee,
            maker_fee: self.maker_fee,
            pair_taker_fees,
            withdrawal_fees: self.withdrawal_fees.clone(),
            transfer_minutes: self
                .transfer_minutes
                .iter()
                .map(|(venue, minutes)| (VenueId::new(venue.as_str()), *minutes))
                .collect(),
        }
    }
}

/// Read and parse the venues file.
pub fn load_venues(path: impl AsRef<Path>) -> crate::error::Result<Vec<VenueSettings>> {
    let raw = std::fs::read_to_string(path)?;
    let venues: Vec<VenueSettings> = serde_json::from_str(&raw)?;
    Ok(venues)
}

//! REST venue gateway over a generic spot-exchange HTTP API.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::config::VenueSettings;
use crate::error::VenueError;
use crate::quotes::Quote;

use super::gateway::VenueGateway;
use super::types::{
    DepositAddress, DepositRecord, DepositStatus, OrderFill, OrderStatus, Pair, Side, VenueId,
    VenueProfile, WithdrawalId,
};

/// HTTP-backed venue gateway.
#[derive(Debug, Clone)]
pub struct RestVenue {
    id: VenueId,
    profile: VenueProfile,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    bid: Decimal,
    ask: Decimal,
    /// Unix epoch milliseconds.
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    free: Decimal,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(alias = "orderId", alias = "order_id", alias = "id")]
    order_id: String,
    filled: Decimal,
    avg_price: Decimal,
    status: OrderStatus,
}

#[derive(Debug, Deserialize)]
struct DepositAddressResponse {
    address: String,
    tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct WithdrawRequest<'a> {
    currency: &'a str,
    amount: Decimal,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    #[serde(alias = "withdrawalId", alias = "id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct DepositEntry {
    amount: Decimal,
    status: DepositStatus,
    /// Unix epoch milliseconds.
    timestamp: i64,
}

impl RestVenue {
    /// Build a gateway from venue settings, with a latency-tuned HTTP client.
    pub fn new(settings: &VenueSettings, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(500))
            // Disable Nagle's algorithm for low-latency small requests.
            .tcp_nodelay(true)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()?;

        Ok(Self {
            id: settings.id.clone(),
            profile: settings.profile(),
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn symbol(pair: &Pair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    /// Venues answer in the same dashed spelling requests use; a few spell
    /// BASE/QUOTE, so both separators are accepted.
    fn parse_symbol(symbol: &str) -> Result<Pair, String> {
        symbol.replace('-', "/").parse::<Pair>()
    }

    fn map_transport_error(&self, e: reqwest::Error) -> VenueError {
        if e.is_timeout() {
            VenueError::Timeout {
                venue: self.id.clone(),
                elapsed_ms: 0,
            }
        } else {
            VenueError::Network {
                venue: self.id.clone(),
                reason: e.to_string(),
            }
        }
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, VenueError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 429 {
            return Err(VenueError::RateLimited {
                venue: self.id.clone(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(VenueError::Network {
            venue: self.id.clone(),
            reason: format!("HTTP {status}: {body}"),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, VenueError> {
        let response = self
            .http
            .get(self.url(path))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| VenueError::MalformedResponse {
                venue: self.id.clone(),
                reason: e.to_string(),
            })
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, VenueError> {
        let response = self
            .http
            .post(self.url(path))
            .header("X-API-KEY", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| VenueError::MalformedResponse {
                venue: self.id.clone(),
                reason: e.to_string(),
            })
    }

    fn millis_to_time(&self, millis: i64) -> Result<OffsetDateTime, VenueError> {
        OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).map_err(|e| {
            VenueError::MalformedResponse {
                venue: self.id.clone(),
                reason: format!("bad timestamp {millis}: {e}"),
            }
        })
    }
}

#[async_trait]
impl VenueGateway for RestVenue {
    fn id(&self) -> &VenueId {
        &self.id
    }

    fn profile(&self) -> &VenueProfile {
        &self.profile
    }

    #[instrument(skip(self), fields(venue = %self.id, pair = %pair))]
    async fn quote(&self, pair: &Pair) -> Result<Quote, VenueError> {
        let ticker: TickerResponse = self
            .get_json(&format!("/api/v1/ticker?symbol={}", Self::symbol(pair)))
            .await?;

        Ok(Quote {
            venue: self.id.clone(),
            pair: pair.clone(),
            bid: ticker.bid,
            ask: ticker.ask,
            observed_at: self.millis_to_time(ticker.timestamp)?,
        })
    }

    #[instrument(skip(self), fields(venue = %self.id))]
    async fn balance(&self, currency: &str) -> Result<Decimal, VenueError> {
        let balance: BalanceResponse = self
            .get_json(&format!("/api/v1/balance/{currency}"))
            .await?;
        Ok(balance.free)
    }

    #[instrument(skip(self), fields(venue = %self.id, pair = %pair, side = %side))]
    async fn place_market_order(
        &self,
        pair: &Pair,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderFill, VenueError> {
        debug!(amount = %amount, "Placing market order");

        let request = OrderRequest {
            symbol: Self::symbol(pair),
            side: match side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            },
            order_type: "market",
            amount,
        };

        let order: OrderResponse = self.post_json("/api/v1/order", &request).await?;

        Ok(OrderFill {
            order_id: order.order_id,
            filled_amount: order.filled,
            avg_price: order.avg_price,
            status: order.status,
        })
    }

    #[instrument(skip(self), fields(venue = %self.id))]
    async fn deposit_address(&self, currency: &str) -> Result<DepositAddress, VenueError> {
        let response: DepositAddressResponse = self
            .get_json(&format!("/api/v1/deposit-address/{currency}"))
            .await?;
        Ok(DepositAddress {
            address: response.address,
            tag: response.tag,
        })
    }

    #[instrument(skip(self, address), fields(venue = %self.id, currency = %currency))]
    async fn withdraw(
        &self,
        currency: &str,
        amount: Decimal,
        address: &DepositAddress,
    ) -> Result<WithdrawalId, VenueError> {
        let request = WithdrawRequest {
            currency,
            amount,
            address: &address.address,
            tag: address.tag.as_deref(),
        };

        let response: WithdrawResponse = self.post_json("/api/v1/withdraw", &request).await?;
        Ok(WithdrawalId(response.id))
    }

    #[instrument(skip(self), fields(venue = %self.id))]
    async fn recent_deposits(&self, currency: &str) -> Result<Vec<DepositRecord>, VenueError> {
        let entries: Vec<DepositEntry> = self
            .get_json(&format!("/api/v1/deposits/{currency}"))
            .await?;

        entries
            .into_iter()
            .map(|e| {
                Ok(DepositRecord {
                    amount: e.amount,
                    status: e.status,
                    timestamp: self.millis_to_time(e.timestamp)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(venue = %self.id))]
    async fn list_pairs(&self) -> Result<Vec<Pair>, VenueError> {
        let symbols: Vec<String> = self.get_json("/api/v1/pairs").await?;

        symbols
            .iter()
            .map(|s| {
                Self::parse_symbol(s).map_err(|reason| VenueError::MalformedResponse {
                    venue: self.id.clone(),
                    reason,
                })
            })
            .collect()
    }
}

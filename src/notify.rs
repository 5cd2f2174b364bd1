//! Outbound notifications for detected opportunities and execution outcomes.
//!
//! Delivery is best effort: a sink that fails is logged and skipped, it
//! never stalls or aborts a scan round.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::arbitrage::Opportunity;
use crate::error::Result;
use crate::execution::Execution;

/// Something worth telling the operator about.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// An opportunity cleared the reporting threshold.
    OpportunityFound { opportunity: Opportunity },
    /// An execution ran to completion.
    ExecutionCompleted { execution: Execution },
    /// An execution ended in a failure state.
    ExecutionFailed { execution: Execution },
}

impl NotifyEvent {
    /// Wrap a terminal execution in the matching event.
    pub fn from_execution(execution: Execution) -> Self {
        if execution.failure.is_some() {
            NotifyEvent::ExecutionFailed { execution }
        } else {
            NotifyEvent::ExecutionCompleted { execution }
        }
    }

    /// One-line summary used by the log sink.
    pub fn summary(&self) -> String {
        match self {
            NotifyEvent::OpportunityFound { opportunity } => format!(
                "{} opportunity {:.4}% via {}",
                opportunity.kind,
                opportunity.profit_fraction * rust_decimal::Decimal::ONE_HUNDRED,
                opportunity.path()
            ),
            NotifyEvent::ExecutionFailed { execution } => {
                let reason = execution
                    .failure
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                format!(
                    "execution {} on {}: {}",
                    execution.state,
                    execution.opportunity.path(),
                    reason
                )
            }
            NotifyEvent::ExecutionCompleted { execution } => format!(
                "execution {} on {}, profit {:?}",
                execution.state,
                execution.opportunity.path(),
                execution.actual_profit
            ),
        }
    }
}

/// Delivery target for [`NotifyEvent`]s.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotifyEvent) -> Result<()>;
}

/// Fans events out to every configured sink, swallowing per-sink failures.
#[derive(Default)]
pub struct Notifier {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Deliver to all sinks. Failures are logged and do not propagate.
    pub async fn send(&self, event: &NotifyEvent) {
        for sink in &self.sinks {
            if let Err(err) = sink.deliver(event).await {
                warn!(%err, "notification delivery failed");
            }
        }
    }
}

/// Writes events to the structured log. Always succeeds.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, event: &NotifyEvent) -> Result<()> {
        info!(notification = %event.summary());
        Ok(())
    }
}

/// POSTs events as JSON to a configured webhook.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, event: &NotifyEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

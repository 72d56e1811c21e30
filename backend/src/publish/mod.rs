pub mod store_sqlx;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::info;

use crate::quotes::FixQuote;

/// Sink for the fix quote batch produced by each fixing.
///
/// Called exactly once per fixing. Implementations own any retry policy;
/// the fixing manager never retries.
#[async_trait]
pub trait FixQuotePublisher: Send + Sync {
    async fn publish(&self, quotes: &[FixQuote]) -> Result<()>;
}

/// Emits the batch as a JSON log event.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl FixQuotePublisher for LogPublisher {
    async fn publish(&self, quotes: &[FixQuote]) -> Result<()> {
        let payload = serde_json::to_string(quotes)?;
        info!(target: "fix_quotes", count = quotes.len(), %payload, "fix quotes published");
        Ok(())
    }
}

/// Publishes to every sink; fails if any sink failed, after all were attempted.
#[derive(Clone, Default)]
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn FixQuotePublisher>>,
}

impl FanoutPublisher {
    pub fn new(sinks: Vec<Arc<dyn FixQuotePublisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl FixQuotePublisher for FanoutPublisher {
    async fn publish(&self, quotes: &[FixQuote]) -> Result<()> {
        let results = join_all(self.sinks.iter().map(|s| s.publish(quotes))).await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| format!("{e:#}")))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} of {} sinks failed: {}",
                failures.len(),
                self.sinks.len(),
                failures.join("; ")
            ))
        }
    }
}

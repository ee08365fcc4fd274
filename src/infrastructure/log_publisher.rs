use crate::domain::ports::Publisher;
use crate::error::Result;
use async_trait::async_trait;

/// Publisher that only logs deliveries. Used when no broker is configured.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, payload: &str, channel: &str, key: Option<&str>) -> Result<()> {
        tracing::info!(channel, key, bytes = payload.len(), "publish");
        Ok(())
    }
}

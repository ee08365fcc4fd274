use crate::domain::ports::Publisher;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the outbox file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboxRecord {
    pub channel: String,
    pub key: Option<String>,
    pub payload: String,
    pub published_at: DateTime<Utc>,
}

/// Appends every delivery as a JSON line to a file.
///
/// Lines are written under a mutex so concurrent deliveries never interleave.
pub struct OutboxFilePublisher {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutboxFilePublisher {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Publisher for OutboxFilePublisher {
    async fn publish(&self, payload: &str, channel: &str, key: Option<&str>) -> Result<()> {
        let record = OutboxRecord {
            channel: channel.to_string(),
            key: key.map(str::to_string),
            payload: payload.to_string(),
            published_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(channel, key, "appended to outbox {}", self.path.display());
        Ok(())
    }
}

use crate::domain::message::{AuditRecord, DedupEntry, DuplicateRecord, LedgerEntry};
use crate::domain::ports::{AuditRepository, Publisher};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

#[derive(Default)]
struct AuditTables {
    primary: Vec<AuditRecord>,
    /// valid message id -> index into `primary`
    captured: HashMap<String, usize>,
    ledger: Vec<LedgerEntry>,
    duplicates: Vec<DuplicateRecord>,
    /// valid message id -> highest version
    versions: HashMap<String, u32>,
}

/// A thread-safe in-memory audit store.
///
/// All tables live behind one `RwLock`, so every write, including the
/// primary + ledger pair, is a single atomic transaction.
#[derive(Clone)]
pub struct InMemoryAuditRepository {
    tables: Arc<RwLock<AuditTables>>,
    ledger_available: Arc<AtomicBool>,
}

impl Default for InMemoryAuditRepository {
    fn default() -> Self {
        Self {
            tables: Arc::default(),
            ledger_available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryAuditRepository {
    /// Creates a new, empty in-memory audit store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage of the ledger table.
    pub fn set_ledger_available(&self, available: bool) {
        self.ledger_available.store(available, Ordering::SeqCst);
    }

    pub async fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.tables.read().await.ledger.clone()
    }

    pub async fn duplicates(&self) -> Vec<DuplicateRecord> {
        self.tables.read().await.duplicates.clone()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn find_latest_by_message_id(&self, message_id: &str) -> Result<Option<DedupEntry>> {
        let tables = self.tables.read().await;
        let Some(&index) = tables.captured.get(message_id) else {
            return Ok(None);
        };
        let entry = tables.primary[index].entry();
        Ok(Some(DedupEntry {
            message_id: entry.message_id.clone(),
            source: entry.source.clone(),
            target: entry.target.clone(),
            version: tables
                .versions
                .get(message_id)
                .copied()
                .unwrap_or(entry.version),
            original_record_id: entry.id,
        }))
    }

    async fn insert_versioned_duplicate(&self, record: DuplicateRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(&latest) = tables.versions.get(&record.message_id) else {
            return Err(GatewayError::Persistence(format!(
                "no original capture for {}",
                record.message_id
            )));
        };
        if record.version != latest + 1 {
            return Err(GatewayError::VersionConflict {
                message_id: record.message_id,
                expected: latest + 1,
                actual: record.version,
            });
        }
        tables.versions.insert(record.message_id.clone(), record.version);
        tables.duplicates.push(record);
        Ok(())
    }

    async fn insert_audit_record(
        &self,
        record: AuditRecord,
        ledger: Option<LedgerEntry>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let entry = record.entry();
        if !entry.invalid && tables.captured.contains_key(&entry.message_id) {
            return Err(GatewayError::AlreadyCaptured(entry.message_id.clone()));
        }
        if ledger.is_some() && !self.ledger_available.load(Ordering::SeqCst) {
            return Err(GatewayError::Persistence("ledger table unavailable".to_string()));
        }

        if !entry.invalid {
            let index = tables.primary.len();
            tables.captured.insert(entry.message_id.clone(), index);
            tables.versions.insert(entry.message_id.clone(), entry.version);
        }
        tables.primary.push(record);
        tables.ledger.extend(ledger);
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<AuditRecord>> {
        Ok(self.tables.read().await.primary.clone())
    }
}

/// One delivery captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub channel: String,
    pub key: Option<String>,
    pub payload: String,
}

/// Publisher that keeps every delivery in memory.
#[derive(Default, Clone)]
pub struct InMemoryPublisher {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    failing_channels: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish to `channel` fail.
    pub fn fail_channel(&self, channel: &str) {
        self.failing_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string());
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, payload: &str, channel: &str, key: Option<&str>) -> Result<()> {
        let failing = self
            .failing_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel);
        if failing {
            return Err(GatewayError::Publish {
                channel: channel.to_string(),
                reason: "channel unavailable".to_string(),
            });
        }

        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                channel: channel.to_string(),
                key: key.map(str::to_string),
                payload: payload.to_string(),
            });
        Ok(())
    }
}

use super::message::{AuditRecord, DedupEntry, DuplicateRecord, LedgerEntry};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable store for audit records and dedup versions.
///
/// Implementations must enforce two uniqueness rules so that concurrent
/// writers across processes cannot corrupt the trail:
/// a valid (non-invalid) message id is captured at most once, and a
/// duplicate version is accepted only if it is exactly `latest + 1`.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Latest capture state for a valid message id, including duplicate versions.
    async fn find_latest_by_message_id(&self, message_id: &str) -> Result<Option<DedupEntry>>;

    /// Records a resubmission. Fails with `VersionConflict` if another writer got there first.
    async fn insert_versioned_duplicate(&self, record: DuplicateRecord) -> Result<()>;

    /// Writes the primary record and, when given, the ledger row in one transaction.
    async fn insert_audit_record(
        &self,
        record: AuditRecord,
        ledger: Option<LedgerEntry>,
    ) -> Result<()>;

    /// Every primary record in insertion order.
    async fn all_records(&self) -> Result<Vec<AuditRecord>>;
}

/// Delivery of a payload to a named channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: &str, channel: &str, key: Option<&str>) -> Result<()>;
}

pub type AuditRepositoryRef = Arc<dyn AuditRepository>;
pub type PublisherRef = Arc<dyn Publisher>;

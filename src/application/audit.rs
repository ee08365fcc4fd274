use crate::config::GatewayConfig;
use crate::domain::message::{
    AuditEntry, AuditRecord, Category, LedgerEntry, MessageHeader, RecordStatus,
};
use crate::domain::ports::AuditRepositoryRef;
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Persists the single audit record of a pipeline run.
///
/// Persistence errors are returned to the caller unchanged: a message that
/// could not be audited must not be published.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: AuditRepositoryRef,
    config: Arc<GatewayConfig>,
}

impl AuditRecorder {
    pub fn new(repository: AuditRepositoryRef, config: Arc<GatewayConfig>) -> Self {
        Self { repository, config }
    }

    pub async fn record(
        &self,
        header: &MessageHeader,
        original_request: &str,
        transformed: serde_json::Value,
        invalid: bool,
    ) -> Result<AuditRecord> {
        let record = build_record(header, original_request, transformed, invalid);
        let ledger = self
            .config
            .requires_ledger(&header.message_type)
            .then(|| LedgerEntry {
                record_id: record.entry().id,
                message_id: header.message_id.clone(),
                message_type: header.message_type.clone(),
                target: header.target.clone(),
                batch_id: header.batch_id.clone(),
                recorded_at: record.entry().created_at,
            });
        let with_ledger = ledger.is_some();

        if let Err(e) = self
            .repository
            .insert_audit_record(record.clone(), ledger)
            .await
        {
            error!(message_id = %header.message_id, error = %e, "audit write failed");
            return Err(e);
        }

        debug!(
            message_id = %header.message_id,
            category = %header.category,
            invalid,
            with_ledger,
            "audit record captured"
        );
        Ok(record)
    }
}

fn build_record(
    header: &MessageHeader,
    original_request: &str,
    transformed: serde_json::Value,
    invalid: bool,
) -> AuditRecord {
    let now = Utc::now();
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        message_id: header.message_id.clone(),
        message_type: header.message_type.clone(),
        source: header.source.clone(),
        target: header.target.clone(),
        original_request: original_request.to_string(),
        transformed,
        invalid,
        status: if invalid {
            RecordStatus::Rejected
        } else {
            RecordStatus::Received
        },
        version: 1,
        created_at: now,
        modified_at: now,
    };

    match header.category {
        Category::Payment => AuditRecord::Payment {
            entry,
            batch_id: header.batch_id.clone(),
            direction: header.direction,
        },
        Category::Administrative => AuditRecord::Administrative {
            entry,
            reference: header.batch_id.clone(),
        },
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A decoded inbound message split at the first `<`.
///
/// `preamble` is whatever upstream systems put in front of the XML and is
/// forwarded unchanged. `body` is the sanitized XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub preamble: String,
    pub body: String,
}

impl InboundMessage {
    /// The full message as it is audited and published.
    pub fn original(&self) -> String {
        let mut original = String::with_capacity(self.preamble.len() + self.body.len());
        original.push_str(&self.preamble);
        original.push_str(&self.body);
        original
    }
}

/// Structural family of an audit record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Payment,
    Administrative,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Payment => write!(f, "payment"),
            Category::Administrative => write!(f, "administrative"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    #[default]
    Inbound,
    Outbound,
}

/// Routing metadata derived from the document and the routing table.
///
/// Embedded into both the audit record and the published projection.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct MessageHeader {
    pub message_id: String,
    pub message_type: String,
    pub source: String,
    pub target: String,
    pub direction: FlowDirection,
    pub category: Category,
    pub batch_id: Option<String>,
    pub invalid: bool,
    /// `AppHdr/PssblDplct` as sent by the originator.
    pub possible_duplicate: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Received,
    Rejected,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Received => write!(f, "RECEIVED"),
            RecordStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Fields shared by both audit record shapes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    pub message_id: String,
    pub message_type: String,
    pub source: String,
    pub target: String,
    pub original_request: String,
    pub transformed: serde_json::Value,
    pub invalid: bool,
    pub status: RecordStatus,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// The durable "we have seen this message" marker.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum AuditRecord {
    Payment {
        #[serde(flatten)]
        entry: AuditEntry,
        batch_id: Option<String>,
        direction: FlowDirection,
    },
    Administrative {
        #[serde(flatten)]
        entry: AuditEntry,
        reference: Option<String>,
    },
}

impl AuditRecord {
    pub fn entry(&self) -> &AuditEntry {
        match self {
            AuditRecord::Payment { entry, .. } | AuditRecord::Administrative { entry, .. } => entry,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            AuditRecord::Payment { .. } => Category::Payment,
            AuditRecord::Administrative { .. } => Category::Administrative,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.entry().message_id
    }
}

/// Secondary ledger row written in the same transaction as the primary record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LedgerEntry {
    pub record_id: Uuid,
    pub message_id: String,
    pub message_type: String,
    pub target: String,
    pub batch_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Latest known capture state of a business message id.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DedupEntry {
    pub message_id: String,
    pub source: String,
    pub target: String,
    pub version: u32,
    pub original_record_id: Uuid,
}

/// Side record marking one resubmission of an already captured message.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DuplicateRecord {
    pub message_id: String,
    pub source: String,
    pub target: String,
    pub version: u32,
    pub original_record_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl DuplicateRecord {
    /// The next version after `latest`.
    pub fn next_after(latest: &DedupEntry) -> Self {
        Self {
            message_id: latest.message_id.clone(),
            source: latest.source.clone(),
            target: latest.target.clone(),
            version: latest.version + 1,
            original_record_id: latest.original_record_id,
            recorded_at: Utc::now(),
        }
    }
}

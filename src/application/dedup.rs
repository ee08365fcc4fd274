use crate::domain::message::DuplicateRecord;
use crate::domain::ports::AuditRepositoryRef;
use crate::error::{GatewayError, Result};
use tracing::{debug, warn};

const MAX_VERSION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    New,
    Duplicate { version: u32 },
}

/// Detects resubmissions of an already captured business message id.
///
/// Callers serialize `check` and the following audit write per message id;
/// the repository's version constraint covers writers in other processes.
#[derive(Clone)]
pub struct DedupChecker {
    repository: AuditRepositoryRef,
}

impl DedupChecker {
    pub fn new(repository: AuditRepositoryRef) -> Self {
        Self { repository }
    }

    pub async fn check(&self, message_id: &str) -> Result<DedupDecision> {
        for attempt in 1..=MAX_VERSION_ATTEMPTS {
            let Some(latest) = self.repository.find_latest_by_message_id(message_id).await? else {
                return Ok(DedupDecision::New);
            };

            let duplicate = DuplicateRecord::next_after(&latest);
            let version = duplicate.version;
            match self.repository.insert_versioned_duplicate(duplicate).await {
                Ok(()) => {
                    debug!(message_id, version, "duplicate version recorded");
                    return Ok(DedupDecision::Duplicate { version });
                }
                Err(GatewayError::VersionConflict { .. }) if attempt < MAX_VERSION_ATTEMPTS => {
                    warn!(message_id, attempt, "concurrent duplicate write, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::Persistence(format!(
            "could not record duplicate of {message_id} after {MAX_VERSION_ATTEMPTS} attempts"
        )))
    }
}

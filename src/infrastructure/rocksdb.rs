use crate::domain::message::{AuditRecord, DedupEntry, DuplicateRecord, LedgerEntry};
use crate::domain::ports::AuditRepository;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for primary audit records, keyed by insertion sequence.
pub const CF_AUDIT: &str = "audit";
/// Column Family mapping a valid message id to its primary record key.
pub const CF_CAPTURED: &str = "captured";
/// Column Family for the secondary ledger.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for duplicate versions, keyed by message id and version.
pub const CF_DUPLICATES: &str = "duplicates";
/// Column Family holding the latest version per message id.
pub const CF_VERSIONS: &str = "versions";

const SEQUENCE_KEY: &[u8] = b"__sequence";

/// A persistent audit store using RocksDB.
///
/// Every write goes through a single `WriteBatch`, so a primary record and its
/// ledger row are committed together. Writers are serialized by `write_lock`,
/// which makes the read-check-write of captures and versions atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbAuditRepository {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbAuditRepository {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_AUDIT, CF_CAPTURED, CF_LEDGER, CF_DUPLICATES, CF_VERSIONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| GatewayError::Persistence(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn latest_version(&self, message_id: &str) -> Result<Option<u32>> {
        self.db
            .get_cf(self.cf(CF_VERSIONS)?, message_id.as_bytes())?
            .map(|bytes| decode_u32(&bytes))
            .transpose()
    }

    fn next_sequence(&self) -> Result<u64> {
        let current = match self.db.get_cf(self.cf(CF_AUDIT)?, SEQUENCE_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    GatewayError::Persistence("corrupt audit sequence".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        Ok(current + 1)
    }

    /// Ledger rows in key order.
    pub fn ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
        self.scan(CF_LEDGER)
    }

    /// Duplicate version rows in key order.
    pub fn duplicates(&self) -> Result<Vec<DuplicateRecord>> {
        self.scan(CF_DUPLICATES)
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (key, value) = item?;
            if key.as_ref() == SEQUENCE_KEY {
                continue;
            }
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| GatewayError::Persistence("corrupt version value".to_string()))?;
    Ok(u32::from_be_bytes(raw))
}

fn duplicate_key(message_id: &str, version: u32) -> Vec<u8> {
    let mut key = message_id.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

#[async_trait]
impl AuditRepository for RocksDbAuditRepository {
    async fn find_latest_by_message_id(&self, message_id: &str) -> Result<Option<DedupEntry>> {
        let Some(record_key) = self.db.get_cf(self.cf(CF_CAPTURED)?, message_id.as_bytes())? else {
            return Ok(None);
        };
        let record: AuditRecord = self
            .get_json(CF_AUDIT, &record_key)?
            .ok_or_else(|| GatewayError::Persistence(format!("dangling capture for {message_id}")))?;
        let entry = record.entry();

        Ok(Some(DedupEntry {
            message_id: entry.message_id.clone(),
            source: entry.source.clone(),
            target: entry.target.clone(),
            version: self.latest_version(message_id)?.unwrap_or(entry.version),
            original_record_id: entry.id,
        }))
    }

    async fn insert_versioned_duplicate(&self, record: DuplicateRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let Some(latest) = self.latest_version(&record.message_id)? else {
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

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_DUPLICATES)?,
            duplicate_key(&record.message_id, record.version),
            to_json(&record)?,
        );
        batch.put_cf(
            self.cf(CF_VERSIONS)?,
            record.message_id.as_bytes(),
            record.version.to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn insert_audit_record(
        &self,
        record: AuditRecord,
        ledger: Option<LedgerEntry>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let entry = record.entry();
        let captured = self.cf(CF_CAPTURED)?;
        if !entry.invalid && self.db.get_pinned_cf(captured, entry.message_id.as_bytes())?.is_some() {
            return Err(GatewayError::AlreadyCaptured(entry.message_id.clone()));
        }

        let sequence = self.next_sequence()?;
        let record_key = sequence.to_be_bytes();
        let audit = self.cf(CF_AUDIT)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(audit, record_key, to_json(&record)?);
        batch.put_cf(audit, SEQUENCE_KEY, sequence.to_be_bytes());
        if !entry.invalid {
            batch.put_cf(captured, entry.message_id.as_bytes(), record_key);
            batch.put_cf(
                self.cf(CF_VERSIONS)?,
                entry.message_id.as_bytes(),
                entry.version.to_be_bytes(),
            );
        }
        if let Some(ledger) = &ledger {
            batch.put_cf(self.cf(CF_LEDGER)?, entry.id.as_bytes(), to_json(ledger)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn all_records(&self) -> Result<Vec<AuditRecord>> {
        self.scan(CF_AUDIT)
    }
}

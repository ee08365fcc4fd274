use crate::domain::message::{AuditRecord, Category, RecordStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AuditRow<'a> {
    message_id: &'a str,
    message_type: &'a str,
    source: &'a str,
    target: &'a str,
    category: Category,
    invalid: bool,
    status: RecordStatus,
    version: u32,
}

/// Writes the audit trail as CSV.
pub struct AuditWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AuditWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    /// Writes one row per record. `latest_version` supplies the dedup
    /// version, which may be ahead of the record's own.
    pub fn write_records<F>(&mut self, records: &[AuditRecord], latest_version: F) -> Result<()>
    where
        F: Fn(&AuditRecord) -> u32,
    {
        for record in records {
            let entry = record.entry();
            self.writer.serialize(AuditRow {
                message_id: &entry.message_id,
                message_type: &entry.message_type,
                source: &entry.source,
                target: &entry.target,
                category: record.category(),
                invalid: entry.invalid,
                status: entry.status,
                version: latest_version(record),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{AuditEntry, FlowDirection};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_writes_header_and_rows() {
        let now = Utc::now();
        let record = AuditRecord::Payment {
            entry: AuditEntry {
                id: Uuid::new_v4(),
                message_id: "ID1".into(),
                message_type: "pacs.008.001.09".into(),
                source: "BANKAAAA".into(),
                target: "P1".into(),
                original_request: "<Doc/>".into(),
                transformed: serde_json::json!({}),
                invalid: false,
                status: RecordStatus::Received,
                version: 1,
                created_at: now,
                modified_at: now,
            },
            batch_id: None,
            direction: FlowDirection::Inbound,
        };

        let mut out = Vec::new();
        AuditWriter::new(&mut out)
            .write_records(&[record], |_| 2)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("message_id,message_type,source,target,category,invalid,status,version")
        );
        assert_eq!(
            lines.next(),
            Some("ID1,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,2")
        );
    }
}

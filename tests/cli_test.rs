use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

mod common;

fn config_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(common::CONFIG_YAML.as_bytes()).unwrap();
    file
}

fn requests_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_file();
    let requests = requests_file(&[
        common::request_line(&common::pacs008("ID1", "B1")),
        common::request_line(&common::pacs008("ID2", "B1")),
        common::request_line(&common::pacs008("ID1", "B1")),
    ]);

    let mut cmd = Command::new(cargo_bin!("iso20022-gateway"));
    cmd.arg(requests.path()).arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "message_id,message_type,source,target,category,invalid,status,version",
        ))
        // ID1 was resubmitted once
        .stdout(predicate::str::contains(
            "ID1,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,2",
        ))
        .stdout(predicate::str::contains(
            "ID2,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,1",
        ));

    Ok(())
}

#[test]
fn test_cli_reports_error_routed_and_dropped_messages() {
    let config = config_file();
    let requests = requests_file(&[
        common::request_line("<Envelope><BizMsgIdr>BAD-1</BizMsgIdr><MsgDefIdr>pacs.008"),
        common::request_line("<Doc><unknown"),
    ]);

    let mut cmd = Command::new(cargo_bin!("iso20022-gateway"));
    cmd.arg(requests.path()).arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "BAD-1,pacs.008.001.09,UNKNOWN,P1,payment,true,REJECTED,1",
        ))
        .stderr(predicate::str::contains("Line 2: message dropped"));
}

#[test]
fn test_cli_writes_outbox() {
    let config = config_file();
    let requests = requests_file(&[common::request_line(&common::pacs008("ID1", "B1"))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = dir.path().join("outbox.jsonl");

    let mut cmd = Command::new(cargo_bin!("iso20022-gateway"));
    cmd.arg(requests.path())
        .arg("--config")
        .arg(config.path())
        .arg("--outbox")
        .arg(&outbox);
    cmd.assert().success();

    let contents = std::fs::read_to_string(&outbox).unwrap();
    let records: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["channel"], "T1");
    assert_eq!(records[1]["channel"], "payments.tracking");
    assert_eq!(records[0]["key"], "B1");
}

#[test]
fn test_cli_rejects_invalid_config() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "request_timeout_ms: 0").unwrap();
    let requests = requests_file(&[]);

    let mut cmd = Command::new(cargo_bin!("iso20022-gateway"));
    cmd.arg(requests.path()).arg("--config").arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("timeouts must be positive"));
}

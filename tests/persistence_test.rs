#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

mod common;

fn run(db_path: &std::path::Path, config: &std::path::Path, lines: &[String]) -> String {
    let mut requests = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(requests, "{line}").unwrap();
    }

    let output = Command::new(cargo_bin!("iso20022-gateway"))
        .arg(requests.path())
        .arg("--config")
        .arg(config)
        .arg("--db-path")
        .arg(db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let config = dir.path().join("gateway.yaml");
    std::fs::write(&config, common::CONFIG_YAML).unwrap();

    // 1. First run: capture ID1
    let stdout1 = run(
        &db_path,
        &config,
        &[common::request_line(&common::pacs008("ID1", "B1"))],
    );
    assert!(stdout1.contains("ID1,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,1"));

    // 2. Second run: the same message is now a duplicate of the stored capture
    let stdout2 = run(
        &db_path,
        &config,
        &[
            common::request_line(&common::pacs008("ID1", "B1")),
            common::request_line(&common::pacs008("ID2", "B1")),
        ],
    );
    assert!(stdout2.contains("ID1,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,2"));
    assert!(stdout2.contains("ID2,pacs.008.001.09,BANKAAAA,P1,payment,false,RECEIVED,1"));
    assert_eq!(stdout2.matches("ID1,").count(), 1);
}

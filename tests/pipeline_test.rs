use iso20022_gateway::application::gateway::{PipelineOutcome, PipelineState, PublishReport};
use iso20022_gateway::config::GatewayConfig;
use iso20022_gateway::domain::message::{AuditRecord, RecordStatus};
use iso20022_gateway::domain::ports::AuditRepository;
use iso20022_gateway::domain::routing::RoutingRule;

mod common;

#[tokio::test]
async fn test_minimal_document_scenario() {
    let mut config = GatewayConfig::default();
    config.routes.insert(
        "pacs.008.001.09".into(),
        RoutingRule {
            processor: "P1".into(),
            channel: "T1".into(),
            category: None,
            direction: Default::default(),
        },
    );
    let (gateway, repo, publisher) = common::gateway(config);
    let xml = "<Doc><AppHdr><MsgDefIdr>pacs.008.001.09</MsgDefIdr><BizMsgIdr>ID1</BizMsgIdr></AppHdr></Doc>";

    let outcome = gateway.handle(xml).await.unwrap();
    assert_eq!(outcome.terminal_state(), PipelineState::Published);
    gateway.drain_publishes().await;

    let records = repo.all_records().await.unwrap();
    assert_eq!(records.len(), 1);
    let entry = records[0].entry();
    assert_eq!(entry.message_id, "ID1");
    assert_eq!(entry.target, "P1");
    assert!(!entry.invalid);
    assert_eq!(entry.version, 1);

    let published = publisher.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].channel, "T1");
    assert_eq!(published[1].channel, "payments.tracking");
    assert_eq!(published[0].key, None);

    // Resubmission: version 2, no new primary record, nothing published.
    let outcome = gateway.handle(xml).await.unwrap();
    assert_eq!(gateway.drain_publishes().await, PublishReport::default());
    assert_eq!(
        outcome,
        PipelineOutcome::Duplicate {
            message_id: "ID1".into(),
            version: 2
        }
    );
    assert_eq!(repo.all_records().await.unwrap(), records);
    assert_eq!(repo.duplicates().await[0].version, 2);
    assert_eq!(publisher.published().len(), 2);
}

#[tokio::test]
async fn test_valid_message_header_matches_document() {
    let (gateway, repo, publisher) = common::gateway(common::config());
    let xml = common::pacs008("MSG-100", "BATCH-9");

    let outcome = gateway.handle(&xml).await.unwrap();

    let PipelineOutcome::Published { header, channel, scheduled } = outcome else {
        panic!("expected published outcome");
    };
    assert_eq!(header.message_id, "MSG-100");
    assert_eq!(header.message_type, "pacs.008.001.09");
    assert_eq!(header.source, "BANKAAAA");
    assert_eq!(header.batch_id.as_deref(), Some("BATCH-9"));
    assert_eq!(channel, "T1");
    assert_eq!(scheduled, 2);
    assert_eq!(
        gateway.drain_publishes().await,
        PublishReport { delivered: 2, failed: 0 }
    );

    let published = publisher.published();
    assert!(published.iter().all(|p| p.key.as_deref() == Some("BATCH-9")));
    assert!(published.iter().all(|p| p.payload == xml));

    let records = repo.all_records().await.unwrap();
    let AuditRecord::Payment { entry, batch_id, .. } = &records[0] else {
        panic!("expected payment record");
    };
    assert_eq!(batch_id.as_deref(), Some("BATCH-9"));
    assert_eq!(entry.status, RecordStatus::Received);
    assert_eq!(entry.transformed["meta"]["message_id"], "MSG-100");
    assert_eq!(
        entry.transformed["body"]["Document"]["FIToFICstmrCdtTrf"]["GrpHdr"]["MsgId"],
        "BATCH-9"
    );

    // pacs.008 is allow-listed for the ledger.
    assert_eq!(repo.ledger_entries().await.len(), 1);
}

#[tokio::test]
async fn test_preamble_is_forwarded_unchanged() {
    let (gateway, repo, publisher) = common::gateway(common::config());
    let text = format!("\u{feff}{{1:F01BANKAAAAXXXX}}{}", common::pacs008("MSG-1", "B1"));

    gateway.handle(&text).await.unwrap();
    gateway.drain_publishes().await;

    let expected = text.trim_start_matches('\u{feff}');
    assert_eq!(publisher.published()[0].payload, expected);
    assert_eq!(repo.all_records().await.unwrap()[0].entry().original_request, expected);
}

#[tokio::test]
async fn test_administrative_type_uses_administrative_shape() {
    let (gateway, repo, publisher) = common::gateway(common::config());
    let xml = "<Envelope><AppHdr><MsgDefIdr>admi.002.001.01</MsgDefIdr><BizMsgIdr>ADM-1</BizMsgIdr></AppHdr>\
               <Document><admi.002.001.01><RltdRef><Ref>X</Ref></RltdRef></admi.002.001.01></Document></Envelope>";

    gateway.handle(xml).await.unwrap();
    gateway.drain_publishes().await;

    let records = repo.all_records().await.unwrap();
    assert!(matches!(records[0], AuditRecord::Administrative { reference: None, .. }));
    assert!(repo.ledger_entries().await.is_empty());
    assert_eq!(publisher.published()[0].channel, "admin.in");
}

#[tokio::test]
async fn test_malformed_with_keyword_is_error_routed() {
    let (gateway, repo, publisher) = common::gateway(common::config());
    let raw = "<Envelope><AppHdr><MsgDefIdr>pacs.008.001.09</MsgDefIdr><BizMsgIdr>BAD-1</BizMsgIdr>";

    let outcome = gateway.handle(raw).await.unwrap();

    let PipelineOutcome::ErrorRouted { header, channel, scheduled } = outcome else {
        panic!("expected error routed outcome");
    };
    assert!(header.invalid);
    assert_eq!(header.message_id, "BAD-1");
    assert_eq!(channel, "payments.error");
    assert_eq!(scheduled, 1);
    assert_eq!(gateway.drain_publishes().await.delivered, 1);

    let records = repo.all_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].entry().invalid);
    assert_eq!(records[0].entry().status, RecordStatus::Rejected);

    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channel, "payments.error");
    assert_eq!(published[0].key.as_deref(), Some("BAD-1"));
    let payload: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
    assert_eq!(payload["meta"]["invalid"], true);
}

#[tokio::test]
async fn test_unrouted_type_is_error_routed() {
    let (gateway, repo, publisher) = common::gateway(common::config());
    let xml = "<Doc><AppHdr><MsgDefIdr>pacs.004.001.09</MsgDefIdr><BizMsgIdr>R-1</BizMsgIdr></AppHdr></Doc>";

    let outcome = gateway.handle(xml).await.unwrap();
    gateway.drain_publishes().await;

    assert!(matches!(outcome, PipelineOutcome::ErrorRouted { .. }));
    assert_eq!(repo.all_records().await.unwrap().len(), 1);
    assert_eq!(publisher.published()[0].channel, "payments.error");
}

#[tokio::test]
async fn test_malformed_without_keyword_is_dropped() {
    let (gateway, repo, publisher) = common::gateway(common::config());

    let outcome = gateway.handle("<Doc><camt.056 unterminated").await.unwrap();
    gateway.drain_publishes().await;

    assert_eq!(outcome.terminal_state(), PipelineState::Dropped);
    assert!(repo.all_records().await.unwrap().is_empty());
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn test_empty_body_is_dropped() {
    let (gateway, repo, _) = common::gateway(common::config());
    let outcome = gateway.handle("no markup here").await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Dropped { .. }));
    assert!(repo.all_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_record_does_not_block_later_valid_capture() {
    let (gateway, repo, _) = common::gateway(common::config());
    gateway
        .handle("<Envelope><BizMsgIdr>MSG-5</BizMsgIdr><MsgDefIdr>pacs.008")
        .await
        .unwrap();

    let outcome = gateway.handle(&common::pacs008("MSG-5", "B")).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Published { .. }));
    assert_eq!(repo.all_records().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_process_request_decodes_base64() {
    let (gateway, repo, _) = common::gateway(common::config());
    let line = common::request_line(&common::pacs008("MSG-2", "B2"));

    gateway.process_request(&line).await.unwrap();

    assert_eq!(repo.all_records().await.unwrap()[0].message_id(), "MSG-2");
}

#[tokio::test]
async fn test_envelope_defects_fail_the_request() {
    let (gateway, repo, _) = common::gateway(common::config());

    assert!(gateway.process_request("{\"other\": 1}").await.is_err());
    assert!(gateway.process_request("{\"data_base64\": \"%%%\"}").await.is_err());
    assert!(repo.all_records().await.unwrap().is_empty());
}

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use iso20022_gateway::application::gateway::MessageGateway;
use iso20022_gateway::config::GatewayConfig;
use iso20022_gateway::infrastructure::in_memory::{InMemoryAuditRepository, InMemoryPublisher};
use std::sync::Arc;

pub const CONFIG_YAML: &str = r#"
routes:
  pacs.008.001.09:
    processor: P1
    channel: T1
  admi.002.001.01:
    processor: ADMIN
    channel: admin.in
batch_id_paths:
  pacs.008.001.09: "//GrpHdr/MsgId"
  admi.002.001.01: ""
error_rules:
  - keyword: admi
    message_type: admi.002.001.01
    target: ADMIN
    channel: admin.error
    category: administrative
  - keyword: pacs
    message_type: pacs.008.001.09
    target: P1
    channel: payments.error
ledger_message_types:
  - pacs.008.001.09
tracking_channel: payments.tracking
"#;

pub fn config() -> GatewayConfig {
    GatewayConfig::from_yaml_str(CONFIG_YAML).expect("test config is valid")
}

pub fn gateway(
    config: GatewayConfig,
) -> (MessageGateway, Arc<InMemoryAuditRepository>, Arc<InMemoryPublisher>) {
    let repo = Arc::new(InMemoryAuditRepository::new());
    let publisher = Arc::new(InMemoryPublisher::new());
    let gateway = MessageGateway::new(Arc::new(config), repo.clone(), publisher.clone())
        .expect("gateway builds");
    (gateway, repo, publisher)
}

/// A pacs.008 envelope with an application header and a group header.
pub fn pacs008(message_id: &str, batch_id: &str) -> String {
    format!(
        "<Envelope>\
           <AppHdr xmlns=\"urn:iso:std:iso:20022:tech:xsd:head.001.001.02\">\
             <Fr><FIId><FinInstnId><BICFI>BANKAAAA</BICFI></FinInstnId></FIId></Fr>\
             <MsgDefIdr>pacs.008.001.09</MsgDefIdr>\
             <BizMsgIdr>{message_id}</BizMsgIdr>\
           </AppHdr>\
           <Document xmlns=\"urn:iso:std:iso:20022:tech:xsd:pacs.008.001.09\">\
             <FIToFICstmrCdtTrf><GrpHdr><MsgId>{batch_id}</MsgId></GrpHdr></FIToFICstmrCdtTrf>\
           </Document>\
         </Envelope>"
    )
}

pub fn request_line(text: &str) -> String {
    serde_json::json!({ "data_base64": STANDARD.encode(text) }).to_string()
}

//! Header/body JSON projection of a message.

use crate::domain::message::MessageHeader;
use roxmltree::{Document, Node};
use serde_json::{Map, Value, json};

const APP_HEADER: &str = "AppHdr";
const DOCUMENT: &str = "Document";

/// `{"meta", "header", "body"}` for a parsed document.
///
/// `header` is the `AppHdr` element (or null); `body` is the `Document`
/// element, falling back to the root element.
pub fn project(header: &MessageHeader, doc: &Document<'_>) -> Value {
    let app_header = find_element(doc, APP_HEADER).map(element_to_json);
    let body_node = find_element(doc, DOCUMENT).unwrap_or_else(|| doc.root_element());
    let mut body = Map::new();
    body.insert(body_node.tag_name().name().to_string(), element_to_json(body_node));

    json!({
        "meta": header,
        "header": app_header,
        "body": body,
    })
}

/// Projection of text that could not be parsed.
pub fn project_raw(header: &MessageHeader, raw: &str) -> Value {
    json!({
        "meta": header,
        "header": Value::Null,
        "body": { "raw": raw },
    })
}

fn find_element<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Option<Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Attributes become `@name`, repeated children become arrays and a
/// text-only element becomes a string.
fn element_to_json(node: Node<'_, '_>) -> Value {
    let mut map = Map::new();
    for attr in node.attributes() {
        map.insert(format!("@{}", attr.name()), Value::String(attr.value().to_string()));
    }

    let mut has_children = false;
    for child in node.children().filter(Node::is_element) {
        has_children = true;
        let key = child.tag_name().name().to_string();
        let value = element_to_json(child);
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }

    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();

    if !has_children && map.is_empty() {
        return Value::String(text.to_string());
    }
    if !text.is_empty() {
        map.insert("#text".to_string(), Value::String(text.to_string()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{Category, FlowDirection};

    fn header() -> MessageHeader {
        MessageHeader {
            message_id: "ID1".into(),
            message_type: "pacs.008.001.09".into(),
            source: "BANKAAAA".into(),
            target: "P1".into(),
            direction: FlowDirection::Inbound,
            category: Category::Payment,
            batch_id: None,
            invalid: false,
            possible_duplicate: false,
        }
    }

    #[test]
    fn test_projects_header_and_body() {
        let xml = r#"<Envelope><AppHdr><BizMsgIdr>ID1</BizMsgIdr></AppHdr>
            <Document><CdtTrfTxInf><Amt Ccy="EUR">10.00</Amt></CdtTrfTxInf><CdtTrfTxInf><Amt Ccy="USD">5</Amt></CdtTrfTxInf></Document></Envelope>"#;
        let doc = Document::parse(xml).unwrap();
        let value = project(&header(), &doc);

        assert_eq!(value["meta"]["message_id"], "ID1");
        assert_eq!(value["header"]["BizMsgIdr"], "ID1");
        let txs = &value["body"]["Document"]["CdtTrfTxInf"];
        assert_eq!(txs.as_array().unwrap().len(), 2);
        assert_eq!(txs[0]["Amt"]["@Ccy"], "EUR");
        assert_eq!(txs[0]["Amt"]["#text"], "10.00");
    }

    #[test]
    fn test_body_falls_back_to_root() {
        let doc = Document::parse("<Doc><AppHdr><X>1</X></AppHdr></Doc>").unwrap();
        let value = project(&header(), &doc);
        assert_eq!(value["body"]["Doc"]["AppHdr"]["X"], "1");
    }

    #[test]
    fn test_raw_projection() {
        let value = project_raw(&header(), "<broken");
        assert_eq!(value["header"], Value::Null);
        assert_eq!(value["body"]["raw"], "<broken");
    }
}

//! Fallback path for messages that cannot be parsed or classified.

use super::audit::AuditRecorder;
use super::projection;
use super::resolver::RoutingResolver;
use crate::config::GatewayConfig;
use crate::domain::message::{FlowDirection, MessageHeader};
use crate::error::Result;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{error, warn};
use uuid::Uuid;

static MESSAGE_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<(?:[\w.-]+:)?BizMsgIdr[^>]*>\s*([^<\s]+)").ok());

static SENDER_BIC: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<(?:[\w.-]+:)?BICFI[^>]*>\s*([A-Za-z0-9]{8,11})\s*<").ok());

/// Why a message left the regular pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationMiss {
    ParseFailure(String),
    MissingMessageType,
    MissingMessageId { message_type: String },
    NoRoute { message_type: String },
}

impl fmt::Display for ClassificationMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMiss::ParseFailure(reason) => write!(f, "parse failure: {reason}"),
            ClassificationMiss::MissingMessageType => write!(f, "message type not found"),
            ClassificationMiss::MissingMessageId { message_type } => {
                write!(f, "business message id not found in {message_type}")
            }
            ClassificationMiss::NoRoute { message_type } => {
                write!(f, "no route for {message_type}")
            }
        }
    }
}

/// Result of error routing: either audited and ready to publish, or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDisposition {
    Routed {
        header: MessageHeader,
        channel: String,
        payload: String,
    },
    Dropped,
}

pub struct ErrorRouter {
    resolver: RoutingResolver,
    audit: AuditRecorder,
    config: Arc<GatewayConfig>,
}

impl ErrorRouter {
    pub fn new(resolver: RoutingResolver, audit: AuditRecorder, config: Arc<GatewayConfig>) -> Self {
        Self {
            resolver,
            audit,
            config,
        }
    }

    /// Classifies `raw` by keyword and audits it as invalid.
    ///
    /// Messages matching no keyword are dropped without an audit record.
    pub async fn route(&self, raw: &str, miss: &ClassificationMiss) -> Result<ErrorDisposition> {
        let Some(rule) = self.resolver.classify_by_keyword(raw) else {
            error!(reason = %miss, "unclassifiable message dropped without audit");
            return Ok(ErrorDisposition::Dropped);
        };

        let header = MessageHeader {
            message_id: tolerant_message_id(raw)
                .unwrap_or_else(|| format!("UNIDENTIFIED-{}", Uuid::new_v4())),
            message_type: rule.message_type.clone(),
            source: tolerant_sender(raw).unwrap_or_else(|| self.config.default_source.clone()),
            target: rule.target.clone(),
            direction: FlowDirection::Inbound,
            category: rule.category,
            batch_id: None,
            invalid: true,
            possible_duplicate: false,
        };

        let transformed = projection::project_raw(&header, raw);
        let payload = serde_json::to_string(&transformed)?;
        self.audit.record(&header, raw, transformed, true).await?;

        warn!(
            message_id = %header.message_id,
            message_type = %header.message_type,
            channel = %rule.channel,
            reason = %miss,
            "message routed to error channel"
        );

        Ok(ErrorDisposition::Routed {
            header,
            channel: rule.channel.clone(),
            payload,
        })
    }
}

/// Business message id by pattern match, for text that does not parse.
pub fn tolerant_message_id(raw: &str) -> Option<String> {
    capture(&MESSAGE_ID, raw)
}

fn tolerant_sender(raw: &str) -> Option<String> {
    capture(&SENDER_BIC, raw)
}

fn capture(pattern: &LazyLock<Option<Regex>>, raw: &str) -> Option<String> {
    pattern
        .as_ref()?
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

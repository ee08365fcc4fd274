//! Gateway configuration.
//!
//! Loaded once at startup from YAML and shared read-only as
//! `Arc<GatewayConfig>` by every pipeline component.

use crate::domain::message::Category;
use crate::domain::routing::{ErrorClassificationRule, RoutingRule};
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Path expressions for the header fields every message carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderPaths {
    pub message_type: String,
    pub message_id: String,
    pub source: String,
    pub possible_duplicate: String,
}

impl Default for HeaderPaths {
    fn default() -> Self {
        Self {
            message_type: "//AppHdr/MsgDefIdr".to_string(),
            message_id: "//AppHdr/BizMsgIdr".to_string(),
            source: "//AppHdr/Fr/FIId/FinInstnId/BICFI".to_string(),
            possible_duplicate: "//AppHdr/PssblDplct".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub paths: HeaderPaths,

    /// message type -> processor and channel
    pub routes: HashMap<String, RoutingRule>,

    /// message type -> batch id path; missing or empty means no batch concept
    pub batch_id_paths: HashMap<String, String>,

    /// Evaluated in order, first match wins.
    pub error_rules: Vec<ErrorClassificationRule>,

    /// Message types whose audit write also goes to the ledger.
    pub ledger_message_types: HashSet<String>,

    pub administrative_prefixes: Vec<String>,

    pub tracking_channel: String,

    /// Publish key used when batch id extraction fails outright.
    pub batch_key_sentinel: String,

    /// Source tag when the document names no sender.
    pub default_source: String,

    pub request_timeout_ms: u64,
    pub publish_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            paths: HeaderPaths::default(),
            routes: HashMap::new(),
            batch_id_paths: HashMap::new(),
            error_rules: Vec::new(),
            ledger_message_types: HashSet::new(),
            administrative_prefixes: vec!["admi.".to_string()],
            tracking_channel: "payments.tracking".to_string(),
            batch_key_sentinel: "BATCH_ID_UNAVAILABLE".to_string(),
            default_source: "UNKNOWN".to_string(),
            request_timeout_ms: 10_000,
            publish_timeout_ms: 2_000,
        }
    }
}

impl GatewayConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`GatewayConfig::validate`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("paths.message_type", &self.paths.message_type),
            ("paths.message_id", &self.paths.message_id),
            ("tracking_channel", &self.tracking_channel),
            ("batch_key_sentinel", &self.batch_key_sentinel),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(GatewayError::Config(format!("{name} must not be empty")));
            }
        }

        if self.request_timeout_ms == 0 || self.publish_timeout_ms == 0 {
            return Err(GatewayError::Config("timeouts must be positive".to_string()));
        }

        for (message_type, rule) in &self.routes {
            if rule.processor.trim().is_empty() || rule.channel.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "route for {message_type} needs a processor and a channel"
                )));
            }
        }

        for (index, rule) in self.error_rules.iter().enumerate() {
            if rule.keyword.trim().is_empty() || rule.channel.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "error_rules[{index}] needs a keyword and a channel"
                )));
            }
        }

        Ok(())
    }

    /// Category for a message type when the route does not override it.
    pub fn category_for(&self, message_type: &str) -> Category {
        if self
            .administrative_prefixes
            .iter()
            .any(|prefix| message_type.starts_with(prefix.as_str()))
        {
            Category::Administrative
        } else {
            Category::Payment
        }
    }

    pub fn requires_ledger(&self, message_type: &str) -> bool {
        self.ledger_message_types.contains(message_type)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

use super::message::{Category, FlowDirection};
use serde::{Deserialize, Serialize};

/// Destination of a classified message type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RoutingRule {
    pub processor: String,
    pub channel: String,
    /// Overrides the prefix-based category when set.
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub direction: FlowDirection,
}

/// A resolved route for one message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Route {
    pub target: String,
    pub channel: String,
    pub category: Category,
    pub direction: FlowDirection,
}

/// Keyword fallback used when a message cannot be parsed or classified.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ErrorClassificationRule {
    pub keyword: String,
    pub message_type: String,
    pub target: String,
    pub channel: String,
    #[serde(default)]
    pub category: Category,
}

impl ErrorClassificationRule {
    /// Case-insensitive containment against already lowercased text.
    pub fn matches_lowercase(&self, haystack: &str) -> bool {
        !self.keyword.is_empty() && haystack.contains(&self.keyword.to_lowercase())
    }
}

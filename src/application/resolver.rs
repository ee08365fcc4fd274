use crate::config::GatewayConfig;
use crate::domain::routing::{ErrorClassificationRule, Route};
use std::sync::Arc;

/// Maps message types to processors and channels.
#[derive(Clone)]
pub struct RoutingResolver {
    config: Arc<GatewayConfig>,
}

impl RoutingResolver {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }

    /// `None` for unmapped types.
    pub fn resolve_route(&self, message_type: &str) -> Option<Route> {
        let rule = self.config.routes.get(message_type)?;
        Some(Route {
            target: rule.processor.clone(),
            channel: rule.channel.clone(),
            category: rule
                .category
                .unwrap_or_else(|| self.config.category_for(message_type)),
            direction: rule.direction,
        })
    }

    /// First rule, in configuration order, whose keyword occurs in `raw`.
    pub fn classify_by_keyword(&self, raw: &str) -> Option<&ErrorClassificationRule> {
        let haystack = raw.to_lowercase();
        self.config
            .error_rules
            .iter()
            .find(|rule| rule.matches_lowercase(&haystack))
    }
}

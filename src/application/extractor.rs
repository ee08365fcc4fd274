use crate::config::GatewayConfig;
use crate::domain::path::PathExpr;
use crate::error::Result;
use roxmltree::{Document, ParsingOptions};
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates the configured path expressions against a parsed document.
///
/// Header paths are compiled once; batch id paths are compiled on use so that
/// a broken entry only affects the messages of its own type.
pub struct FieldExtractor {
    message_type: PathExpr,
    message_id: PathExpr,
    source: Option<PathExpr>,
    possible_duplicate: Option<PathExpr>,
    batch_id_paths: HashMap<String, String>,
}

impl FieldExtractor {
    pub fn new(config: &Arc<GatewayConfig>) -> Result<Self> {
        let optional = |expr: &str| -> Result<Option<PathExpr>> {
            if expr.trim().is_empty() {
                Ok(None)
            } else {
                PathExpr::parse(expr).map(Some)
            }
        };

        Ok(Self {
            message_type: PathExpr::parse(&config.paths.message_type)?,
            message_id: PathExpr::parse(&config.paths.message_id)?,
            source: optional(&config.paths.source)?,
            possible_duplicate: optional(&config.paths.possible_duplicate)?,
            batch_id_paths: config.batch_id_paths.clone(),
        })
    }

    /// Well-formedness check. DTDs are rejected.
    pub fn parse(body: &str) -> std::result::Result<Document<'_>, roxmltree::Error> {
        Document::parse_with_options(
            body,
            ParsingOptions {
                allow_dtd: false,
                ..ParsingOptions::default()
            },
        )
    }

    pub fn extract_message_type(&self, doc: &Document<'_>) -> Option<String> {
        self.message_type.select_text(doc)
    }

    pub fn extract_message_id(&self, doc: &Document<'_>) -> Option<String> {
        self.message_id.select_text(doc)
    }

    pub fn extract_source(&self, doc: &Document<'_>) -> Option<String> {
        self.source.as_ref().and_then(|path| path.select_text(doc))
    }

    pub fn extract_possible_duplicate(&self, doc: &Document<'_>) -> bool {
        self.possible_duplicate
            .as_ref()
            .and_then(|path| path.select_text(doc))
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
    }

    /// `Ok(None)` when the type has no batch concept or the path matches nothing.
    ///
    /// # Errors
    /// Returns `InvalidPath` if the configured expression cannot be parsed.
    pub fn extract_batch_id(&self, message_type: &str, doc: &Document<'_>) -> Result<Option<String>> {
        match self.batch_id_paths.get(message_type) {
            Some(expr) if !expr.trim().is_empty() => Ok(PathExpr::parse(expr)?.select_text(doc)),
            _ => Ok(None),
        }
    }
}

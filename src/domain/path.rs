//! Namespace-agnostic path expressions over parsed documents.
//!
//! Supports the subset of XPath the routing configuration needs:
//! absolute (`/Document/AppHdr/MsgDefIdr`) and descendant (`//AppHdr/BizMsgIdr`)
//! location steps, the `*` wildcard, prefixed names (`head:AppHdr`, matched on
//! the local name only) and an optional trailing `text()` step.

use crate::error::{GatewayError, Result};
use roxmltree::{Document, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` is the `*` wildcard.
    name: Option<String>,
}

impl Step {
    fn matches(&self, node: Node<'_, '_>) -> bool {
        node.is_element()
            && self
                .name
                .as_deref()
                .is_none_or(|name| node.tag_name().name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    steps: Vec<Step>,
}

impl PathExpr {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| GatewayError::InvalidPath {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expression.trim();
        if !trimmed.starts_with('/') {
            return Err(invalid("must start with '/' or '//'"));
        }

        let trimmed = trimmed.strip_suffix("/text()").unwrap_or(trimmed);
        let mut steps = Vec::new();
        let mut rest = trimmed;
        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else {
                return Err(invalid("expected '/'"));
            };

            let end = rest.find('/').unwrap_or(rest.len());
            let raw = &rest[..end];
            rest = &rest[end..];

            if raw.is_empty() {
                return Err(invalid("empty location step"));
            }
            let local = raw.rsplit(':').next().unwrap_or(raw);
            if local.is_empty() || !local.chars().all(is_name_char) && local != "*" {
                return Err(invalid("unsupported location step"));
            }

            steps.push(Step {
                axis,
                name: (local != "*").then(|| local.to_string()),
            });
        }

        if steps.is_empty() {
            return Err(invalid("no location steps"));
        }

        Ok(Self {
            source: expression.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Text of the first matching element in document order.
    ///
    /// Returns `None` when nothing matches or the match has no text.
    pub fn select_text(&self, doc: &Document<'_>) -> Option<String> {
        let node = self.select_first(doc)?;
        let text: String = node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn select_first<'a, 'input>(&self, doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
        // The document node is the context; the root element is its child.
        let mut current = vec![doc.root()];
        for step in &self.steps {
            let mut next = Vec::new();
            match step.axis {
                Axis::Child => {
                    for node in &current {
                        next.extend(node.children().filter(|n| step.matches(*n)));
                    }
                }
                Axis::Descendant => {
                    // A nested context node's subtree is already covered by its ancestor's.
                    for node in outermost(&current) {
                        next.extend(node.descendants().skip(1).filter(|n| step.matches(*n)));
                    }
                }
            }
            next.sort_by_key(|n| n.id().get());
            next.dedup_by_key(|n| n.id().get());
            if next.is_empty() {
                return None;
            }
            current = next;
        }
        current.into_iter().min_by_key(|n| n.id().get())
    }
}

/// Nodes of a document-ordered set that are not inside another member.
fn outermost<'a, 'input>(nodes: &[Node<'a, 'input>]) -> Vec<Node<'a, 'input>> {
    let mut kept: Vec<Node<'a, 'input>> = Vec::new();
    for &node in nodes {
        let nested = kept
            .last()
            .is_some_and(|last| node.ancestors().skip(1).any(|a| a == *last));
        if !nested {
            kept.push(node);
        }
    }
    kept
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

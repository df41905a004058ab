//! Removal of opaque payloads from history trees.
//!
//! Payload nodes are recognised by the suffix of their declared type name, never by event kind, so
//! new event types that carry payloads are handled without changes here.

use wfgate_types::{FieldValue, HistoryNode};

/// Suffixes used when none are configured.
pub const DEFAULT_PAYLOAD_SUFFIXES: [&str; 2] = [".Payload", ".Payloads"];

/// Type-name suffixes that mark a node as an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadConvention {
    suffixes: Vec<String>,
}

impl Default for PayloadConvention {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_SUFFIXES)
    }
}

impl PayloadConvention {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).filter(|suffix: &String| !suffix.is_empty()).collect(),
        }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn matches(&self, type_name: &str) -> bool {
        self.suffixes.iter().any(|suffix| type_name.ends_with(suffix.as_str()))
    }
}

/// Strips payload-typed values from a [`HistoryNode`] tree in place.
///
/// - single fields of a payload type are removed from their node
/// - lists whose element type is a payload type are emptied
/// - map entries of a payload type are removed
///
/// Everything else is visited recursively. Redacting twice is the same as redacting once.
#[derive(Debug, Clone, Default)]
pub struct HistoryRedactor {
    convention: PayloadConvention,
}

impl HistoryRedactor {
    pub fn new(convention: PayloadConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> &PayloadConvention {
        &self.convention
    }

    pub fn redact(&self, node: &mut HistoryNode) {
        node.fields_mut()
            .retain(|_, value| !matches!(value, FieldValue::Node(child) if self.convention.matches(child.type_name())));

        for value in node.fields_mut().values_mut() {
            self.redact_field(value);
        }
    }

    fn redact_field(&self, value: &mut FieldValue) {
        match value {
            FieldValue::Scalar(_) => {}
            FieldValue::Node(child) => self.redact(child),
            FieldValue::List { element_type, items } => {
                if self.convention.matches(element_type) {
                    items.clear();
                } else {
                    items.iter_mut().for_each(|item| self.redact(item));
                }
            }
            FieldValue::Map { entries, .. } => {
                entries.retain(|_, entry| !self.convention.matches(entry.type_name()));
                entries.values_mut().for_each(|entry| self.redact(entry));
            }
        }
    }
}

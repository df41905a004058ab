//! Decoding of engine JSON into typed [`HistoryNode`] trees.
//!
//! JSON carries no type information, so a [`TypeResolver`] supplies the declared type of each
//! object-valued field. The redactor only looks at those declared names; fields the resolver does
//! not know about are decoded with the neutral [`NEUTRAL_TYPE_NAME`].

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use wfgate_types::{FieldValue, HistoryNode, NEUTRAL_TYPE_NAME};

/// Declared type of a history event.
pub const HISTORY_EVENT_TYPE: &str = "temporal.api.history.v1.HistoryEvent";

const HISTORY_PACKAGE: &str = "temporal.api.history.v1";
const PAYLOAD: &str = "temporal.api.common.v1.Payload";
const PAYLOADS: &str = "temporal.api.common.v1.Payloads";
const MEMO: &str = "temporal.api.common.v1.Memo";
const HEADER: &str = "temporal.api.common.v1.Header";
const SEARCH_ATTRIBUTES: &str = "temporal.api.common.v1.SearchAttributes";
const FAILURE: &str = "temporal.api.failure.v1.Failure";
const USER_METADATA: &str = "temporal.api.sdk.v1.UserMetadata";
const UPDATE_REQUEST: &str = "temporal.api.update.v1.Request";
const UPDATE_INPUT: &str = "temporal.api.update.v1.Input";
const UPDATE_OUTCOME: &str = "temporal.api.update.v1.Outcome";
const UPDATE_ATTRIBUTES_PREFIX: &str = "temporal.api.history.v1.WorkflowExecutionUpdate";

/// Declared shape of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Message(String),
    List(String),
    Map(String),
}

/// Supplies declared types for fields of typed nodes.
pub trait TypeResolver: Send + Sync + fmt::Debug {
    /// Declared type of `field` inside a node of type `parent`, if known.
    fn field_type(&self, parent: &str, field: &str) -> Option<DeclaredType>;
}

/// Field table for Temporal history events.
///
/// Event attribute fields resolve by the API's naming rule (`fooEventAttributes` is
/// `temporal.api.history.v1.FooEventAttributes`); payload-bearing fields come from a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalSchema;

impl TypeResolver for TemporalSchema {
    fn field_type(&self, parent: &str, field: &str) -> Option<DeclaredType> {
        let message = |name: &str| Some(DeclaredType::Message(name.to_string()));

        match (parent, field) {
            (PAYLOADS, "payloads") => return Some(DeclaredType::List(PAYLOAD.to_string())),
            (MEMO | HEADER, "fields") | (SEARCH_ATTRIBUTES, "indexedFields") => {
                return Some(DeclaredType::Map(PAYLOAD.to_string()));
            }
            (USER_METADATA, "summary" | "details") => return message(PAYLOAD),
            (UPDATE_REQUEST, "input") => return message(UPDATE_INPUT),
            (UPDATE_INPUT, "args") | (UPDATE_OUTCOME, "success") => return message(PAYLOADS),
            _ => {}
        }

        // Update events carry requests whose `input` is a structured message, not payloads.
        if parent.starts_with(UPDATE_ATTRIBUTES_PREFIX) {
            match field {
                "acceptedRequest" | "request" => return message(UPDATE_REQUEST),
                "input" => return message(UPDATE_INPUT),
                "outcome" => return message(UPDATE_OUTCOME),
                _ => {}
            }
        }

        if let Some(stem) = field.strip_suffix("EventAttributes")
            && parent == HISTORY_EVENT_TYPE
        {
            return message(&format!("{HISTORY_PACKAGE}.{}EventAttributes", upper_first(stem)));
        }

        match field {
            "input" | "result" | "details" | "heartbeatDetails" | "lastHeartbeatDetails" | "lastCompletionResult" => {
                message(PAYLOADS)
            }
            "encodedAttributes" => message(PAYLOAD),
            "memo" | "upsertedMemo" => message(MEMO),
            "header" => message(HEADER),
            "searchAttributes" | "upsertedSearchAttributes" => message(SEARCH_ATTRIBUTES),
            "failure" | "cause" | "continuedFailure" => message(FAILURE),
            "userMetadata" => message(USER_METADATA),
            _ => None,
        }
    }
}

fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decodes `value` as a node of `type_name`.
///
/// Non-object values become verbatim nodes, so shorthand payload arrays keep their exact shape.
pub fn decode_node(resolver: &dyn TypeResolver, type_name: &str, value: &Value) -> HistoryNode {
    let Value::Object(object) = value else {
        return HistoryNode::verbatim(type_name, value.clone());
    };
    let mut node = HistoryNode::new(type_name);
    for (field, field_value) in object {
        node.insert(field.clone(), decode_field(resolver, type_name, field, field_value));
    }
    node
}

fn decode_field(resolver: &dyn TypeResolver, parent: &str, field: &str, value: &Value) -> FieldValue {
    match (resolver.field_type(parent, field), value) {
        (Some(DeclaredType::Message(type_name)), _) => FieldValue::Node(decode_node(resolver, &type_name, value)),
        (Some(DeclaredType::List(element_type)), Value::Array(items)) => FieldValue::List {
            items: items.iter().map(|item| decode_node(resolver, &element_type, item)).collect(),
            element_type,
        },
        (Some(DeclaredType::Map(value_type)), Value::Object(entries)) => FieldValue::Map {
            entries: entries
                .iter()
                .map(|(key, entry)| (key.clone(), decode_node(resolver, &value_type, entry)))
                .collect::<IndexMap<_, _>>(),
            value_type,
        },
        (_, Value::Object(_)) => FieldValue::Node(decode_node(resolver, NEUTRAL_TYPE_NAME, value)),
        (_, Value::Array(items)) if !items.is_empty() && items.iter().all(Value::is_object) => FieldValue::List {
            element_type: NEUTRAL_TYPE_NAME.to_string(),
            items: items.iter().map(|item| decode_node(resolver, NEUTRAL_TYPE_NAME, item)).collect(),
        },
        _ => FieldValue::Scalar(value.clone()),
    }
}

//! Generic execution-history tree.
//!
//! Events returned by the workflow engine are decoded into [`HistoryNode`]s whose fields carry
//! declared type names. Nothing here knows which concrete event kinds exist; consumers walk the
//! tree structurally and decide what to do from the type names alone.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Type name assigned to objects the schema does not describe.
pub const NEUTRAL_TYPE_NAME: &str = "json.Object";

/// A composite node with a declared type and ordered, named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryNode {
    type_name: String,
    fields: IndexMap<String, FieldValue>,
    verbatim: Option<Value>,
}

/// Value stored under one field of a [`HistoryNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any JSON value that is not described as a typed node (strings, numbers, scalar arrays).
    Scalar(Value),
    /// A single nested node.
    Node(HistoryNode),
    /// A homogeneous list; every item shares `element_type`.
    List { element_type: String, items: Vec<HistoryNode> },
    /// A keyed map whose values are declared as `value_type`.
    Map { value_type: String, entries: IndexMap<String, HistoryNode> },
}

impl HistoryNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            verbatim: None,
        }
    }

    /// Node whose JSON body is kept as-is instead of being split into fields.
    ///
    /// Used for payload shapes that are not objects (for example shorthand payload arrays).
    pub fn verbatim(type_name: impl Into<String>, body: Value) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            verbatim: Some(body),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut IndexMap<String, FieldValue> {
        &mut self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Removes a field, keeping the relative order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.shift_remove(name)
    }

    /// Encodes the node as a JSON object (or its verbatim body).
    pub fn to_json(&self) -> Value {
        if let Some(body) = &self.verbatim {
            return body.clone();
        }
        let mut object = Map::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::Node(node) => node.to_json(),
            FieldValue::List { items, .. } => Value::Array(items.iter().map(HistoryNode::to_json).collect()),
            FieldValue::Map { entries, .. } => Value::Object(entries.iter().map(|(key, node)| (key.clone(), node.to_json())).collect()),
        }
    }
}

impl Serialize for HistoryNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

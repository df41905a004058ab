//! Execution history: schema-described decoding and payload redaction.

pub mod redact;
pub mod schema;

pub use redact::{DEFAULT_PAYLOAD_SUFFIXES, HistoryRedactor, PayloadConvention};
pub use schema::{DeclaredType, HISTORY_EVENT_TYPE, TemporalSchema, TypeResolver, decode_node};

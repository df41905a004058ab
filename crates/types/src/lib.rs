//! Shared types for the wfgate workspace.
//!
//! The crate deliberately carries no behaviour beyond small conversions: the argument set handed to
//! workflow tools, the execution dispositions understood by the workflow engine, and the generic
//! history tree that the redactor walks.

use std::collections::HashMap;

pub mod execution;
pub mod history;

pub use execution::{ConflictPolicy, Disposition, ExecutionIdentity, ReusePolicy};
pub use history::{FieldValue, HistoryNode, NEUTRAL_TYPE_NAME};

/// Parameters supplied to a workflow tool, keyed by parameter name.
///
/// Iteration order is unspecified; anything that needs stable bytes goes through the canonical encoder.
pub type ArgumentSet = HashMap<String, String>;

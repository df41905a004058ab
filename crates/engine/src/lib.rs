//! # wfgate engine
//!
//! Everything between a tool call and the external workflow engine:
//!
//! - **`templates`** / **`identity`**: the identity template language and deterministic execution identities
//! - **`policy`**: choosing an attach/start disposition
//! - **`client`**: the [`WorkflowEngine`] boundary and its HTTP adapter
//! - **`history`**: decoding engine history into typed trees and stripping opaque payloads

pub mod client;
pub mod history;
pub mod identity;
pub mod policy;
pub mod templates;

pub use client::{EngineError, EngineSettings, ExecutionHandle, HistoryStream, HttpWorkflowEngine, StartRequest, WorkflowEngine};
pub use history::{DEFAULT_PAYLOAD_SUFFIXES, HistoryRedactor, PayloadConvention, TemporalSchema, TypeResolver};
pub use identity::{derive_identity, identity_or_random};
pub use policy::select_disposition;
pub use templates::{IdentityTemplate, MISSING_VALUE, TemplateError};

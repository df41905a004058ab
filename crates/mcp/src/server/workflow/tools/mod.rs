//! Workflow tool handlers.

pub mod cache;
pub mod history;
pub mod invocation;

pub use cache::{clear_cache, with_cache};
pub use history::{HistoryError, get_workflow_history};
pub use invocation::{InvocationError, invoke_workflow};

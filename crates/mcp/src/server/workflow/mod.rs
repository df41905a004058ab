//! Workflow tools, prompts and their supporting catalog.

pub mod catalog;
pub mod errors;
pub mod prompts;
pub mod tools;

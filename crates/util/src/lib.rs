//! Small, dependency-light helpers shared by the wfgate crates.

pub mod canonical;
pub mod duration;
pub mod hashing;
pub mod path_processing;

pub use canonical::{canonical_arguments, canonical_arguments_string, canonical_value};
pub use duration::{DurationParseError, parse_duration};
pub use hashing::{Fnv1Hasher32, argument_digest, fnv1_32};
pub use path_processing::{expand_tilde, resolve_cache_database_path};

//! Gateway configuration.
//! This module handles parsing and validation of the YAML file that names the Temporal
//! service, the result cache and the workflows exposed as tools.

mod io;
mod model;
mod validation;

pub use io::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, default_config_path, load_config_from_path, parse_config};
pub use model::{
    CacheConfig, ConfigError, EngineEnvironment, GatewayConfig, HistoryConfig, OPTIONAL_MARKER, ParameterDef, ParameterSpec,
    TemporalConfig, WorkflowDef,
};
pub use validation::{RESERVED_TOOL_NAMES, validate_config, validate_workflow_name};

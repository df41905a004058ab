//! Data models for the gateway configuration file.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wfgate_cache::CacheSettings;
use wfgate_engine::{
    DEFAULT_PAYLOAD_SUFFIXES, EngineSettings, HistoryRedactor, PayloadConvention, TemplateError,
    client::http::DEFAULT_REQUEST_TIMEOUT,
};
use wfgate_util::{DurationParseError, parse_duration, resolve_cache_database_path};

/// Marker that turns a workflow input field into an optional one when present in its description.
pub const OPTIONAL_MARKER: &str = "Optional";

/// Top-level configuration: engine connection, result cache, history output and the workflows exposed as tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Workflow tools keyed by workflow type name, in file order.
    #[serde(default)]
    pub workflows: IndexMap<String, WorkflowDef>,
}

/// Connection settings for the Temporal service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalConfig {
    #[serde(default)]
    pub host_port: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// `local` talks plain HTTP, `remote` uses TLS.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Upper bound on how long a tool call waits for a workflow result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_task_queue: Option<String>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            host_port: String::new(),
            namespace: default_namespace(),
            environment: default_environment(),
            timeout: None,
            default_task_queue: None,
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_environment() -> String {
    "local".to_string()
}

/// Where the engine is reached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEnvironment {
    Local,
    Remote,
}

impl EngineEnvironment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Result cache settings as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub database_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    /// Summed size of stored results in bytes; 0 disables the bound.
    #[serde(default)]
    pub max_cache_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_interval: Option<String>,
}

/// Settings for `GetWorkflowHistory` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Nodes whose declared type name ends with one of these are removed from returned events.
    #[serde(default = "default_payload_type_suffixes")]
    pub payload_type_suffixes: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            payload_type_suffixes: default_payload_type_suffixes(),
        }
    }
}

fn default_payload_type_suffixes() -> Vec<String> {
    DEFAULT_PAYLOAD_SUFFIXES.iter().map(|suffix| suffix.to_string()).collect()
}

/// A Temporal workflow exposed as a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
    pub purpose: String,
    #[serde(default)]
    pub input: ParameterDef,
    #[serde(default)]
    pub output: ParameterDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_queue: Option<String>,
    /// Identity template rendered against the call parameters.
    #[serde(default, rename = "workflowIDRecipe", skip_serializing_if = "Option::is_none")]
    pub workflow_id_recipe: Option<String>,
}

/// Input or output shape of a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Each entry maps one field name to its description.
    #[serde(default)]
    pub fields: Vec<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One input field of a workflow tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl WorkflowDef {
    /// Input fields in declaration order.
    pub fn parameters(&self) -> Vec<ParameterSpec> {
        self.input
            .fields
            .iter()
            .flat_map(|field| field.iter())
            .map(|(name, description)| ParameterSpec {
                name: name.clone(),
                description: description.clone(),
                required: !description.contains(OPTIONAL_MARKER),
            })
            .collect()
    }

    pub fn required_parameters(&self) -> Vec<String> {
        self.parameters()
            .into_iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name)
            .collect()
    }

    /// The recipe with surrounding whitespace removed, or `None` when absent or blank.
    pub fn recipe(&self) -> Option<&str> {
        self.workflow_id_recipe.as_deref().map(str::trim).filter(|recipe| !recipe.is_empty())
    }
}

impl GatewayConfig {
    pub fn environment(&self) -> Result<EngineEnvironment, ConfigError> {
        EngineEnvironment::parse(&self.temporal.environment)
            .ok_or_else(|| ConfigError::InvalidEnvironment(self.temporal.environment.clone()))
    }

    /// Maximum wait for a workflow result, when configured.
    pub fn workflow_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        optional_duration("temporal.timeout", self.temporal.timeout.as_deref())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            host_port: self.temporal.host_port.trim().to_string(),
            namespace: self.temporal.namespace.clone(),
            use_tls: self.environment()? == EngineEnvironment::Remote,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn cache_settings(&self) -> Result<CacheSettings, ConfigError> {
        let ttl = optional_duration("cache.ttl", self.cache.ttl.as_deref())?;
        if self.cache.enabled && ttl.is_none_or(|ttl| ttl.is_zero()) {
            return Err(ConfigError::MissingTtl);
        }
        let database_path = if self.cache.database_path.trim().is_empty() {
            resolve_cache_database_path(DEFAULT_DATABASE_FILE)
        } else {
            resolve_cache_database_path(&self.cache.database_path)
        };
        Ok(CacheSettings {
            enabled: self.cache.enabled,
            database_path,
            ttl: ttl.unwrap_or_default(),
            max_cache_size: self.cache.max_cache_size,
            cleanup_interval: optional_duration("cache.cleanupInterval", self.cache.cleanup_interval.as_deref())?
                .filter(|interval| !interval.is_zero()),
        })
    }

    /// Redactor for history output built from `history.payloadTypeSuffixes`.
    pub fn redactor(&self) -> Result<HistoryRedactor, ConfigError> {
        let suffixes = &self.history.payload_type_suffixes;
        if suffixes.is_empty() {
            return Err(ConfigError::InvalidPayloadSuffixes("at least one suffix is required".to_string()));
        }
        if suffixes.iter().any(|suffix| suffix.trim().is_empty()) {
            return Err(ConfigError::InvalidPayloadSuffixes("suffixes must not be blank".to_string()));
        }
        let convention = PayloadConvention::new(suffixes.iter().map(|suffix| suffix.trim().to_string()));
        Ok(HistoryRedactor::new(convention))
    }

    /// Task queue for `workflow`, falling back to `temporal.defaultTaskQueue`.
    pub fn task_queue_for(&self, workflow: &WorkflowDef) -> String {
        workflow
            .task_queue
            .as_deref()
            .filter(|queue| !queue.trim().is_empty())
            .or(self.temporal.default_task_queue.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

const DEFAULT_DATABASE_FILE: &str = "cache.db";

fn optional_duration(field: &'static str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_duration(value)
            .map(Some)
            .map_err(|source| ConfigError::InvalidDuration { field, source }),
    }
}

/// Errors that make a configuration unusable. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("temporal.hostPort is required")]
    MissingHostPort,

    #[error("invalid temporal.environment '{0}': expected 'local' or 'remote'")]
    InvalidEnvironment(String),

    #[error("invalid duration for {field}: {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: DurationParseError,
    },

    #[error("cache.ttl must be a positive duration when caching is enabled")]
    MissingTtl,

    #[error("invalid history.payloadTypeSuffixes: {0}")]
    InvalidPayloadSuffixes(String),

    #[error("invalid workflow name '{name}': {reason}")]
    InvalidWorkflowName { name: String, reason: String },

    #[error("invalid workflowIDRecipe for workflow '{workflow}': {source}")]
    InvalidRecipe {
        workflow: String,
        #[source]
        source: TemplateError,
    },
}

//! The set of workflow tools derived from configuration.
//!
//! Each configured workflow becomes one MCP tool named after the workflow type. The catalog owns the
//! generated description, the input schema, the resolved task queue and the parsed identity recipe.

use std::sync::Arc;

use indexmap::IndexMap;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use wfgate_engine::{IdentityTemplate, TemplateError, identity_or_random};
use wfgate_types::{ArgumentSet, ExecutionIdentity};

use crate::config::{GatewayConfig, ParameterSpec, WorkflowDef};

/// A workflow exposed as a tool.
#[derive(Debug, Clone)]
pub struct WorkflowTool {
    name: String,
    definition: WorkflowDef,
    parameters: Vec<ParameterSpec>,
    task_queue: String,
    recipe: Recipe,
}

#[derive(Debug, Clone)]
enum Recipe {
    Absent,
    Parsed(IdentityTemplate),
    Invalid(TemplateError),
}

impl WorkflowTool {
    pub fn new(name: impl Into<String>, definition: WorkflowDef, task_queue: impl Into<String>) -> Self {
        let recipe = match definition.recipe() {
            None => Recipe::Absent,
            Some(source) => match IdentityTemplate::parse(source) {
                Ok(template) => Recipe::Parsed(template),
                Err(error) => Recipe::Invalid(error),
            },
        };
        Self {
            name: name.into(),
            parameters: definition.parameters(),
            definition,
            task_queue: task_queue.into(),
            recipe,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &WorkflowDef {
        &self.definition
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    /// Required parameters that are absent or empty in `params`, in declaration order.
    pub fn missing_parameters(&self, params: &ArgumentSet) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.required)
            .filter(|parameter| params.get(&parameter.name).is_none_or(|value| value.is_empty()))
            .map(|parameter| parameter.name.clone())
            .collect()
    }

    /// Execution identity for one call. An empty rendering falls back to a random identity.
    pub fn identity(&self, params: &ArgumentSet) -> Result<ExecutionIdentity, TemplateError> {
        let rendered = match &self.recipe {
            Recipe::Absent => String::new(),
            Recipe::Parsed(template) => template.render(params),
            Recipe::Invalid(error) => return Err(error.clone()),
        };
        Ok(identity_or_random(rendered, &self.name))
    }

    /// Purpose followed by the generated parameter list and an example call.
    pub fn description(&self) -> String {
        format!(
            "{}\n\n**Parameters:**\n{}\n**Example Usage:**\n{}",
            self.definition.purpose,
            parameter_lines(&self.parameters),
            example_usage(&self.parameters)
        )
    }

    pub fn input_schema(&self) -> JsonObject {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for parameter in &self.parameters {
            properties.insert(
                parameter.name.clone(),
                json!({ "type": "string", "description": parameter.description }),
            );
            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }

        let mut params_schema = serde_json::Map::new();
        params_schema.insert("type".to_string(), json!("object"));
        params_schema.insert("properties".to_string(), Value::Object(properties));
        params_schema.insert("additionalProperties".to_string(), json!({ "type": "string" }));
        if let Some(description) = self.definition.input.description.as_deref() {
            params_schema.insert("description".to_string(), json!(description));
        }
        if !required.is_empty() {
            params_schema.insert("required".to_string(), Value::Array(required));
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({
                "params": Value::Object(params_schema),
                "force_rerun": {
                    "type": "boolean",
                    "description": "Start a fresh execution even if one exists for the same arguments. Only set when explicitly requested.",
                    "default": false,
                },
            }),
        );
        schema.insert("required".to_string(), json!(["params"]));
        schema
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(self.name.clone(), self.description(), Arc::new(self.input_schema()))
    }
}

/// `- \`name\` (required): description` lines, one per parameter.
pub fn parameter_lines(parameters: &[ParameterSpec]) -> String {
    parameters
        .iter()
        .map(|parameter| {
            let requirement = if parameter.required { "required" } else { "optional" };
            format!("- `{}` ({requirement}): {}\n", parameter.name, parameter.description)
        })
        .collect()
}

/// A fenced JSON block showing a complete call with placeholder values.
pub fn example_usage(parameters: &[ParameterSpec]) -> String {
    let examples = parameters
        .iter()
        .map(|parameter| format!("    \"{}\": {}", parameter.name, example_value(&parameter.name)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("```json\n{{\n  \"params\": {{\n{examples}\n  }},\n  \"force_rerun\": false\n}}\n```")
}

fn example_value(field_name: &str) -> &'static str {
    if field_name.contains("json") {
        r#"{"example": "value"}"#
    } else if field_name.contains("id") {
        r#""example-id-123""#
    } else {
        r#""example value""#
    }
}

/// Workflow tools keyed by name, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    tools: IndexMap<String, WorkflowTool>,
}

impl WorkflowCatalog {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let tools = config
            .workflows
            .iter()
            .map(|(name, definition)| {
                let tool = WorkflowTool::new(name.clone(), definition.clone(), config.task_queue_for(definition));
                (name.clone(), tool)
            })
            .collect();
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowTool> {
        self.tools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowTool> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// MCP tool definitions for every workflow.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.values().map(WorkflowTool::to_tool).collect()
    }
}

//! MCP prompts describing the configured workflow tools.

use crate::server::workflow::catalog::{WorkflowCatalog, WorkflowTool, example_usage, parameter_lines};
use crate::server::workflow::errors::not_found_error;
use rmcp::model::{GetPromptResult, ListPromptsResult, Prompt, PromptMessage, PromptMessageRole};

pub const SYSTEM_PROMPT_NAME: &str = "system_prompt";

const TOOL_USAGE: &str = concat!(
    "Use these tools to help users interact with Temporal workflows. ",
    "Each workflow requires a 'params' object containing the necessary parameters listed above."
);

/// List prompts exposed by the MCP server.
pub fn list_prompts() -> ListPromptsResult {
    ListPromptsResult::with_all_items(vec![Prompt {
        name: SYSTEM_PROMPT_NAME.to_string(),
        title: None,
        description: Some("System prompt for the Temporal MCP".to_string()),
        arguments: None,
        icons: None,
        meta: None,
    }])
}

/// Resolve a prompt by name.
pub fn get_prompt(name: &str, catalog: &WorkflowCatalog) -> Result<GetPromptResult, rmcp::model::ErrorData> {
    match name {
        SYSTEM_PROMPT_NAME => Ok(GetPromptResult {
            description: Some("System prompt for the Temporal MCP".to_string()),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, system_prompt(catalog))],
        }),
        _ => Err(not_found_error(
            "PROMPT_NOT_FOUND",
            format!("prompt '{}' was not found", name),
            serde_json::json!({ "name": name }),
            "Call prompts/list to inspect available prompts.",
        )),
    }
}

/// Full system prompt text for `catalog`.
pub fn system_prompt(catalog: &WorkflowCatalog) -> String {
    let workflow_list: String = catalog.iter().map(workflow_section).collect();
    format!(
        r#"You are now connected to a Temporal MCP (Model Control Protocol) server that provides access to various Temporal workflows.

This MCP exposes the following workflow tools:

{workflow_list}
## Parameter Validation Guidelines

Before executing any workflow, ensure you:

1. Validate all required parameters are present and properly formatted
2. Check that string parameters have appropriate length and format
3. Verify numeric parameters are within expected ranges
4. Ensure any IDs follow the proper format guidelines
5. Ask the user for any missing required parameters before execution

## Tool Usage Instructions

{TOOL_USAGE}

When constructing your calls:
- Include all required parameters
- Set force_rerun to true only when explicitly requested by the user
- When force_rerun is false, Temporal will deduplicate workflows based on their arguments

## General Example Structure

To call any workflow:
```
{{
  "params": {{
    "param1": "value1",
    "param2": "value2"
  }},
  "force_rerun": false
}}
```

Refer to each workflow's specific example above for exact parameter requirements."#
    )
}

fn workflow_section(tool: &WorkflowTool) -> String {
    let definition = tool.definition();
    let mut section = format!(
        "## {}\n**Purpose:** {}\n\n**Input Type:** {}\n\n**Parameters:**\n{}\n**Example Usage:**\n{}\n",
        tool.name(),
        definition.purpose,
        definition.input.type_name,
        parameter_lines(tool.parameters()),
        example_usage(tool.parameters()),
    );

    section.push_str(&format!("\n**Output Type:** {}\n", definition.output.type_name));
    if let Some(description) = definition.output.description.as_deref().filter(|text| !text.is_empty()) {
        section.push_str(&format!("**Output Description:** {description}\n"));
    }

    let required = definition.required_parameters();
    if !required.is_empty() {
        section.push_str("\n**Required Validation:**\n");
        section.push_str("- Validate all required parameters are provided before execution\n");
        section.push_str(&format!("- Required parameters: {}\n", required.join(", ")));
    }

    section.push_str("\n---\n\n");
    section
}

//! Deterministic execution identities.

use tracing::info;
use wfgate_types::{ArgumentSet, ExecutionIdentity};

use crate::templates::{IdentityTemplate, TemplateError};

/// Evaluates `template` against `args`.
///
/// An empty template yields an empty string, which callers must treat as "no stable identity"
/// (see [`identity_or_random`]).
pub fn derive_identity(template: &str, args: &ArgumentSet) -> Result<String, TemplateError> {
    if template.is_empty() {
        return Ok(String::new());
    }
    Ok(IdentityTemplate::parse(template)?.render(args))
}

/// Wraps a rendered identity, substituting a random one when the rendering is empty.
pub fn identity_or_random(rendered: String, tool_name: &str) -> ExecutionIdentity {
    match ExecutionIdentity::new(rendered) {
        Some(identity) => identity,
        None => {
            let identity = ExecutionIdentity::random();
            info!(tool = %tool_name, identity = %identity, "no workflow ID recipe output; using a random workflow ID");
            identity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ArgumentSet {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn derives_identity_from_template() {
        let identity = derive_identity("id_{{.one}}_{{.two}}", &args(&[("one", "1"), ("two", "2")])).unwrap();
        assert_eq!(identity, "id_1_2");
    }

    #[test]
    fn empty_template_derives_empty_identity() {
        assert_eq!(derive_identity("", &args(&[("one", "1")])).unwrap(), "");
    }

    #[test]
    fn parse_failures_surface_as_template_errors() {
        assert!(derive_identity("{{ .one", &args(&[("one", "1")])).is_err());
    }

    #[test]
    fn empty_identities_become_unique_random_ones() {
        let first = identity_or_random(String::new(), "Tool");
        let second = identity_or_random(String::new(), "Tool");
        assert_ne!(first, second);
    }

    #[test]
    fn rendered_identities_are_kept() {
        let template = IdentityTemplate::parse("order-{{ .id }}").unwrap();
        let identity = identity_or_random(template.render(&args(&[("id", "42")])), "Tool");
        assert_eq!(identity.as_str(), "order-42");
    }
}

//! Identity template language.
//!
//! A template is literal text interleaved with `{{ ... }}` actions. Supported actions:
//!
//! - `{{ .name }}` renders one argument, `{{ . }}` renders the whole argument set as `map[k:v ...]`.
//! - `{{ "text" }}` renders a string literal.
//! - `{{ hash <operand>* }}` renders the decimal FNV-1 32-bit hash of the canonical encodings of
//!   its operands. Without operands the whole argument set is hashed.
//!
//! `{{-` and `-}}` trim whitespace in the adjacent text, and `{{/* ... */}}` is a comment.
//! Anything else is rejected at parse time with a [`TemplateError`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use wfgate_types::ArgumentSet;
use wfgate_util::{Fnv1Hasher32, canonical_arguments, canonical_value};

/// Rendered for arguments the template references but the call did not supply.
pub const MISSING_VALUE: &str = "<no value>";

const HASH_FUNCTION: &str = "hash";

/// Template failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("template: {message} (at byte {offset})")]
pub struct TemplateError {
    /// Byte offset of the action that failed.
    pub offset: usize,
    pub message: String,
}

impl TemplateError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// A parsed identity template, ready to be rendered against many argument sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTemplate {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Action(Action),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Operand(Operand),
    Hash(Vec<Operand>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Root,
    Field(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Dot,
    Field(String),
    Identifier(String),
    Literal(String),
}

impl IdentityTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;
        let mut trim_leading = false;

        loop {
            let Some(relative_open) = source[cursor..].find("{{") else {
                push_text(&mut segments, &source[cursor..], trim_leading, false);
                break;
            };
            let open = cursor + relative_open;
            let mut body_start = open + 2;
            let trim_trailing = starts_with_trim_marker(&source[body_start..]);
            if trim_trailing {
                body_start += 1;
            }
            push_text(&mut segments, &source[cursor..open], trim_leading, trim_trailing);

            if source[body_start..].trim_start().starts_with("/*") {
                let (end, trim_next) = skip_comment(source, open, body_start)?;
                cursor = end;
                trim_leading = trim_next;
                continue;
            }

            let lexed = lex_action(source, open, body_start)?;
            segments.push(Segment::Action(build_action(lexed.tokens, open)?));
            cursor = lexed.end;
            trim_leading = lexed.trim_after;
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Renders the template against `args`. Never fails; see [`MISSING_VALUE`].
    pub fn render(&self, args: &ArgumentSet) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Action(Action::Operand(operand)) => rendered.push_str(&render_operand(operand, args)),
                Segment::Action(Action::Hash(operands)) => rendered.push_str(&hash_operands(operands, args).to_string()),
            }
        }
        rendered
    }
}

impl FromStr for IdentityTemplate {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl fmt::Display for IdentityTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_leading: bool, trim_trailing: bool) {
    let mut text = text;
    if trim_leading {
        text = text.trim_start();
    }
    if trim_trailing {
        text = text.trim_end();
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// `{{-` only trims when the dash is followed by whitespace, otherwise it starts a number.
fn starts_with_trim_marker(body: &str) -> bool {
    let mut chars = body.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn skip_comment(source: &str, open: usize, body_start: usize) -> Result<(usize, bool), TemplateError> {
    let Some(relative_end) = source[body_start..].find("*/") else {
        return Err(TemplateError::new(open, "unclosed comment"));
    };
    let after_comment = body_start + relative_end + 2;
    let rest = &source[after_comment..];
    let trimmed = rest.trim_start();
    if let Some(after) = trimmed.strip_prefix("-}}")
        && trimmed.len() < rest.len()
    {
        return Ok((source.len() - after.len(), true));
    }
    match trimmed.strip_prefix("}}") {
        Some(after) => Ok((source.len() - after.len(), false)),
        None => Err(TemplateError::new(open, "comment must end the action")),
    }
}

struct LexedAction {
    tokens: Vec<Token>,
    end: usize,
    trim_after: bool,
}

fn lex_action(source: &str, open: usize, body_start: usize) -> Result<LexedAction, TemplateError> {
    let mut tokens = Vec::new();
    let mut position = body_start;

    loop {
        let rest = &source[position..];
        let skipped = rest.len() - rest.trim_start().len();
        position += skipped;
        let rest = &source[position..];

        if rest.is_empty() {
            return Err(TemplateError::new(open, "unclosed action"));
        }
        let preceded_by_space = skipped > 0 || position == body_start;
        if rest.starts_with("-}}") && preceded_by_space {
            return Ok(LexedAction {
                tokens,
                end: position + 3,
                trim_after: true,
            });
        }
        if rest.starts_with("}}") {
            return Ok(LexedAction {
                tokens,
                end: position + 2,
                trim_after: false,
            });
        }

        let Some(first) = rest.chars().next() else {
            return Err(TemplateError::new(open, "unclosed action"));
        };
        match first {
            '.' => {
                let name_len = identifier_len(&rest[1..]);
                if name_len == 0 {
                    tokens.push(Token::Dot);
                    position += 1;
                } else {
                    let name = &rest[1..1 + name_len];
                    if rest[1 + name_len..].starts_with('.') {
                        return Err(TemplateError::new(open, format!("nested field access after .{name} is not supported")));
                    }
                    tokens.push(Token::Field(name.to_string()));
                    position += 1 + name_len;
                }
            }
            '"' => {
                let (literal, consumed) =
                    lex_quoted(&rest[1..]).ok_or_else(|| TemplateError::new(open, "unterminated or invalid string literal"))?;
                tokens.push(Token::Literal(literal));
                position += 1 + consumed;
            }
            '`' => {
                let Some(end) = rest[1..].find('`') else {
                    return Err(TemplateError::new(open, "unterminated raw string literal"));
                };
                tokens.push(Token::Literal(rest[1..1 + end].to_string()));
                position += end + 2;
            }
            character if character.is_alphabetic() || character == '_' => {
                let name_len = identifier_len(rest);
                tokens.push(Token::Identifier(rest[..name_len].to_string()));
                position += name_len;
            }
            other => {
                return Err(TemplateError::new(open, format!("unexpected {other:?} in action")));
            }
        }
    }
}

fn identifier_len(text: &str) -> usize {
    text.char_indices()
        .find(|(_, character)| !(character.is_alphanumeric() || *character == '_'))
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Parses the body of a double-quoted literal (after the opening quote).
/// Returns the unescaped value and the number of bytes consumed including the closing quote.
fn lex_quoted(text: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = text.char_indices();
    while let Some((index, character)) = chars.next() {
        match character {
            '"' => return Some((value, index + 1)),
            '\n' => return None,
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    'u' => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let (_, digit) = chars.next()?;
                            code = code * 16 + digit.to_digit(16)?;
                        }
                        value.push(char::from_u32(code)?);
                    }
                    _ => return None,
                }
            }
            other => value.push(other),
        }
    }
    None
}

fn build_action(tokens: Vec<Token>, open: usize) -> Result<Action, TemplateError> {
    let mut tokens = tokens.into_iter();
    let Some(head) = tokens.next() else {
        return Err(TemplateError::new(open, "missing value for command"));
    };

    match head {
        Token::Identifier(name) if name == HASH_FUNCTION => {
            let operands = tokens.map(|token| into_operand(token, open)).collect::<Result<Vec<_>, _>>()?;
            Ok(Action::Hash(operands))
        }
        Token::Identifier(name) => Err(TemplateError::new(open, format!("function {name:?} not defined"))),
        operand => {
            let operand = into_operand(operand, open)?;
            if tokens.next().is_some() {
                return Err(TemplateError::new(open, "can't give argument to non-function"));
            }
            Ok(Action::Operand(operand))
        }
    }
}

fn into_operand(token: Token, open: usize) -> Result<Operand, TemplateError> {
    match token {
        Token::Dot => Ok(Operand::Root),
        Token::Field(name) => Ok(Operand::Field(name)),
        Token::Literal(value) => Ok(Operand::Literal(value)),
        Token::Identifier(name) => Err(TemplateError::new(open, format!("unexpected identifier {name:?} in operand list"))),
    }
}

fn render_operand(operand: &Operand, args: &ArgumentSet) -> String {
    match operand {
        Operand::Root => render_argument_map(args),
        Operand::Literal(value) => value.clone(),
        Operand::Field(name) => match args.get(name) {
            Some(value) => value.clone(),
            None => {
                warn!(argument = %name, "identity template references an undefined argument");
                MISSING_VALUE.to_string()
            }
        },
    }
}

fn render_argument_map(args: &ArgumentSet) -> String {
    let mut entries: Vec<(&String, &String)> = args.iter().collect();
    entries.sort_unstable_by(|left, right| left.0.cmp(right.0));
    let body = entries.into_iter().map(|(key, value)| format!("{key}:{value}")).collect::<Vec<_>>().join(" ");
    format!("map[{body}]")
}

fn hash_operands(operands: &[Operand], args: &ArgumentSet) -> u32 {
    let mut hasher = Fnv1Hasher32::new();
    if operands.is_empty() {
        warn!("no hash arguments provided, hashing all arguments; replace {{{{ hash }}}} with {{{{ hash . }}}} in the workflow ID recipe");
        hasher.write(&canonical_arguments(args));
        return hasher.finish();
    }

    for operand in operands {
        match operand {
            Operand::Root => hasher.write(&canonical_arguments(args)),
            Operand::Literal(value) => hasher.write(&canonical_value(&Value::String(value.clone()))),
            Operand::Field(name) => match args.get(name) {
                Some(value) => hasher.write(&canonical_value(&Value::String(value.clone()))),
                None => {
                    warn!(argument = %name, "hash operand references an undefined argument");
                    hasher.write(&canonical_value(&Value::Null));
                }
            },
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> ArgumentSet {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    fn render(source: &str, arguments: &ArgumentSet) -> String {
        IdentityTemplate::parse(source).unwrap().render(arguments)
    }

    #[test]
    fn substitutes_named_arguments() {
        let arguments = args(&[("one", "1"), ("two", "2")]);
        assert_eq!(render("id_{{.one}}_{{.two}}", &arguments), "id_1_2");
        assert_eq!(render("id_{{ .one }}_{{ .two }}", &arguments), "id_1_2");
    }

    #[test]
    fn text_without_actions_is_copied() {
        assert_eq!(render("static-id", &ArgumentSet::new()), "static-id");
    }

    #[test]
    fn undefined_arguments_render_placeholder() {
        assert_eq!(render("id_{{ .missing }}", &args(&[("one", "1")])), "id_<no value>");
    }

    #[test]
    fn root_renders_sorted_map() {
        let arguments = args(&[("two", "2"), ("one", "1")]);
        assert_eq!(render("{{ . }}", &arguments), "map[one:1 two:2]");
    }

    #[test]
    fn hash_of_root_is_stable_across_insertion_order() {
        let forward = args(&[("one", "1"), ("two", "2")]);
        let reverse = args(&[("two", "2"), ("one", "1")]);
        assert_eq!(render("id_{{ hash . }}", &forward), "id_3822076040");
        assert_eq!(render("id_{{ hash . }}", &reverse), "id_3822076040");
    }

    #[test]
    fn hash_of_named_arguments_ignores_other_entries() {
        let narrow = args(&[("one", "1"), ("two", "2")]);
        let wide = args(&[("one", "1"), ("two", "2"), ("three", "3")]);
        assert_eq!(render("{{ hash .one .two }}", &narrow), "1475351198");
        assert_eq!(render("{{ hash .one .two }}", &wide), "1475351198");
    }

    #[test]
    fn bare_hash_hashes_everything() {
        let arguments = args(&[("one", "1"), ("two", "2")]);
        assert_eq!(render("{{ hash }}", &arguments), render("{{ hash . }}", &arguments));
    }

    #[test]
    fn string_literals_and_trim_markers() {
        let arguments = args(&[("one", "1")]);
        assert_eq!(render("a  {{- \"-\" -}}  {{ .one }}", &arguments), "a-1");
        assert_eq!(render("{{ `raw` }}", &arguments), "raw");
    }

    #[test]
    fn comments_render_nothing() {
        assert_eq!(render("a{{/* note */}}b", &ArgumentSet::new()), "ab");
    }

    #[test]
    fn empty_template_renders_empty_identity() {
        let template = IdentityTemplate::parse("").unwrap();
        assert_eq!(template.render(&args(&[("one", "1")])), "");
    }

    #[test]
    fn rejects_malformed_templates() {
        let unclosed = IdentityTemplate::parse("id_{{ .one").unwrap_err();
        assert_eq!(unclosed.offset, 3);
        assert!(IdentityTemplate::parse("{{ }}").is_err());
        assert!(IdentityTemplate::parse("{{ upper .one }}").is_err());
        assert!(IdentityTemplate::parse("{{ .one .two }}").is_err());
        assert!(IdentityTemplate::parse("{{ \"open }}").is_err());
        assert!(IdentityTemplate::parse("{{ .a.b }}").is_err());
        assert!(IdentityTemplate::parse("{{ hash upper }}").is_err());
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = IdentityTemplate::parse("wf-{{ .customer }}-{{ hash .customer . }}").unwrap();
        let arguments = args(&[("customer", "acme"), ("region", "eu")]);
        let first = template.render(&arguments);
        for _ in 0..5 {
            assert_eq!(template.render(&arguments), first);
        }
    }
}

//! `{placeholder}` substitution for prompt and runner templates.
//!
//! # Syntax
//!
//! - `{name}` - Substitutes the parameter `name` (surrounding whitespace is trimmed)
//! - `{{` - Renders as literal `{`
//! - `}}` - Renders as literal `}`
//!
//! A placeholder without a value is an error rather than an empty string, so a
//! typo in an operation template never reaches the agent as a silently
//! truncated instruction.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Error type for template rendering failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder was referenced but no parameter supplied it.
    #[error("missing required parameter '{name}' at position {position} in template")]
    MissingParameter { name: String, position: usize },

    /// A `{` was found without a matching `}`.
    #[error("unmatched '{{' at position {position} in template")]
    UnmatchedBrace { position: usize },

    /// `{}` with nothing inside.
    #[error("empty placeholder '{{}}' at position {position} in template")]
    EmptyPlaceholder { position: usize },
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Brace(char),
    Placeholder { name: &'a str, position: usize },
}

/// Split a template into literal text, escaped braces and placeholders.
fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                push_text(&mut segments, &template[literal_start..i]);
                segments.push(Segment::Brace('{'));
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                push_text(&mut segments, &template[literal_start..i]);
                segments.push(Segment::Brace('}'));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                push_text(&mut segments, &template[literal_start..i]);
                let close = template[i + 1..]
                    .find('}')
                    .ok_or(TemplateError::UnmatchedBrace { position: i })?;
                let raw = &template[i + 1..i + 1 + close];
                if raw.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder { position: i });
                }
                segments.push(Segment::Placeholder {
                    name: raw.trim(),
                    position: i,
                });
                i += close + 2;
                literal_start = i;
            }
            _ => i += 1,
        }
    }
    push_text(&mut segments, &template[literal_start..]);

    Ok(segments)
}

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
}

/// Render a template by substituting parameters.
///
/// ```ignore
/// let params = params([("method", "POST"), ("path", "/users")]);
/// let out = render("Create endpoint {method} {path}", &params)?;
/// assert_eq!(out, "Create endpoint POST /users");
/// ```
pub fn render(template: &str, params: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Brace(c) => out.push(c),
            Segment::Placeholder { name, position } => match params.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(TemplateError::MissingParameter {
                        name: name.to_string(),
                        position,
                    });
                }
            },
        }
    }
    Ok(out)
}

/// Names of the placeholders a template requires, sorted and deduplicated.
///
/// Used to build one CLI flag per parameter of an operation.
pub fn placeholders(template: &str) -> Result<BTreeSet<String>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder { name, .. } => Some(name.to_string()),
            _ => None,
        })
        .collect())
}

/// Build a parameter map from key-value pairs.
pub fn params<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_endpoint_template() {
        let p = params([("method", "POST"), ("path", "/users")]);
        let out = render("Create endpoint {method} {path}", &p).unwrap();
        assert_eq!(out, "Create endpoint POST /users");
    }

    #[test]
    fn plain_text_and_empty_template() {
        let p = HashMap::new();
        assert_eq!(render("Just plain text", &p).unwrap(), "Just plain text");
        assert_eq!(render("", &p).unwrap(), "");
    }

    #[test]
    fn escaped_braces_render_literally() {
        let p = params([("x", "value")]);
        assert_eq!(
            render("{{escaped}} and {x}", &p).unwrap(),
            "{escaped} and value"
        );
        assert_eq!(render("a }} b", &p).unwrap(), "a } b");
        assert_eq!(render("a } b", &p).unwrap(), "a } b");
    }

    #[test]
    fn missing_parameter_reports_name_and_position() {
        let err = render("Hello {name}", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingParameter {
                name: "name".to_string(),
                position: 6
            }
        );
        assert_eq!(
            err.to_string(),
            "missing required parameter 'name' at position 6 in template"
        );
    }

    #[test]
    fn unmatched_and_empty_braces_are_errors() {
        let p = HashMap::new();
        assert_eq!(
            render("Hello {name", &p).unwrap_err(),
            TemplateError::UnmatchedBrace { position: 6 }
        );
        assert_eq!(
            render("Hello {}", &p).unwrap_err(),
            TemplateError::EmptyPlaceholder { position: 6 }
        );
    }

    #[test]
    fn whitespace_inside_placeholder_is_trimmed() {
        let p = params([("name", "Alice")]);
        assert_eq!(render("Hello { name }!", &p).unwrap(), "Hello Alice!");
    }

    #[test]
    fn values_are_not_reinterpreted() {
        let p = params([("code", "if (x) { return {y}; }")]);
        assert_eq!(
            render("Code: {code}", &p).unwrap(),
            "Code: if (x) { return {y}; }"
        );
    }

    #[test]
    fn multibyte_text_around_placeholders() {
        let p = params([("text", "日本語")]);
        assert_eq!(render("héllo {text} ✓", &p).unwrap(), "héllo 日本語 ✓");
    }

    #[test]
    fn placeholders_are_sorted_and_unique() {
        let names = placeholders("{path} {method} {path} {{literal}}").unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["method".to_string(), "path".to_string()]
        );
    }

    #[test]
    fn placeholders_propagate_syntax_errors() {
        assert!(placeholders("{open").is_err());
    }
}

//! Resolution of `#{name}` parameter markers in statement templates.
//!
//! A template such as `SELECT * FROM users WHERE id = #{id}` is compiled once, at registration,
//! into driver SQL with numbered placeholders (`?1`, `?2`, ...) plus the ordered list of
//! properties to bind. Markers inside string literals, quoted identifiers, comments and
//! dollar-quoted blocks are left alone.
//!
//! A marker may name a conversion with `#{name, kind=int}`; the value is coerced to that kind
//! before it reaches the driver.

mod scanner;

use scanner::{
    State, is_block_comment_end, is_block_comment_start, is_line_comment_start, is_marker_start,
    matches_tag, scan_marker, try_start_dollar_quote,
};

use crate::error::SqlMapperError;
use crate::types::ScalarKind;

/// One `#{...}` marker: the property it reads and an optional conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterMapping {
    pub property: String,
    pub kind: Option<ScalarKind>,
}

impl ParameterMapping {
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind: None,
        }
    }
}

/// A template compiled into driver SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
}

/// Compile `#{...}` markers into `?N` placeholders.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` for an unterminated or empty marker, or an unknown
/// `kind`.
pub fn parse_parameter_markers(template: &str) -> Result<ParsedSql, SqlMapperError> {
    let mut out = String::with_capacity(template.len());
    let mut mappings = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = template.as_bytes();
    let mut copied_to = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                _ if is_marker_start(bytes, idx) => {
                    let (end, body) = scan_marker(template, idx).ok_or_else(|| {
                        SqlMapperError::ConfigError(format!(
                            "unterminated parameter marker at offset {idx} in: {template}"
                        ))
                    })?;
                    mappings.push(parse_marker_body(body, template)?);
                    out.push_str(&template[copied_to..idx]);
                    out.push('?');
                    out.push_str(&mappings.len().to_string());
                    idx = end;
                    copied_to = end + 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                } else if is_block_comment_end(bytes, idx) {
                    if depth == 1 {
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len;
                }
            }
        }

        idx += 1;
    }

    out.push_str(&template[copied_to.min(template.len())..]);
    Ok(ParsedSql {
        sql: out,
        parameter_mappings: mappings,
    })
}

fn parse_marker_body(body: &str, template: &str) -> Result<ParameterMapping, SqlMapperError> {
    let mut parts = body.split(',').map(str::trim);
    let property = parts.next().unwrap_or_default();
    if property.is_empty() {
        return Err(SqlMapperError::ConfigError(format!(
            "empty parameter marker in: {template}"
        )));
    }
    let mut mapping = ParameterMapping::new(property);
    for attr in parts {
        match attr.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
            Some(("kind", value)) => mapping.kind = Some(parse_kind(value)?),
            _ => {
                return Err(SqlMapperError::ConfigError(format!(
                    "unsupported attribute '{attr}' in parameter marker '{body}'"
                )));
            }
        }
    }
    Ok(mapping)
}

fn parse_kind(value: &str) -> Result<ScalarKind, SqlMapperError> {
    match value.to_ascii_lowercase().as_str() {
        "int" | "integer" | "bigint" => Ok(ScalarKind::Int),
        "float" | "real" | "double" => Ok(ScalarKind::Float),
        "text" | "varchar" | "string" => Ok(ScalarKind::Text),
        "bool" | "boolean" => Ok(ScalarKind::Bool),
        "timestamp" | "datetime" => Ok(ScalarKind::Timestamp),
        "json" => Ok(ScalarKind::Json),
        "blob" | "bytes" => Ok(ScalarKind::Blob),
        other => Err(SqlMapperError::ConfigError(format!(
            "unknown parameter kind '{other}'"
        ))),
    }
}

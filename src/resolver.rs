//! Variable Resolver - Single-Pass Placeholder Expansion
//!
//! Supports exactly one syntax: `${NAME}`. Substituted values are never
//! rescanned, so resolution is bounded by the template length.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unresolved variable '{0}': not declared in the environment")]
    Undefined(String),

    #[error("Unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("Nested placeholder inside '${{{0}'")]
    Nested(String),

    #[error("Variable '{0}' expands to another placeholder; recursive substitution is not supported")]
    SelfReferential(String),
}

/// Expand every `${NAME}` in `template` against `bindings`.
///
/// Left-to-right single pass. An undeclared name is an error, never an
/// empty-string substitution.
pub fn resolve(template: &str, bindings: &BTreeMap<String, String>) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            let start = i;
            let body_start = i + 2;
            let mut j = body_start;
            loop {
                if j >= bytes.len() {
                    return Err(ResolveError::Unterminated(start));
                }
                match bytes[j] {
                    b'}' => break,
                    b'$' if j + 1 < bytes.len() && bytes[j + 1] == b'{' => {
                        return Err(ResolveError::Nested(
                            template[body_start..j].to_string(),
                        ));
                    }
                    _ => j += 1,
                }
            }
            let name = &template[body_start..j];
            let value = bindings
                .get(name)
                .ok_or_else(|| ResolveError::Undefined(name.to_string()))?;
            if value.contains("${") {
                return Err(ResolveError::SelfReferential(name.to_string()));
            }
            out.push_str(value);
            i = j + 1;
        } else {
            // Safe to index char boundaries: advance by the full UTF-8 char.
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    Ok(out)
}

/// Placeholder names appearing in `template`, in order of appearance.
/// Malformed placeholders are skipped here; `resolve` reports them.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("${") {
        let body = &rest[open + 2..];
        match body.find('}') {
            Some(close) if !body[..close].contains("${") => {
                names.push(&body[..close]);
                rest = &body[close + 1..];
            }
            _ => break,
        }
    }
    names
}

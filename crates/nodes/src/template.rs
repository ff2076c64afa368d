//! `{{var}}` placeholder substitution against the execution context.

use serde_json::Value;

use crate::Context;

/// Replace every `{{key}}` placeholder in `template` with the context value
/// stored under `key`.
///
/// Keys that are missing from the context (or hold `null`) leave the
/// placeholder literal in place; substitution never fails.
pub fn render(template: &str, context: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match context.get(key) {
                    Some(value) if !value.is_null() => out.push_str(&render_value(value)),
                    _ => {
                        // Unknown placeholder stays literal.
                        out.push_str(&rest[start..start + 2 + end + 2]);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated braces: emit the remainder verbatim.
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Condition evaluation strategies.
//!
//! A condition node must always produce a branch: every strategy resolves to
//! the `"true"` or `"false"` handle, and anything ambiguous — unknown type
//! tag, unparseable operand, invalid pattern — takes the false branch with a
//! warning instead of failing the step. Only adapter failures (the AI-backed
//! `intent` strategy) propagate as errors, so the engine's retry policy
//! applies to them.

use std::str::FromStr;

use serde_json::{json, Value};

use crate::kind::ConditionData;
use crate::traits::{AdapterSet, Context, NodeOutcome};
use crate::NodeError;

pub const TRUE_HANDLE: &str = "true";
pub const FALSE_HANDLE: &str = "false";

/// The documented condition strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    /// Case-insensitive containment of the condition string in the message.
    Text,
    /// `"<var> <op> <number>"` or `"<op> <number>"` against the message.
    Number,
    /// Regular-expression match against the message.
    Regex,
    /// AI-backed intent classification.
    Intent,
}

impl FromStr for ConditionType {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "regex" => Ok(Self::Regex),
            "intent" => Ok(Self::Intent),
            other => Err(NodeError::UnsupportedConditionType(other.to_string())),
        }
    }
}

/// Evaluate a condition node against the context.
pub async fn execute(
    data: &ConditionData,
    context: &Context,
    adapters: &AdapterSet,
) -> Result<NodeOutcome, NodeError> {
    let message = message_content(context);

    let strategy = match data.condition_type.as_deref() {
        Some(tag) => match ConditionType::from_str(tag) {
            Ok(strategy) => strategy,
            Err(err) => return Ok(branch_outcome(data, false).with_warning(err.to_string())),
        },
        None => {
            return Ok(branch_outcome(data, false)
                .with_warning("condition node has no condition type, defaulting to false"))
        }
    };

    let verdict = match strategy {
        ConditionType::Text => Ok(contains_ignore_case(&message, &data.condition)),
        ConditionType::Number => evaluate_numeric(&data.condition, &message, context),
        ConditionType::Regex => match regex::Regex::new(&data.condition) {
            Ok(pattern) => Ok(pattern.is_match(&message)),
            Err(e) => Err(format!("invalid regex '{}': {e}", data.condition)),
        },
        ConditionType::Intent => {
            let matched = adapters
                .intent
                .matches_intent(&data.condition, &message)
                .await?;
            Ok(matched)
        }
    };

    Ok(match verdict {
        Ok(result) => branch_outcome(data, result),
        Err(warning) => branch_outcome(data, false).with_warning(warning),
    })
}

/// The conversation message the strategies evaluate against.
///
/// Seeded under the `message` key by the webhook/test entry points; an
/// execution started without one evaluates against the empty string.
fn message_content(context: &Context) -> String {
    match context.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

fn branch_outcome(data: &ConditionData, result: bool) -> NodeOutcome {
    let mut output = Context::new();
    output.insert("condition_result".into(), Value::Bool(result));
    output.insert("condition".into(), json!(data.condition));
    let handle = if result { TRUE_HANDLE } else { FALSE_HANDLE };
    NodeOutcome::branch(output, handle)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// `"idade >= 18"` compares `context["idade"]`; `">= 18"` compares the
/// message itself. Returns `Err(warning)` when the expression or operand
/// cannot be parsed.
fn evaluate_numeric(condition: &str, message: &str, context: &Context) -> Result<bool, String> {
    let tokens: Vec<&str> = condition.split_whitespace().collect();
    let (lhs, op, rhs) = match tokens.as_slice() {
        [var, op, num] => (lookup_number(context, var)?, *op, *num),
        [op, num] => (parse_number(message).map_err(|_| {
            format!("message '{message}' is not numeric")
        })?, *op, *num),
        _ => return Err(format!("unparseable numeric condition '{condition}'")),
    };

    let rhs = parse_number(rhs).map_err(|_| format!("'{rhs}' is not a number"))?;

    match op {
        "==" => Ok((lhs - rhs).abs() < f64::EPSILON),
        "!=" => Ok((lhs - rhs).abs() >= f64::EPSILON),
        "<" => Ok(lhs < rhs),
        "<=" => Ok(lhs <= rhs),
        ">" => Ok(lhs > rhs),
        ">=" => Ok(lhs >= rhs),
        other => Err(format!("unknown comparison operator '{other}'")),
    }
}

fn lookup_number(context: &Context, key: &str) -> Result<f64, String> {
    match context.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("context key '{key}' is not a finite number")),
        Some(Value::String(s)) => {
            parse_number(s).map_err(|_| format!("context key '{key}' ('{s}') is not numeric"))
        }
        Some(other) => Err(format!("context key '{key}' ({other}) is not numeric")),
        None => Err(format!("context key '{key}' is missing")),
    }
}

fn parse_number(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.trim().parse::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    fn condition(condition: &str, condition_type: Option<&str>) -> ConditionData {
        ConditionData {
            label: None,
            condition: condition.to_string(),
            condition_type: condition_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn text_condition_matches_case_insensitively() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "preciso de AJUDA por favor" }));

        let outcome = execute(&condition("ajuda", Some("text")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(TRUE_HANDLE));
        assert_eq!(outcome.output["condition_result"], json!(true));
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn text_condition_misses_to_false_handle() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "bom dia" }));

        let outcome = execute(&condition("ajuda", Some("text")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
    }

    #[tokio::test]
    async fn missing_condition_type_warns_and_takes_false_branch() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "qualquer coisa" }));

        let outcome = execute(&condition("ajuda", None), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
        assert!(outcome.warning.is_some());
    }

    #[tokio::test]
    async fn unknown_condition_type_warns_instead_of_failing() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "oi" }));

        let outcome = execute(&condition("ajuda", Some("telepathy")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
        let warning = outcome.warning.expect("expected a warning");
        assert!(warning.contains("telepathy"));
    }

    #[tokio::test]
    async fn numeric_condition_against_context_variable() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "idade": 21 }));

        let outcome = execute(&condition("idade >= 18", Some("number")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(TRUE_HANDLE));
    }

    #[tokio::test]
    async fn numeric_condition_against_message() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "3" }));

        let outcome = execute(&condition("> 5", Some("number")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn non_numeric_message_warns() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "não sei" }));

        let outcome = execute(&condition("> 5", Some("number")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
        assert!(outcome.warning.is_some());
    }

    #[tokio::test]
    async fn regex_condition_matches() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "pedido 1234" }));

        let outcome = execute(&condition(r"pedido \d+", Some("regex")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(TRUE_HANDLE));
    }

    #[tokio::test]
    async fn invalid_regex_warns_and_takes_false_branch() {
        let adapters = mock::mock_adapters();
        let context = ctx(json!({ "message": "oi" }));

        let outcome = execute(&condition("(unclosed", Some("regex")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(FALSE_HANDLE));
        assert!(outcome.warning.unwrap().contains("invalid regex"));
    }

    #[tokio::test]
    async fn intent_condition_consults_the_adapter() {
        let adapters = mock::MockAdapters::new()
            .intent_result(true)
            .into_set();
        let context = ctx(json!({ "message": "quero cancelar minha compra" }));

        let outcome = execute(&condition("cancelamento", Some("intent")), &context, &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.selected_handle.as_deref(), Some(TRUE_HANDLE));
    }
}

//! Trigger matching — decides whether an inbound message starts a flow.
//!
//! `trigger_conditions` is an opaque key/value map authored alongside the
//! flow. Understood keys:
//!
//! - `"keyword"` — string or array of strings; case-insensitive containment.
//! - `"exact"`   — case-insensitive equality after trimming.
//! - `"any"`     — `true` matches every message.
//!
//! A flow with an empty condition map never matches; catching all traffic is
//! an explicit opt-in via `any`.

use serde_json::Value;

use crate::models::{Flow, FlowStatus};

/// Whether `flow` should be started for this inbound message.
///
/// Only active flows are eligible.
pub fn matches(flow: &Flow, message: &str) -> bool {
    if flow.status != FlowStatus::Active {
        return false;
    }

    let conditions = &flow.trigger_conditions;
    if conditions
        .get("any")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return true;
    }

    if let Some(exact) = conditions.get("exact").and_then(Value::as_str) {
        if message.trim().eq_ignore_ascii_case(exact.trim()) {
            return true;
        }
    }

    match conditions.get("keyword") {
        Some(Value::String(keyword)) => contains_keyword(message, keyword),
        Some(Value::Array(keywords)) => keywords
            .iter()
            .filter_map(Value::as_str)
            .any(|keyword| contains_keyword(message, keyword)),
        _ => false,
    }
}

fn contains_keyword(message: &str, keyword: &str) -> bool {
    !keyword.is_empty() && message.to_lowercase().contains(&keyword.to_lowercase())
}

/// The first active flow whose trigger matches, in the given order.
pub fn first_match<'a>(flows: &'a [Flow], message: &str) -> Option<&'a Flow> {
    flows.iter().find(|flow| matches(flow, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flow_with(status: FlowStatus, conditions: Value) -> Flow {
        let mut flow = Flow::new("test");
        flow.status = status;
        flow.trigger_conditions = conditions.as_object().cloned().unwrap_or_default();
        flow
    }

    #[test]
    fn keyword_matches_case_insensitively() {
        let flow = flow_with(FlowStatus::Active, json!({ "keyword": "ajuda" }));
        assert!(matches(&flow, "Preciso de AJUDA agora"));
        assert!(!matches(&flow, "bom dia"));
    }

    #[test]
    fn keyword_list_matches_any_entry() {
        let flow = flow_with(
            FlowStatus::Active,
            json!({ "keyword": ["pedido", "entrega"] }),
        );
        assert!(matches(&flow, "cadê minha entrega?"));
        assert!(!matches(&flow, "oi"));
    }

    #[test]
    fn exact_requires_full_equality() {
        let flow = flow_with(FlowStatus::Active, json!({ "exact": "menu" }));
        assert!(matches(&flow, "  MENU "));
        assert!(!matches(&flow, "menu principal"));
    }

    #[test]
    fn empty_conditions_never_match() {
        let flow = flow_with(FlowStatus::Active, json!({}));
        assert!(!matches(&flow, "qualquer coisa"));
    }

    #[test]
    fn any_is_an_explicit_catch_all() {
        let flow = flow_with(FlowStatus::Active, json!({ "any": true }));
        assert!(matches(&flow, "qualquer coisa"));
    }

    #[test]
    fn inactive_flows_are_ignored() {
        let flow = flow_with(FlowStatus::Draft, json!({ "any": true }));
        assert!(!matches(&flow, "oi"));
    }

    #[test]
    fn first_match_respects_order() {
        let first = flow_with(FlowStatus::Active, json!({ "keyword": "oi" }));
        let second = flow_with(FlowStatus::Active, json!({ "any": true }));
        let flows = vec![first.clone(), second];
        assert_eq!(first_match(&flows, "oi tudo bem").unwrap().id, first.id);
    }
}

//! The node-kind model — one tagged variant per node type.
//!
//! These payloads are the source of truth for what a node's `data` column
//! contains. Field names follow the editor's wire format (camelCase), so a
//! node saved by the flow builder deserialises without translation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::NodeError;

/// A node's behaviour tag plus its type-specific payload.
///
/// Stored split across two columns (`type` TEXT + `data` JSONB); use
/// [`NodeKind::from_parts`] / [`NodeKind::to_parts`] to cross that seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point. Exactly one per flow.
    Start,
    /// Sends a message to the contact through the delivery adapter.
    Message(MessageData),
    /// Evaluates a condition and branches on the `"true"`/`"false"` handle.
    Condition(ConditionData),
    /// Performs a side effect (webhook, transfer, variable, wait).
    Action(ActionData),
    /// Terminates the execution.
    End(EndData),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageData {
    pub label: Option<String>,
    /// Message body; `{{var}}` placeholders are substituted from context.
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionData {
    pub label: Option<String>,
    pub condition: String,
    /// One of `text`, `number`, `regex`, `intent`. Unknown or missing types
    /// take the false branch with a warning rather than failing the step.
    pub condition_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionData {
    pub label: Option<String>,
    /// One of `webhook`, `chatbot`, `department`, `set_variable`, `wait`.
    pub action_type: Option<String>,
    /// Free-form action configuration (webhook URL, etc).
    pub action: Option<Value>,
    pub chatbot_id: Option<String>,
    pub department: Option<String>,
    /// `set_variable`: name of the context key to write.
    pub variable: Option<String>,
    /// `set_variable`: value to store under `variable`.
    pub value: Option<Value>,
    /// `wait`: how long to pause before following the outgoing edge.
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndData {
    pub label: Option<String>,
    /// One of `success`, `transfer`, `timeout`, `error`. Informational.
    pub end_type: Option<String>,
}

impl NodeKind {
    /// Reassemble a kind from the persisted `type` tag and `data` payload.
    pub fn from_parts(kind: &str, data: Value) -> Result<Self, NodeError> {
        let mut tagged = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(NodeError::Fatal(format!(
                    "node data must be an object, got {other}"
                )))
            }
        };
        tagged.insert("type".into(), Value::String(kind.to_string()));
        serde_json::from_value(Value::Object(tagged))
            .map_err(|e| NodeError::Fatal(format!("invalid '{kind}' node data: {e}")))
    }

    /// Split back into the persisted `(type, data)` pair.
    pub fn to_parts(&self) -> (String, Value) {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        let kind = match value.as_object_mut() {
            Some(map) => map
                .remove("type")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            None => String::new(),
        };
        (kind, value)
    }

    /// The wire tag (`start`, `message`, …), used for log action labels.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Message(_) => "message",
            Self::Condition(_) => "condition",
            Self::Action(_) => "action",
            Self::End(_) => "end",
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_node_roundtrips_through_parts() {
        let kind = NodeKind::from_parts(
            "message",
            json!({ "label": "Greet", "message": "Olá {{name}}" }),
        )
        .expect("valid message data");

        match &kind {
            NodeKind::Message(data) => assert_eq!(data.message, "Olá {{name}}"),
            other => panic!("expected message node, got {other:?}"),
        }

        let (tag, data) = kind.to_parts();
        assert_eq!(tag, "message");
        assert_eq!(data["message"], "Olá {{name}}");
    }

    #[test]
    fn start_node_tolerates_editor_extras() {
        let kind = NodeKind::from_parts("start", json!({ "label": "Início" }))
            .expect("start with label");
        assert!(kind.is_start());
    }

    #[test]
    fn condition_payload_keeps_camel_case_wire_names() {
        let kind = NodeKind::from_parts(
            "condition",
            json!({ "condition": "ajuda", "conditionType": "text" }),
        )
        .expect("valid condition data");

        match kind {
            NodeKind::Condition(data) => {
                assert_eq!(data.condition_type.as_deref(), Some("text"))
            }
            other => panic!("expected condition node, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_tag_is_rejected() {
        assert!(NodeKind::from_parts("teleport", json!({})).is_err());
    }

    #[test]
    fn null_data_is_treated_as_empty() {
        let kind = NodeKind::from_parts("end", Value::Null).expect("end with no data");
        assert!(kind.is_end());
    }
}

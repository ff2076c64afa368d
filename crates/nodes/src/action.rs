//! Action dispatch — one fixed kind per `action_type` tag.

use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};

use crate::kind::ActionData;
use crate::traits::{AdapterSet, Context, ExecutionScope, NodeOutcome};
use crate::NodeError;

/// The fixed set of action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// POST the execution context to an external URL.
    Webhook,
    /// Hand the conversation to another chatbot.
    TransferChatbot,
    /// Hand the conversation to a human department.
    TransferDepartment,
    /// Write a value into the execution context.
    SetVariable,
    /// Pause before following the outgoing edge.
    Wait,
}

impl FromStr for ActionType {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(Self::Webhook),
            "chatbot" => Ok(Self::TransferChatbot),
            "department" => Ok(Self::TransferDepartment),
            "set_variable" => Ok(Self::SetVariable),
            "wait" => Ok(Self::Wait),
            other => Err(NodeError::UnsupportedAction(other.to_string())),
        }
    }
}

/// Execute an action node and return the adapter's result as output.
pub async fn execute(
    data: &ActionData,
    scope: &ExecutionScope,
    context: &Context,
    adapters: &AdapterSet,
) -> Result<NodeOutcome, NodeError> {
    let Some(tag) = data.action_type.as_deref() else {
        return Err(NodeError::UnsupportedAction("(unset)".into()));
    };

    let mut output = Context::new();
    output.insert("action_executed".into(), Value::Bool(true));
    output.insert("action".into(), json!(tag));

    match ActionType::from_str(tag)? {
        ActionType::Webhook => {
            let url = webhook_url(data)?;
            let payload = json!({
                "execution_id": scope.execution_id,
                "contact": scope.contact,
                "context": context,
            });
            let response = adapters.webhook.call(&url, &payload).await?;
            output.insert("webhook_response".into(), response);
        }
        ActionType::TransferChatbot => {
            let chatbot_id = data.chatbot_id.as_deref().ok_or_else(|| {
                NodeError::Fatal("chatbot transfer action missing 'chatbotId'".into())
            })?;
            let result = adapters.transfer.to_chatbot(chatbot_id, &scope.contact).await?;
            output.insert("transfer".into(), result);
        }
        ActionType::TransferDepartment => {
            let department = data.department.as_deref().ok_or_else(|| {
                NodeError::Fatal("department transfer action missing 'department'".into())
            })?;
            let result = adapters
                .transfer
                .to_department(department, &scope.contact)
                .await?;
            output.insert("transfer".into(), result);
        }
        ActionType::SetVariable => {
            let variable = data.variable.as_deref().ok_or_else(|| {
                NodeError::Fatal("set_variable action missing 'variable'".into())
            })?;
            let value = data.value.clone().unwrap_or(Value::Null);
            output.insert(variable.to_string(), value);
        }
        ActionType::Wait => {
            let millis = data.duration_ms.unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            output.insert("waited_ms".into(), json!(millis));
        }
    }

    Ok(NodeOutcome::next(output))
}

fn webhook_url(data: &ActionData) -> Result<String, NodeError> {
    let url = match &data.action {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Object(map)) => map
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    };
    url.ok_or_else(|| NodeError::Fatal("webhook action missing a target URL".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockAdapters};
    use uuid::Uuid;

    fn scope() -> ExecutionScope {
        ExecutionScope {
            flow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            channel_id: "test".into(),
            contact: "+5511999990000".into(),
        }
    }

    fn action(tag: &str) -> ActionData {
        ActionData {
            action_type: Some(tag.to_string()),
            ..ActionData::default()
        }
    }

    #[tokio::test]
    async fn unknown_action_type_is_unsupported() {
        let adapters = mock::mock_adapters();
        let err = execute(&action("teleport"), &scope(), &Context::new(), &adapters)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedAction(tag) if tag == "teleport"));
    }

    #[tokio::test]
    async fn missing_action_type_is_unsupported() {
        let adapters = mock::mock_adapters();
        let err = execute(
            &ActionData::default(),
            &scope(),
            &Context::new(),
            &adapters,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedAction(_)));
    }

    #[tokio::test]
    async fn webhook_action_posts_context_payload() {
        let mocks = MockAdapters::new();
        let adapters = mocks.clone().into_set();

        let mut data = action("webhook");
        data.action = Some(serde_json::json!("https://example.com/hook"));

        let outcome = execute(&data, &scope(), &Context::new(), &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.output["action"], serde_json::json!("webhook"));
        assert!(outcome.output.contains_key("webhook_response"));
        let calls = mocks.webhook_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://example.com/hook");
    }

    #[tokio::test]
    async fn set_variable_action_writes_into_output() {
        let adapters = mock::mock_adapters();
        let mut data = action("set_variable");
        data.variable = Some("etapa".into());
        data.value = Some(serde_json::json!("boas-vindas"));

        let outcome = execute(&data, &scope(), &Context::new(), &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.output["etapa"], serde_json::json!("boas-vindas"));
    }

    #[tokio::test]
    async fn transfer_department_requires_a_department() {
        let adapters = mock::mock_adapters();
        let err = execute(&action("department"), &scope(), &Context::new(), &adapters)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_action_sleeps_for_the_configured_duration() {
        let adapters = mock::mock_adapters();
        let mut data = action("wait");
        data.duration_ms = Some(1500);

        let before = tokio::time::Instant::now();
        let outcome = execute(&data, &scope(), &Context::new(), &adapters)
            .await
            .unwrap();

        assert!(before.elapsed() >= Duration::from_millis(1500));
        assert_eq!(outcome.output["waited_ms"], serde_json::json!(1500));
    }
}

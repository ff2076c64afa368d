//! Per-kind node execution — the single dispatch point the engine calls.

use serde_json::{json, Value};

use crate::kind::{EndData, MessageData, NodeKind};
use crate::traits::{AdapterSet, Context, ExecutionScope, NodeOutcome};
use crate::{action, condition, template, NodeError};

/// Execute one node and report its outcome.
///
/// Executors never mutate execution state; the engine is the sole writer.
pub async fn execute(
    kind: &NodeKind,
    scope: &ExecutionScope,
    context: &Context,
    adapters: &AdapterSet,
) -> Result<NodeOutcome, NodeError> {
    match kind {
        NodeKind::Start => {
            let mut output = Context::new();
            output.insert("message".into(), json!("Flow started"));
            Ok(NodeOutcome::next(output))
        }
        NodeKind::Message(data) => execute_message(data, scope, context, adapters).await,
        NodeKind::Condition(data) => condition::execute(data, context, adapters).await,
        NodeKind::Action(data) => action::execute(data, scope, context, adapters).await,
        NodeKind::End(data) => Ok(execute_end(data)),
    }
}

async fn execute_message(
    data: &MessageData,
    scope: &ExecutionScope,
    context: &Context,
    adapters: &AdapterSet,
) -> Result<NodeOutcome, NodeError> {
    let body = template::render(&data.message, context);
    let delivery = adapters
        .delivery
        .send(&scope.channel_id, &scope.contact, &body)
        .await?;

    let mut output = Context::new();
    output.insert("message_sent".into(), Value::Bool(true));
    output.insert("message".into(), json!(body));
    output.insert("delivery".into(), delivery);
    Ok(NodeOutcome::next(output))
}

fn execute_end(data: &EndData) -> NodeOutcome {
    let mut output = Context::new();
    output.insert("message".into(), json!("Flow completed"));
    if let Some(end_type) = &data.end_type {
        output.insert("end_type".into(), json!(end_type));
    }
    NodeOutcome::finished(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdapters;
    use uuid::Uuid;

    fn scope() -> ExecutionScope {
        ExecutionScope {
            flow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            channel_id: "wa-123".into(),
            contact: "+5511988887777".into(),
        }
    }

    #[tokio::test]
    async fn start_node_reports_flow_started() {
        let adapters = MockAdapters::new().into_set();
        let outcome = execute(&NodeKind::Start, &scope(), &Context::new(), &adapters)
            .await
            .unwrap();

        assert_eq!(outcome.output["message"], json!("Flow started"));
        assert!(!outcome.terminal);
        assert!(outcome.selected_handle.is_none());
    }

    #[tokio::test]
    async fn message_node_renders_and_delivers() {
        let mocks = MockAdapters::new();
        let adapters = mocks.clone().into_set();

        let kind = NodeKind::Message(MessageData {
            label: None,
            message: "Olá {{name}}".into(),
        });
        let mut context = Context::new();
        context.insert("name".into(), json!("Ana"));

        let outcome = execute(&kind, &scope(), &context, &adapters).await.unwrap();

        assert_eq!(outcome.output["message"], json!("Olá Ana"));
        let sent = mocks.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, "Olá Ana");
    }

    #[tokio::test]
    async fn end_node_is_terminal() {
        let adapters = MockAdapters::new().into_set();
        let kind = NodeKind::End(EndData {
            label: None,
            end_type: Some("success".into()),
        });

        let outcome = execute(&kind, &scope(), &Context::new(), &adapters)
            .await
            .unwrap();

        assert!(outcome.terminal);
        assert_eq!(outcome.output["end_type"], json!("success"));
    }
}

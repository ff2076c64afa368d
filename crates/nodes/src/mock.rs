//! Recording mock adapters — test doubles for every adapter seam.
//!
//! Useful in unit and integration tests, and as the adapter set behind dry
//! runs, where reaching a real external service is never acceptable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::traits::{
    AdapterSet, IntentEvaluator, MessageDelivery, TransferDispatcher, WebhookCaller,
};
use crate::NodeError;

#[derive(Default)]
struct MockState {
    sent: Vec<(String, String, String)>,
    webhook_calls: Vec<(String, Value)>,
    transfers: Vec<(String, String, String)>,
    intent_queries: Vec<(String, String)>,
    intent_result: bool,
    delivery_failures_left: u32,
    webhook_failures_left: u32,
    delivery_fatal: Option<String>,
}

/// One mock that implements every adapter trait and records each call.
///
/// Clone it before converting into an [`AdapterSet`] to keep a handle for
/// assertions; all clones share the same recorded state.
#[derive(Clone, Default)]
pub struct MockAdapters {
    state: Arc<Mutex<MockState>>,
}

impl MockAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every intent query with the given verdict.
    pub fn intent_result(self, result: bool) -> Self {
        self.state.lock().unwrap().intent_result = result;
        self
    }

    /// Fail the next `n` deliveries with a retryable error, then succeed.
    pub fn fail_delivery_times(self, n: u32) -> Self {
        self.state.lock().unwrap().delivery_failures_left = n;
        self
    }

    /// Fail the next `n` webhook calls with a retryable error, then succeed.
    pub fn fail_webhook_times(self, n: u32) -> Self {
        self.state.lock().unwrap().webhook_failures_left = n;
        self
    }

    /// Fail every delivery fatally with the given message.
    pub fn delivery_fatal(self, msg: impl Into<String>) -> Self {
        self.state.lock().unwrap().delivery_fatal = Some(msg.into());
        self
    }

    /// Bundle this mock behind every adapter seam.
    pub fn into_set(self) -> AdapterSet {
        let shared = Arc::new(self);
        AdapterSet {
            delivery: shared.clone(),
            intent: shared.clone(),
            webhook: shared.clone(),
            transfer: shared,
        }
    }

    /// Every `(channel, to, body)` triple delivered so far, in call order.
    pub fn sent_messages(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn webhook_calls(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().webhook_calls.clone()
    }

    pub fn transfers(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn intent_queries(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().intent_queries.clone()
    }
}

#[async_trait]
impl MessageDelivery for MockAdapters {
    async fn send(&self, channel_id: &str, to: &str, body: &str) -> Result<Value, NodeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.delivery_fatal {
            return Err(NodeError::Fatal(msg.clone()));
        }
        if state.delivery_failures_left > 0 {
            state.delivery_failures_left -= 1;
            return Err(NodeError::Retryable("mock delivery failure".into()));
        }
        state
            .sent
            .push((channel_id.to_string(), to.to_string(), body.to_string()));
        Ok(json!({ "delivered": true, "to": to }))
    }
}

#[async_trait]
impl IntentEvaluator for MockAdapters {
    async fn matches_intent(&self, intent: &str, content: &str) -> Result<bool, NodeError> {
        let mut state = self.state.lock().unwrap();
        state
            .intent_queries
            .push((intent.to_string(), content.to_string()));
        Ok(state.intent_result)
    }
}

#[async_trait]
impl WebhookCaller for MockAdapters {
    async fn call(&self, url: &str, payload: &Value) -> Result<Value, NodeError> {
        let mut state = self.state.lock().unwrap();
        if state.webhook_failures_left > 0 {
            state.webhook_failures_left -= 1;
            return Err(NodeError::Retryable("mock webhook failure".into()));
        }
        state.webhook_calls.push((url.to_string(), payload.clone()));
        Ok(json!({ "status": 200 }))
    }
}

#[async_trait]
impl TransferDispatcher for MockAdapters {
    async fn to_chatbot(&self, chatbot_id: &str, contact: &str) -> Result<Value, NodeError> {
        self.state.lock().unwrap().transfers.push((
            "chatbot".into(),
            chatbot_id.to_string(),
            contact.to_string(),
        ));
        Ok(json!({ "transferred": true, "chatbot_id": chatbot_id }))
    }

    async fn to_department(&self, department: &str, contact: &str) -> Result<Value, NodeError> {
        self.state.lock().unwrap().transfers.push((
            "department".into(),
            department.to_string(),
            contact.to_string(),
        ));
        Ok(json!({ "transferred": true, "department": department }))
    }
}

/// A fresh mock adapter set with default behaviour (everything succeeds,
/// intents never match).
pub fn mock_adapters() -> AdapterSet {
    MockAdapters::new().into_set()
}

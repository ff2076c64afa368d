//! HTTP-backed adapter implementations.
//!
//! Concrete providers: the WhatsApp Cloud API for message delivery, an
//! OpenAI chat completion for intent classification, and a generic JSON
//! poster for webhook actions. Each takes its configuration explicitly at
//! construction time and shares one `reqwest::Client`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::traits::{IntentEvaluator, MessageDelivery, TransferDispatcher, WebhookCaller};
use crate::NodeError;

fn transport_error(what: &str, err: reqwest::Error) -> NodeError {
    // Connection/timeout problems are worth retrying; the engine decides.
    NodeError::Retryable(format!("{what}: {err}"))
}

fn status_error(what: &str, status: reqwest::StatusCode, body: String) -> NodeError {
    if status.is_server_error() {
        NodeError::Retryable(format!("{what} returned {status}: {body}"))
    } else {
        NodeError::Fatal(format!("{what} returned {status}: {body}"))
    }
}

// ---------------------------------------------------------------------------
// WhatsApp Cloud API delivery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Graph API base, e.g. `https://graph.facebook.com/v18.0`.
    pub api_base: String,
    pub access_token: String,
}

impl WhatsAppConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api_base: "https://graph.facebook.com/v18.0".into(),
            access_token: access_token.into(),
        }
    }
}

/// Sends text messages through the WhatsApp Cloud API.
///
/// The channel id passed to [`MessageDelivery::send`] is the provider's
/// phone-number id.
pub struct WhatsAppDelivery {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppDelivery {
    pub fn new(client: reqwest::Client, config: WhatsAppConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MessageDelivery for WhatsAppDelivery {
    async fn send(&self, channel_id: &str, to: &str, body: &str) -> Result<Value, NodeError> {
        let url = format!("{}/{}/messages", self.config.api_base, channel_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }))
            .send()
            .await
            .map_err(|e| transport_error("whatsapp send", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("whatsapp send", status, body));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| transport_error("whatsapp response", e))?;
        info!(to, "delivered whatsapp message");
        Ok(json!({ "message_sent": true, "provider_response": result }))
    }
}

// ---------------------------------------------------------------------------
// OpenAI intent evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            api_key: api_key.into(),
            model: "gpt-4".into(),
        }
    }
}

const INTENT_SYSTEM_PROMPT: &str = "Você é um classificador de intenção. \
Responda apenas 'sim' se a mensagem do usuário expressa a intenção indicada, \
ou 'não' caso contrário.";

/// Classifies user intent with a chat completion: the model answers
/// `sim`/`não` and anything starting with "s"/"y" counts as a match.
pub struct OpenAiIntentEvaluator {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiIntentEvaluator {
    pub fn new(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IntentEvaluator for OpenAiIntentEvaluator {
    async fn matches_intent(&self, intent: &str, content: &str) -> Result<bool, NodeError> {
        let url = format!("{}/chat/completions", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": INTENT_SYSTEM_PROMPT },
                    {
                        "role": "user",
                        "content": format!("Intenção: {intent}\nMensagem: {content}"),
                    },
                ],
                "max_tokens": 5,
                "temperature": 0.0,
            }))
            .send()
            .await
            .map_err(|e| transport_error("openai completion", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("openai completion", status, body));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| transport_error("openai response", e))?;
        let answer = result["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        Ok(answer.starts_with('s') || answer.starts_with('y'))
    }
}

// ---------------------------------------------------------------------------
// Generic webhook poster
// ---------------------------------------------------------------------------

/// POSTs the action payload as JSON and returns the response body (or a
/// `{"status": …}` object when the body is not JSON).
pub struct JsonWebhookCaller {
    client: reqwest::Client,
}

impl JsonWebhookCaller {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookCaller for JsonWebhookCaller {
    async fn call(&self, url: &str, payload: &Value) -> Result<Value, NodeError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error("webhook call", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("webhook call", status, body));
        }

        let code = status.as_u16();
        Ok(response
            .json()
            .await
            .unwrap_or_else(|_| json!({ "status": code })))
    }
}

// ---------------------------------------------------------------------------
// Transfer dispatch
// ---------------------------------------------------------------------------

/// Records hand-off requests by notifying an internal endpoint.
///
/// The inbox/attendant side of a transfer lives outside the engine; this
/// adapter only tells it a conversation changed hands.
pub struct HttpTransferDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransferDispatcher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn dispatch(&self, payload: Value) -> Result<Value, NodeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("transfer dispatch", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("transfer dispatch", status, body));
        }

        Ok(json!({ "transferred": true }))
    }
}

#[async_trait]
impl TransferDispatcher for HttpTransferDispatcher {
    async fn to_chatbot(&self, chatbot_id: &str, contact: &str) -> Result<Value, NodeError> {
        self.dispatch(json!({
            "kind": "chatbot",
            "chatbot_id": chatbot_id,
            "contact": contact,
        }))
        .await
    }

    async fn to_department(&self, department: &str, contact: &str) -> Result<Value, NodeError> {
        self.dispatch(json!({
            "kind": "department",
            "department": department,
            "contact": contact,
        }))
        .await
    }
}

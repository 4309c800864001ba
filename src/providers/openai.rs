use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{CompletionStream, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::stream::into_stream;
use super::utils::{
    get_usage, messages_to_openai_spec, response_to_message, tools_to_openai_spec,
};
use crate::errors::TransportError;
use crate::models::message::Message;
use crate::registry::ToolDescriptor;

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(OpenAiProviderConfig::from_env()?)?)
    }

    fn payload(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
        stream: bool,
    ) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(system, messages),
        });
        let body = payload.as_object_mut().unwrap();
        if !tools.is_empty() {
            body.insert("tools".to_string(), Value::Array(tools_to_openai_spec(tools)));
        }
        if let Some(temperature) = self.config.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if stream {
            body.insert("stream".to_string(), json!(true));
        }
        payload
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response, TransportError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        debug!(%url, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<(Message, Usage), TransportError> {
        let response = self
            .post(self.payload(system, messages, tools, false))
            .await?;
        let body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            return Err(TransportError::Response(format!("endpoint error: {error}")));
        }

        let message = response_to_message(&body)?;
        let usage = get_usage(&body);
        Ok((message, usage))
    }

    async fn complete_stream(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionStream, TransportError> {
        let response = self
            .post(self.payload(system, messages, tools, true))
            .await?;
        Ok(into_stream(response))
    }
}

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{wire_messages, LlmProvider, Message};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": wire_messages(system_prompt, messages),
            "temperature": 0.0,
            "response_format": { "type": "json_object" },
        });

        tracing::debug!(model = %self.model, turns = messages.len(), "calling groq");

        let resp = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("groq request failed")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("groq returned a non-JSON body")?;

        if !status.is_success() {
            anyhow::bail!("groq error ({status}): {data}");
        }

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("groq response has no message content"))
    }
}

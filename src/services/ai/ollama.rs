use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{wire_messages, LlmProvider, Message};

pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": wire_messages(system_prompt, messages),
            "format": "json",
            "stream": false,
            "options": { "temperature": 0 },
        });

        tracing::debug!(model = %self.model, turns = messages.len(), "calling ollama");

        let resp = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .context("ollama request failed")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("ollama returned a non-JSON body")?;

        if !status.is_success() {
            anyhow::bail!("ollama error ({status}): {data}");
        }

        data["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("ollama response has no message content"))
    }
}

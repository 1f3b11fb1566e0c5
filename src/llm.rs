use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// A chat-style language model that turns a system instruction and a prompt
/// into a single completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    num_predict: usize,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, num_predict: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            num_predict,
        }
    }
}

#[async_trait]
impl CompletionModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct ChatReq<'a> {
            model: &'a str,
            messages: [ChatMessage<'a>; 2],
            stream: bool,
            format: &'a str,
            options: ChatOptions,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatOptions {
            num_predict: usize,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResp {
            message: ChatRespMessage,
        }

        #[derive(Deserialize)]
        struct ChatRespMessage {
            content: String,
        }

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&ChatReq {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt,
                    },
                ],
                stream: false,
                format: "json",
                options: ChatOptions {
                    num_predict: self.num_predict,
                    temperature: 0.1,
                },
            })
            .send()
            .await
            .context("failed to call ollama chat endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/chat returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<ChatResp>()
            .await
            .context("failed to decode ollama /api/chat response")?;

        Ok(response.message.content.trim().to_string())
    }
}

/// Stands in for the model service when running without one; every call fails
/// so callers take their fallback path.
#[derive(Clone, Debug, Default)]
pub struct OfflineModel;

#[async_trait]
impl CompletionModel for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        anyhow::bail!("model service disabled for this run")
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}

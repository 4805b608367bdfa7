//! Cloud-backed `InferenceProvider`, adapted from the teacher's
//! `http_input/llm_client.rs` provider-detection and request plumbing,
//! extended with tool-call parsing since the ReAct loop (C3) needs it.

use async_trait::async_trait;
use std::time::Duration;

use crate::agent::{CancellationToken, Conversation, MessageRole};
use crate::config::{LlmConfig, LlmProviderKind};
use crate::llm::{
    FinishReason, InferenceError, InferenceOptions, InferenceProvider, InferenceResponse,
    ToolCallRequest, Usage,
};

pub struct CloudLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl CloudLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.call_timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    fn to_openai_messages(conversation: &Conversation) -> Vec<serde_json::Value> {
        conversation
            .messages()
            .iter()
            .map(|m| match m.role {
                MessageRole::System => serde_json::json!({"role": "system", "content": m.content}),
                MessageRole::User => serde_json::json!({"role": "user", "content": m.content}),
                MessageRole::Assistant if !m.tool_calls.is_empty() => serde_json::json!({
                    "role": "assistant",
                    "content": serde_json::Value::Null,
                    "tool_calls": m.tool_calls.iter().map(|tc| serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.arguments.to_string()},
                    })).collect::<Vec<_>>(),
                }),
                MessageRole::Assistant => serde_json::json!({"role": "assistant", "content": m.content}),
                MessageRole::Tool => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
            })
            .collect()
    }

    async fn openai_compatible(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
    ) -> Result<InferenceResponse, InferenceError> {
        let tools: Vec<serde_json::Value> = options
            .tool_definitions
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": Self::to_openai_messages(conversation),
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools);
        }

        let start = std::time::Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Provider(format!("{status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::ParseError(e.to_string()))?;
        let latency = start.elapsed();

        let message = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| InferenceError::ParseError("missing choices[0].message".into()))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let function = tc.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        let arguments = function
                            .get("arguments")
                            .and_then(|a| a.as_str())
                            .unwrap_or("{}")
                            .to_string();
                        Some(ToolCallRequest { id, name, arguments })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };

        let usage = json
            .get("usage")
            .map(|u| Usage {
                prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        tracing::info!(
            provider = %self.config.provider,
            model = %self.config.model,
            total_tokens = usage.total_tokens,
            latency_ms = latency.as_millis() as u64,
            "llm call completed"
        );

        Ok(InferenceResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    async fn anthropic(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
    ) -> Result<InferenceResponse, InferenceError> {
        let system = conversation
            .messages()
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let messages: Vec<serde_json::Value> = conversation
            .messages()
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| serde_json::json!({"role": if m.role == MessageRole::Assistant {"assistant"} else {"user"}, "content": m.content}))
            .collect();

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": options.max_tokens,
            "system": system,
            "messages": messages,
        });

        let response = self
            .http
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Provider(format!("{status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::ParseError(e.to_string()))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.iter().find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text")))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(InferenceResponse {
            content,
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }
}

#[async_trait]
impl InferenceProvider for CloudLlmClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse, InferenceError> {
        if cancel.is_cancelled() {
            return Err(InferenceError::Cancelled);
        }
        let call = async {
            match self.config.provider {
                LlmProviderKind::Anthropic => self.anthropic(conversation, options).await,
                LlmProviderKind::OpenRouter | LlmProviderKind::OpenAI => {
                    self.openai_compatible(conversation, options).await
                }
            }
        };
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.config.call_timeout)),
        }
    }
}

impl Default for CloudLlmClient {
    fn default() -> Self {
        Self::new(LlmConfig {
            provider: LlmProviderKind::OpenAI,
            api_key: String::new(),
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
            temperature: 0.3,
            call_timeout: Duration::from_secs(30),
        })
    }
}

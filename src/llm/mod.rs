//! LLM Driver (C2, §4.2): issues prompts, returns an assistant message that
//! is either a natural-language reply, a tool-call request, or a final
//! answer. Adapted from the teacher's `reasoning/inference.rs`
//! `InferenceProvider` trait and `http_input/llm_client.rs`'s
//! provider-detection/HTTP plumbing.

#[cfg(feature = "cloud-llm")]
pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::conversation::Conversation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    MaxTokens,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for a single inference call. Temperature is pinned at 0.3 per
/// §4.2: "deterministic enough for reliable ReAct."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOptions {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_definitions: Vec<ToolDefinition>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            tool_definitions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl InferenceResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Error, Debug, Clone)]
pub enum InferenceError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("CANCELLED")]
    Cancelled,

    #[error("TIMEOUT after {0:?}")]
    Timeout(std::time::Duration),

    #[error("response parse error: {0}")]
    ParseError(String),
}

/// A capability, not a specific vendor (§4.2): any compliant implementer
/// may back this.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &InferenceOptions,
        cancel: &crate::agent::CancellationToken,
    ) -> Result<InferenceResponse, InferenceError>;
}

/// A scripted provider for tests: returns queued responses in order,
/// mirroring the teacher's `MockProvider` test doubles.
pub struct MockInferenceProvider {
    responses: std::sync::Mutex<std::collections::VecDeque<InferenceResponse>>,
}

impl MockInferenceProvider {
    pub fn new(responses: Vec<InferenceResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl InferenceProvider for MockInferenceProvider {
    async fn complete(
        &self,
        _conversation: &Conversation,
        _options: &InferenceOptions,
        cancel: &crate::agent::CancellationToken,
    ) -> Result<InferenceResponse, InferenceError> {
        if cancel.is_cancelled() {
            return Err(InferenceError::Cancelled);
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| InferenceError::Provider("mock exhausted".into()))
    }
}

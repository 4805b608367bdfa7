//! The bounded ReAct iteration (§4.3). Sequential by construction — "ReAct
//! is inherently sequential" (§4.6.2) — so unlike the teacher's
//! `executor.rs` parallel `FuturesUnordered` tool dispatch, this drives
//! exactly one tool call at a time.

use std::sync::Arc;

use crate::agent::{CancellationToken, Conversation, ConversationMessage, ToolCall};
use crate::llm::{InferenceError, InferenceOptions, InferenceProvider};
use crate::tools::ToolSurface;
use crate::types::SessionId;

#[derive(Debug, Clone, Copy)]
pub struct ReactConfig {
    pub max_iterations: u32,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactTermination {
    /// A `Final Answer:` marker was found in the terminal assistant message.
    FinalAnswer,
    /// §4.3: "MAX_ITERATIONS reached: treat as empty result; C6 may retry."
    MaxIterations,
    Cancelled,
    /// The driver itself failed (timeout, provider error) and did not
    /// recover within this attempt.
    DriverError(String),
}

pub struct ReactOutcome {
    pub transcript: Conversation,
    pub termination: ReactTermination,
    pub total_tokens: u32,
}

/// Marker the system prompt instructs the model to emit when done.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

fn contains_final_answer(content: &str) -> bool {
    content.contains(FINAL_ANSWER_MARKER)
}

/// Drives C2 against C1 until a Final Answer appears or the iteration
/// bound is hit. `system_prompt` and the seeded `user_prompt` build the
/// starting transcript; callers own constructing those from the agent
/// input (profile, round, adaptive hints).
pub async fn run_react_loop(
    provider: &dyn InferenceProvider,
    tools: Arc<dyn ToolSurface>,
    session_id: SessionId,
    system_prompt: String,
    user_prompt: String,
    tool_definitions: Vec<crate::llm::ToolDefinition>,
    config: ReactConfig,
    cancel: &CancellationToken,
) -> ReactOutcome {
    let mut transcript = Conversation::with_system(system_prompt);
    transcript.push(ConversationMessage::user(user_prompt));

    let options = InferenceOptions {
        tool_definitions,
        ..InferenceOptions::default()
    };

    let mut total_tokens = 0u32;

    for _iteration in 0..config.max_iterations {
        if cancel.is_cancelled() {
            return ReactOutcome {
                transcript,
                termination: ReactTermination::Cancelled,
                total_tokens,
            };
        }

        let response = match provider.complete(&transcript, &options, cancel).await {
            Ok(r) => r,
            Err(InferenceError::Cancelled) => {
                return ReactOutcome {
                    transcript,
                    termination: ReactTermination::Cancelled,
                    total_tokens,
                }
            }
            Err(e) => {
                return ReactOutcome {
                    transcript,
                    termination: ReactTermination::DriverError(e.to_string()),
                    total_tokens,
                }
            }
        };
        total_tokens += response.usage.total_tokens;

        if response.has_tool_calls() {
            let mut calls = Vec::new();
            for tc in &response.tool_calls {
                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or(serde_json::Value::Null);
                calls.push(ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                });
            }
            transcript.push(ConversationMessage::assistant_tool_calls(calls.clone()));

            // Strictly sequential: each tool call's observation is
            // appended before the next thought is requested (§4.3's
            // "every tool call must be followed by the tool's
            // observation before the next thought").
            for call in calls {
                let result = tools.invoke(session_id, &call.name, call.arguments).await;
                let observation = match result {
                    Ok(value) => value.to_string(),
                    Err(crate::tools::ToolError::UnknownTool(name)) => {
                        serde_json::json!({"error": "UNKNOWN_TOOL", "name": name}).to_string()
                    }
                    Err(e) => serde_json::json!({"error": e.to_string()}).to_string(),
                };
                transcript.push(ConversationMessage::tool_result(call.id, observation));
            }
            continue;
        }

        if contains_final_answer(&response.content) {
            transcript.push(ConversationMessage::assistant(response.content));
            return ReactOutcome {
                transcript,
                termination: ReactTermination::FinalAnswer,
                total_tokens,
            };
        }

        transcript.push(ConversationMessage::assistant(response.content));
    }

    ReactOutcome {
        transcript,
        termination: ReactTermination::MaxIterations,
        total_tokens,
    }
}

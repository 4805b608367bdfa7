//! Assessment Core: an adaptive technical-assessment engine.
//!
//! An LLM-driven item-generation agent (C1-C5) runs a bounded ReAct loop
//! over a fixed tool surface, feeding a round/session state machine
//! (C6-C7, C10) and a scoring pipeline (C8-C9) that normalizes answer
//! schemas, scores by item type with time penalties, and derives the next
//! round's difficulty and category mix.

pub mod adaptive;
pub mod agent;
pub mod answer_schema;
pub mod autosave;
pub mod config;
pub mod error;
pub mod generation;
#[cfg(feature = "http-api")]
pub mod http;
pub mod llm;
pub mod logging;
pub mod output;
pub mod scoring;
pub mod session_machine;
pub mod store;
pub mod tools;
pub mod types;

pub use error::{AssessmentError, AssessmentResult};

//! ReAct Loop (C3, §4.3): bounded iteration driving C2 against C1 until a
//! Final Answer is produced. Grounded on the teacher's
//! `reasoning/loop_types.rs` (`LoopConfig`, `TerminationReason`) and
//! `reasoning/conversation.rs` (transcript type), generalized from a
//! general-purpose agent loop down to this system's fixed six-tool surface.

pub mod conversation;
pub mod react_loop;

pub use conversation::{Conversation, ConversationMessage, MessageRole, ToolCall};
pub use react_loop::{run_react_loop, ReactConfig, ReactOutcome, ReactTermination};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag (§5: "every long-running operation
/// accepts a cancellation signal"; §9: "checked at each iteration
/// boundary"). Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

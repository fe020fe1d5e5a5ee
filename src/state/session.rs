use super::thread::{ConversationThread, FileRef, Message};
use crate::error::TurnError;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Assistant,
    Error,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Error => "error",
        }
    }
}

/// One rendered line of the conversation as the user saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl ChatEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingStream,
    Streaming,
    RequiresAction,
    ResolvingTools,
    Completed,
    Failed,
}

impl TurnPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingStream => "awaiting_stream",
            Self::Streaming => "streaming",
            Self::RequiresAction => "requires_action",
            Self::ResolvingTools => "resolving_tools",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Session-scoped conversation state. Only the turn in flight mutates it.
#[derive(Debug, Default)]
pub struct SessionState {
    pub thread: Option<ConversationThread>,
    pub chat_log: Vec<ChatEntry>,
    pub in_progress: bool,
    pub tool_calls_seen: HashSet<String>,
    phase: TurnPhase,
    pending_attachments: Vec<FileRef>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: TurnPhase) {
        if self.phase != phase {
            tracing::debug!(from = self.phase.as_str(), to = phase.as_str(), "turn phase");
            self.phase = phase;
        }
    }

    /// Claims the session for a new turn; rejects input while one is in flight.
    pub fn begin_turn(&mut self) -> Result<(), TurnError> {
        if self.in_progress {
            return Err(TurnError::Busy);
        }
        self.in_progress = true;
        self.set_phase(TurnPhase::AwaitingStream);
        Ok(())
    }

    pub fn end_turn(&mut self, phase: TurnPhase) {
        self.in_progress = false;
        self.set_phase(phase);
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread.as_ref().map(ConversationThread::id)
    }

    pub fn push_entry(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.chat_log.push(ChatEntry::new(speaker, text));
    }

    /// Appends to the thread log when a thread exists.
    pub fn record_message(&mut self, message: Message) {
        if let Some(thread) = self.thread.as_mut() {
            thread.append(message);
        }
    }

    /// Returns false when `tool_call_id` was already finalised.
    pub fn mark_tool_call_seen(&mut self, tool_call_id: &str) -> bool {
        self.tool_calls_seen.insert(tool_call_id.to_string())
    }

    pub fn attach(&mut self, file: FileRef) {
        self.pending_attachments.push(file);
    }

    pub fn pending_attachments(&self) -> &[FileRef] {
        &self.pending_attachments
    }

    pub fn take_attachments(&mut self) -> Vec<FileRef> {
        std::mem::take(&mut self.pending_attachments)
    }

    /// Read-only copy of the chat log for exporters.
    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.chat_log.clone()
    }

    /// Clears the visible log and the in-progress flag; the thread is kept.
    pub fn reset_chat(&mut self) {
        self.chat_log.clear();
        self.in_progress = false;
        self.set_phase(TurnPhase::Idle);
    }

    /// Drops everything, including the thread.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

//! Error types shared by the transport, the tool layer and the turn controller.

use thiserror::Error;

/// Failures talking to the remote run protocol.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("cannot reach API endpoint '{url}': {message}")]
    Connect { url: String, message: String },

    #[error("API request to '{url}' timed out: {message}")]
    Timeout { url: String, message: String },

    #[error("API endpoint '{url}' returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("API request to '{url}' failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("event stream error: {0}")]
    Stream(String),
}

/// A tool invocation that raised. Contained per call: the message becomes the
/// call's output instead of aborting the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("tool '{tool}' failed: {message}")]
pub struct ToolExecutionError {
    pub tool: String,
    pub message: String,
}

/// Everything that can end a user turn early.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("a turn is already in progress")]
    Busy,

    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error("could not decode arguments for '{function_name}' (call {tool_call_id}): {reason}")]
    ArgumentDecode {
        tool_call_id: String,
        function_name: String,
        reason: String,
    },

    #[error("unknown tool '{name}' requested by call {tool_call_id}")]
    UnknownTool { tool_call_id: String, name: String },

    #[error("tool call {tool_call_id} appears more than once in one batch")]
    DuplicateToolCall { tool_call_id: String },

    #[error("run {run_id} failed: {message}")]
    RunFailed { run_id: String, message: String },

    #[error("run still requires tool outputs after {rounds} round trips")]
    Stalled { rounds: usize },
}

pub mod conversation;
pub mod partial;
pub mod session;
pub mod thread;

pub use conversation::{
    PendingToolBatch, SessionController, StreamEventDispatcher, StreamOutcome, ToolCallCoordinator,
    ToolCallRequest, ToolCallResult, DEFAULT_MAX_TOOL_ROUNDS,
};
pub use partial::{PartialMessage, PartialToolInput};
pub use session::{ChatEntry, SessionState, Speaker, TurnPhase};
pub use thread::{ConversationThread, FileRef, Message, Role};

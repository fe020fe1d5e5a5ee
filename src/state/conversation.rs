mod coordinator;
mod core;
mod dispatcher;


pub use self::core::{SessionController, DEFAULT_MAX_TOOL_ROUNDS};
pub use coordinator::{PendingToolBatch, ToolCallCoordinator, ToolCallRequest, ToolCallResult};
pub use dispatcher::{StreamEventDispatcher, StreamOutcome};

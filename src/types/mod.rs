pub mod api_types;
pub mod events;

pub use api_types::*;
pub use events::{
    Annotation, CodeOutput, StreamEvent, ToolCallDetails, ToolCallKind, ToolCallSnapshot,
};

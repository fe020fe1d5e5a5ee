pub mod markup;
pub mod render;
pub mod terminal;

pub use render::{RecordingRenderer, RenderOp, Renderer, SlotId};
pub use terminal::TerminalRenderer;

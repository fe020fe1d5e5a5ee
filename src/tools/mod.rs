pub mod builtin;
pub mod executor;
pub mod registry;

pub use builtin::{default_registry, FnTool};
pub use executor::WorkspaceTools;
pub use registry::{ParamKind, RegistryError, Tool, ToolArguments, ToolParameters, ToolRegistry};

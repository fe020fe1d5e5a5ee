use super::executor::WorkspaceTools;
use super::registry::{
    ParamKind, RegistryError, Tool, ToolArguments, ToolParameters, ToolRegistry,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

type ToolHandler = dyn Fn(&ToolArguments) -> anyhow::Result<String> + Send + Sync;

/// Closure-backed tool for quick registration.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(&ToolArguments) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn call(&self, arguments: &ToolArguments) -> anyhow::Result<String> {
        (self.handler)(arguments)
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

fn string_arg<'a>(arguments: &'a ToolArguments, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}

fn usize_arg(arguments: &ToolArguments, key: &str, default: usize) -> usize {
    arguments
        .get(key)
        .and_then(Value::as_u64)
        .map(|value| value as usize)
        .unwrap_or(default)
}

/// Read-only workspace tools rooted at `working_dir`.
pub fn workspace_tools(working_dir: PathBuf) -> Vec<FnTool> {
    let workspace = Arc::new(WorkspaceTools::new(working_dir));

    let read = Arc::clone(&workspace);
    let list = Arc::clone(&workspace);
    let search = workspace;

    vec![
        FnTool::new(
            "read_file",
            "Read a UTF-8 text file inside the workspace.",
            ToolParameters::new().required(
                "path",
                ParamKind::String,
                "Workspace-relative file path",
            ),
            move |arguments| read.read_file(string_arg(arguments, "path").unwrap_or_default()),
        ),
        FnTool::new(
            "list_files",
            "List files and directories under a workspace path.",
            ToolParameters::new()
                .optional("path", ParamKind::String, "Workspace-relative directory")
                .optional("max_entries", ParamKind::Integer, "Maximum entries (1-2000)"),
            move |arguments| {
                list.list_files(
                    string_arg(arguments, "path"),
                    usize_arg(arguments, "max_entries", 200),
                )
            },
        ),
        FnTool::new(
            "search_files",
            "Search text across workspace files and return matching lines.",
            ToolParameters::new()
                .required("query", ParamKind::String, "Text to look for")
                .optional("path", ParamKind::String, "Workspace-relative directory")
                .optional("max_results", ParamKind::Integer, "Maximum hits (1-200)"),
            move |arguments| {
                search.search_files(
                    string_arg(arguments, "query").unwrap_or_default(),
                    string_arg(arguments, "path"),
                    usize_arg(arguments, "max_results", 50),
                )
            },
        ),
    ]
}

/// Registry the binary starts with.
pub fn default_registry(working_dir: PathBuf) -> Result<ToolRegistry, RegistryError> {
    workspace_tools(working_dir)
        .into_iter()
        .try_fold(ToolRegistry::builder(), |builder, tool| builder.register(tool))
        .map(|builder| builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_fn_tool_forwards_arguments() {
        let tool = FnTool::new(
            "shout",
            "upper-cases text",
            ToolParameters::new().required("text", ParamKind::String, "input"),
            |arguments| {
                Ok(string_arg(arguments, "text")
                    .unwrap_or_default()
                    .to_uppercase())
            },
        );
        let arguments = json!({"text": "hi"}).as_object().cloned().unwrap();
        assert_eq!(tool.call(&arguments).unwrap(), "HI");
    }

    #[test]
    fn test_default_registry_exposes_workspace_tools() {
        let temp = TempDir::new().expect("temp dir");
        let registry = default_registry(temp.path().to_path_buf()).expect("registry");
        assert_eq!(
            registry.names(),
            vec!["list_files", "read_file", "search_files"]
        );
    }

    #[test]
    fn test_read_file_tool_reads_workspace_file() {
        let temp = TempDir::new().expect("temp dir");
        std::fs::write(temp.path().join("notes.txt"), "hello").unwrap();
        let registry = default_registry(temp.path().to_path_buf()).expect("registry");
        let tool = registry.get("read_file").expect("read_file");
        let arguments = json!({"path": "notes.txt"}).as_object().cloned().unwrap();
        assert_eq!(tool.call(&arguments).unwrap(), "hello");
    }
}

use super::api_types::{Run, WireAnnotation, WireCodeOutput, WireToolCall};

/// One step of a run's progress, in the order the remote produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    RunStarted {
        run_id: String,
    },
    TextCreated,
    /// `snapshot` is the complete text so far; `delta` is informational.
    TextDelta {
        delta: String,
        snapshot: String,
    },
    TextDone {
        text: String,
        annotations: Vec<Annotation>,
    },
    ToolCallCreated {
        call: ToolCallSnapshot,
    },
    /// Incremental fragments for one call; `input` is appended, never replaced.
    ToolCallDelta {
        call_id: String,
        kind: ToolCallKind,
        input: Option<String>,
        outputs: Vec<CodeOutput>,
    },
    ToolCallDone {
        call: ToolCallSnapshot,
    },
    RunRequiresAction {
        run: Run,
    },
    RunCompleted {
        run_id: String,
    },
    RunFailed {
        run_id: String,
        message: String,
    },
}

impl StreamEvent {
    /// Whether the run has reached a final state; nothing after it is read.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallKind {
    CodeInterpreter,
    Function,
    FileSearch,
}

impl ToolCallKind {
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "code_interpreter" => Some(Self::CodeInterpreter),
            "function" => Some(Self::Function),
            "file_search" => Some(Self::FileSearch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallSnapshot {
    pub id: String,
    pub details: ToolCallDetails,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallDetails {
    CodeInterpreter {
        input: String,
        outputs: Vec<CodeOutput>,
    },
    Function {
        name: String,
        arguments: String,
        output: Option<String>,
    },
    FileSearch,
}

impl ToolCallSnapshot {
    pub fn empty(id: impl Into<String>, kind: ToolCallKind) -> Self {
        let details = match kind {
            ToolCallKind::CodeInterpreter => ToolCallDetails::CodeInterpreter {
                input: String::new(),
                outputs: Vec::new(),
            },
            ToolCallKind::Function => ToolCallDetails::Function {
                name: String::new(),
                arguments: String::new(),
                output: None,
            },
            ToolCallKind::FileSearch => ToolCallDetails::FileSearch,
        };
        Self {
            id: id.into(),
            details,
        }
    }

    pub fn kind(&self) -> ToolCallKind {
        match self.details {
            ToolCallDetails::CodeInterpreter { .. } => ToolCallKind::CodeInterpreter,
            ToolCallDetails::Function { .. } => ToolCallKind::Function,
            ToolCallDetails::FileSearch => ToolCallKind::FileSearch,
        }
    }
}

impl From<WireToolCall> for ToolCallSnapshot {
    fn from(call: WireToolCall) -> Self {
        match call {
            WireToolCall::CodeInterpreter {
                id,
                code_interpreter,
            } => Self {
                id,
                details: ToolCallDetails::CodeInterpreter {
                    input: code_interpreter.input,
                    outputs: code_interpreter
                        .outputs
                        .into_iter()
                        .filter_map(CodeOutput::from_wire)
                        .collect(),
                },
            },
            WireToolCall::Function { id, function } => Self {
                id,
                details: ToolCallDetails::Function {
                    name: function.name,
                    arguments: function.arguments,
                    output: function.output,
                },
            },
            WireToolCall::FileSearch { id } => Self {
                id,
                details: ToolCallDetails::FileSearch,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutput {
    Logs(String),
    Image { file_id: String },
}

impl CodeOutput {
    pub fn from_wire(output: WireCodeOutput) -> Option<Self> {
        match output {
            WireCodeOutput::Logs { logs } => Some(Self::Logs(logs)),
            WireCodeOutput::Image { image } => Some(Self::Image {
                file_id: image.file_id,
            }),
            WireCodeOutput::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// A generated file referenced by `text` (usually a sandbox path inside a markdown link).
    FilePath { text: String, file_id: String },
    FileCitation { text: String, file_id: String },
}

impl Annotation {
    pub fn from_wire(annotation: WireAnnotation) -> Option<Self> {
        match annotation {
            WireAnnotation::FilePath { text, file_path } => Some(Self::FilePath {
                text,
                file_id: file_path.file_id,
            }),
            WireAnnotation::FileCitation {
                text,
                file_citation,
            } => Some(Self::FileCitation {
                text,
                file_id: file_citation.file_id,
            }),
            WireAnnotation::Other => None,
        }
    }
}

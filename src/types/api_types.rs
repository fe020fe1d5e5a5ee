use serde::{Deserialize, Serialize};

/// Response body of thread creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageCreate {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageAttachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

impl MessageAttachment {
    /// Attachments are usable by both code interpreter and file search.
    pub fn for_file(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            tools: vec![
                AttachmentTool {
                    kind: "code_interpreter".to_string(),
                },
                AttachmentTool {
                    kind: "file_search".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunCreate {
    pub assistant_id: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitToolOutputs {
    pub tool_outputs: Vec<ToolOutput>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// `error` events arrive either bare or wrapped in `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorEnvelope {
    Wrapped { error: ApiErrorBody },
    Bare(ApiErrorBody),
}

impl ApiErrorEnvelope {
    pub fn into_body(self) -> ApiErrorBody {
        match self {
            Self::Wrapped { error } => error,
            Self::Bare(body) => body,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub assistant_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
}

impl Run {
    /// Function calls the run is waiting on, in the order the remote listed them.
    pub fn pending_tool_calls(&self) -> &[RequiredToolCall] {
        self.required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequiredAction {
    pub submit_tool_outputs: RequiredToolOutputs,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequiredToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<RequiredToolCall>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequiredToolCall {
    pub id: String,
    pub function: RequiredFunction,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RequiredFunction {
    pub name: String,
    /// Serialized JSON object; decoded client-side before dispatch.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunLastError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireAnnotation {
    FilePath { text: String, file_path: FileIdRef },
    FileCitation { text: String, file_citation: FileIdRef },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileIdRef {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaEvent {
    pub id: String,
    pub delta: MessageDeltaBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub content: Vec<MessageContentDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContentDelta {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextDeltaBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextDeltaBody {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    pub step_details: StepDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<WireToolCall>,
    },
    #[serde(other)]
    MessageCreation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireToolCall {
    CodeInterpreter {
        id: String,
        code_interpreter: CodeInterpreterCall,
    },
    Function {
        id: String,
        function: FunctionCallBody,
    },
    FileSearch {
        id: String,
    },
}

impl WireToolCall {
    pub fn id(&self) -> &str {
        match self {
            Self::CodeInterpreter { id, .. } | Self::Function { id, .. } | Self::FileSearch { id } => {
                id
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeInterpreterCall {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub outputs: Vec<WireCodeOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCallBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireCodeOutput {
    Logs { logs: String },
    Image { image: FileIdRef },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunStepDeltaEvent {
    pub id: String,
    pub delta: RunStepDeltaBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunStepDeltaBody {
    #[serde(default)]
    pub step_details: Option<StepDetailsDelta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetailsDelta {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<ToolCallDeltaBody>,
    },
    #[serde(other)]
    MessageCreation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDeltaBody {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code_interpreter: Option<CodeInterpreterDelta>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeInterpreterDelta {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub outputs: Option<Vec<WireCodeOutput>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

use super::client::{FileContent, RunTransport};
use super::events::{event_stream, EventStream};
use crate::error::ApiError;
use crate::types::{FileObject, ToolOutput};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Every call a [`MockTransport`] received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateThread,
    CreateMessage {
        thread_id: String,
        content: String,
        attachment_ids: Vec<String>,
    },
    StreamRun {
        thread_id: String,
        assistant_id: String,
        additional_instructions: Option<String>,
    },
    SubmitToolOutputs {
        thread_id: String,
        run_id: String,
        outputs: Vec<ToolOutput>,
    },
    FileContent {
        file_id: String,
    },
    UploadFile {
        path: PathBuf,
    },
}

enum ScriptedStream {
    Frames(Vec<String>),
    Broken { frames: Vec<String>, message: String },
    Refused(String),
}

#[derive(Default)]
struct MockState {
    streams: VecDeque<ScriptedStream>,
    files: HashMap<String, FileContent>,
    calls: Vec<RecordedCall>,
    threads_created: usize,
}

/// Transport that replays scripted SSE responses through the real parser.
///
/// Each `stream_run` / `submit_tool_outputs` call consumes the next scripted
/// response; running out is reported as a stream error.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        let transport = Self::default();
        for frames in responses {
            transport.push_stream(frames);
        }
        transport
    }

    pub fn push_stream(&self, frames: Vec<String>) {
        self.lock().streams.push_back(ScriptedStream::Frames(frames));
    }

    /// Scripts a stream whose transport breaks after `frames`.
    pub fn push_broken_stream(&self, frames: Vec<String>, message: impl Into<String>) {
        self.lock().streams.push_back(ScriptedStream::Broken {
            frames,
            message: message.into(),
        });
    }

    /// Scripts a stream request the server refuses outright.
    pub fn push_refusal(&self, message: impl Into<String>) {
        self.lock()
            .streams
            .push_back(ScriptedStream::Refused(message.into()));
    }

    pub fn with_file(self, file_id: &str, bytes: &[u8], mime_type: &str) -> Self {
        self.lock().files.insert(
            file_id.to_string(),
            FileContent {
                bytes: Bytes::copy_from_slice(bytes),
                mime_type: mime_type.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Tool outputs of every resumption, one vector per submission.
    pub fn submitted_outputs(&self) -> Vec<Vec<ToolOutput>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::SubmitToolOutputs { outputs, .. } => Some(outputs.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn remaining_streams(&self) -> usize {
        self.lock().streams.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: RecordedCall) {
        self.lock().calls.push(call);
    }

    fn next_stream(&self) -> Result<EventStream, ApiError> {
        let scripted = self.lock().streams.pop_front();
        let (frames, failure) = match scripted {
            Some(ScriptedStream::Frames(frames)) => (frames, None),
            Some(ScriptedStream::Broken { frames, message }) => (frames, Some(message)),
            Some(ScriptedStream::Refused(message)) => {
                return Err(ApiError::Status {
                    url: "mock://runs".to_string(),
                    status: 500,
                    message,
                })
            }
            None => {
                return Err(ApiError::Stream(
                    "MockTransport: no more responses configured".to_string(),
                ))
            }
        };

        let mut chunks: Vec<Result<Bytes, ApiError>> = frames
            .into_iter()
            .map(|frame| {
                let framed = if frame.ends_with("\n\n") {
                    frame
                } else {
                    format!("{frame}\n\n")
                };
                Ok(Bytes::from(framed))
            })
            .collect();
        if let Some(message) = failure {
            chunks.push(Err(ApiError::Stream(message)));
        }
        Ok(event_stream(Box::pin(stream::iter(chunks))))
    }
}

#[async_trait]
impl RunTransport for MockTransport {
    async fn create_thread(&self) -> Result<String, ApiError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::CreateThread);
        state.threads_created += 1;
        Ok(format!("thread_{}", state.threads_created))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachment_ids: &[String],
    ) -> Result<(), ApiError> {
        self.record(RecordedCall::CreateMessage {
            thread_id: thread_id.to_string(),
            content: content.to_string(),
            attachment_ids: attachment_ids.to_vec(),
        });
        Ok(())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<EventStream, ApiError> {
        self.record(RecordedCall::StreamRun {
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            additional_instructions: additional_instructions.map(str::to_string),
        });
        self.next_stream()
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, ApiError> {
        self.record(RecordedCall::SubmitToolOutputs {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            outputs,
        });
        self.next_stream()
    }

    async fn file_content(&self, file_id: &str) -> Result<FileContent, ApiError> {
        self.record(RecordedCall::FileContent {
            file_id: file_id.to_string(),
        });
        self.lock()
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                url: format!("mock://files/{file_id}/content"),
                status: 404,
                message: format!("No such File object: {file_id}"),
            })
    }

    async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError> {
        self.record(RecordedCall::UploadFile {
            path: path.to_path_buf(),
        });
        Ok(FileObject {
            id: format!("file_{}", self.lock().calls.len()),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        })
    }
}

/// Builders for SSE frames of the assistant-run protocol.
pub mod frames {
    use serde_json::{json, Value};

    pub const THREAD_ID: &str = "thread_1";

    pub fn sse(event: &str, data: &Value) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    fn run(run_id: &str, status: &str) -> Value {
        json!({
            "id": run_id,
            "object": "thread.run",
            "thread_id": THREAD_ID,
            "assistant_id": "asst_1",
            "status": status,
        })
    }

    pub fn run_created(run_id: &str) -> String {
        sse("thread.run.created", &run(run_id, "queued"))
    }

    pub fn run_in_progress(run_id: &str) -> String {
        sse("thread.run.in_progress", &run(run_id, "in_progress"))
    }

    pub fn run_completed(run_id: &str) -> String {
        sse("thread.run.completed", &run(run_id, "completed"))
    }

    pub fn run_failed(run_id: &str, message: &str) -> String {
        let mut body = run(run_id, "failed");
        body["last_error"] = json!({ "code": "server_error", "message": message });
        sse("thread.run.failed", &body)
    }

    /// `calls` are `(call_id, function_name, serialized_arguments)`.
    pub fn run_requires_action(run_id: &str, calls: &[(&str, &str, &str)]) -> String {
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|(id, name, arguments)| {
                json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments },
                })
            })
            .collect();
        let mut body = run(run_id, "requires_action");
        body["required_action"] = json!({
            "type": "submit_tool_outputs",
            "submit_tool_outputs": { "tool_calls": tool_calls },
        });
        sse("thread.run.requires_action", &body)
    }

    pub fn message_delta(message_id: &str, value: &str) -> String {
        sse(
            "thread.message.delta",
            &json!({
                "id": message_id,
                "object": "thread.message.delta",
                "delta": {
                    "content": [
                        { "index": 0, "type": "text", "text": { "value": value } }
                    ]
                }
            }),
        )
    }

    pub fn message_completed(message_id: &str, value: &str) -> String {
        message_completed_annotated(message_id, value, Vec::new())
    }

    pub fn message_completed_annotated(
        message_id: &str,
        value: &str,
        annotations: Vec<Value>,
    ) -> String {
        sse(
            "thread.message.completed",
            &json!({
                "id": message_id,
                "object": "thread.message",
                "role": "assistant",
                "content": [
                    {
                        "type": "text",
                        "text": { "value": value, "annotations": annotations }
                    }
                ]
            }),
        )
    }

    pub fn file_path_annotation(text: &str, file_id: &str) -> Value {
        json!({
            "type": "file_path",
            "text": text,
            "file_path": { "file_id": file_id },
        })
    }

    /// `call_id` is only sent on the first fragment of a call, as the server does.
    pub fn code_input_delta(step_id: &str, index: usize, call_id: Option<&str>, input: &str) -> String {
        let mut call = json!({
            "index": index,
            "type": "code_interpreter",
            "code_interpreter": { "input": input },
        });
        if let Some(call_id) = call_id {
            call["id"] = json!(call_id);
        }
        step_delta(step_id, call)
    }

    pub fn code_output_delta(step_id: &str, index: usize, logs: &str) -> String {
        step_delta(
            step_id,
            json!({
                "index": index,
                "type": "code_interpreter",
                "code_interpreter": {
                    "outputs": [ { "index": 0, "type": "logs", "logs": logs } ]
                },
            }),
        )
    }

    pub fn code_step_completed(step_id: &str, call_id: &str, input: &str, logs: &[&str]) -> String {
        let outputs: Vec<Value> = logs
            .iter()
            .map(|logs| json!({ "type": "logs", "logs": logs }))
            .collect();
        sse(
            "thread.run.step.completed",
            &json!({
                "id": step_id,
                "object": "thread.run.step",
                "run_id": "run_1",
                "status": "completed",
                "step_details": {
                    "type": "tool_calls",
                    "tool_calls": [
                        {
                            "id": call_id,
                            "type": "code_interpreter",
                            "code_interpreter": { "input": input, "outputs": outputs }
                        }
                    ]
                }
            }),
        )
    }

    pub fn function_call_delta(
        step_id: &str,
        index: usize,
        call_id: &str,
        name: &str,
        arguments: &str,
    ) -> String {
        step_delta(
            step_id,
            json!({
                "index": index,
                "id": call_id,
                "type": "function",
                "function": { "name": name, "arguments": arguments, "output": null },
            }),
        )
    }

    pub fn error(message: &str) -> String {
        sse("error", &json!({ "message": message }))
    }

    pub fn done() -> String {
        "event: done\ndata: [DONE]\n\n".to_string()
    }

    fn step_delta(step_id: &str, tool_call: Value) -> String {
        sse(
            "thread.run.step.delta",
            &json!({
                "id": step_id,
                "object": "thread.run.step.delta",
                "delta": {
                    "step_details": { "type": "tool_calls", "tool_calls": [tool_call] }
                }
            }),
        )
    }
}

use crate::api::{EventStream, RunTransport};
use crate::error::{ToolExecutionError, TurnError};
use crate::tools::{Tool, ToolArguments, ToolRegistry};
use crate::types::{RequiredToolCall, ToolOutput};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Output of one resolved tool call, submitted on resumption.
pub type ToolCallResult = ToolOutput;

/// One function call the paused run is waiting on. `arguments` is still the
/// serialized form the remote sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    pub arguments: String,
}

impl From<&RequiredToolCall> for ToolCallRequest {
    fn from(call: &RequiredToolCall) -> Self {
        Self {
            id: call.id.clone(),
            function_name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        }
    }
}

/// Every request of one requires-action pause, bound to the run to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolBatch {
    pub thread_id: String,
    pub run_id: String,
    pub requests: Vec<ToolCallRequest>,
}

struct PreparedCall {
    id: String,
    tool: Arc<dyn Tool>,
    arguments: ToolArguments,
}

/// Resolves a paused run's tool calls and opens the resumption stream.
pub struct ToolCallCoordinator<'a> {
    registry: &'a ToolRegistry,
    transport: &'a dyn RunTransport,
}

impl<'a> ToolCallCoordinator<'a> {
    pub fn new(registry: &'a ToolRegistry, transport: &'a dyn RunTransport) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Runs every request of `batch` and submits all results in one request.
    ///
    /// Decode, lookup and duplicate-id failures abort before anything runs or
    /// is submitted. A tool that fails only turns its own output into an error
    /// description.
    pub async fn resolve_and_resume(
        &self,
        batch: &PendingToolBatch,
    ) -> Result<EventStream, TurnError> {
        let outputs = self.resolve(batch).await?;
        tracing::info!(
            thread_id = batch.thread_id.as_str(),
            run_id = batch.run_id.as_str(),
            outputs = outputs.len(),
            "submitting tool outputs"
        );
        let stream = self
            .transport
            .submit_tool_outputs(&batch.thread_id, &batch.run_id, outputs)
            .await?;
        Ok(stream)
    }

    /// Produces exactly one result per request, in request order.
    pub async fn resolve(&self, batch: &PendingToolBatch) -> Result<Vec<ToolCallResult>, TurnError> {
        let prepared = self.prepare(&batch.requests)?;
        let mut outputs = Vec::with_capacity(prepared.len());
        for call in prepared {
            let output = execute(call.tool, call.arguments, &call.id).await;
            outputs.push(ToolCallResult {
                tool_call_id: call.id,
                output,
            });
        }
        Ok(outputs)
    }

    fn prepare(&self, requests: &[ToolCallRequest]) -> Result<Vec<PreparedCall>, TurnError> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(requests.len());

        for request in requests {
            if !seen.insert(request.id.as_str()) {
                return Err(TurnError::DuplicateToolCall {
                    tool_call_id: request.id.clone(),
                });
            }

            let arguments = decode_arguments(request)?;
            let tool = self
                .registry
                .get(&request.function_name)
                .ok_or_else(|| TurnError::UnknownTool {
                    tool_call_id: request.id.clone(),
                    name: request.function_name.clone(),
                })?;
            tool.parameters()
                .validate(&arguments)
                .map_err(|reason| TurnError::ArgumentDecode {
                    tool_call_id: request.id.clone(),
                    function_name: request.function_name.clone(),
                    reason,
                })?;

            prepared.push(PreparedCall {
                id: request.id.clone(),
                tool,
                arguments,
            });
        }

        Ok(prepared)
    }
}

/// Empty arguments mean "no arguments"; anything else must be a JSON object.
fn decode_arguments(request: &ToolCallRequest) -> Result<ToolArguments, TurnError> {
    let decode_error = |reason: String| TurnError::ArgumentDecode {
        tool_call_id: request.id.clone(),
        function_name: request.function_name.clone(),
        reason,
    };

    if request.arguments.trim().is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<Value>(&request.arguments) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(other) => Err(decode_error(format!(
            "expected a JSON object, got {}",
            match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => "an object",
            }
        ))),
        Err(error) => Err(decode_error(error.to_string())),
    }
}

async fn execute(tool: Arc<dyn Tool>, arguments: ToolArguments, tool_call_id: &str) -> String {
    let name = tool.name().to_string();
    tracing::debug!(tool = name.as_str(), tool_call_id, "executing tool");

    let result = tokio::task::spawn_blocking(move || tool.call(&arguments)).await;
    let failure = match result {
        Ok(Ok(output)) => return output,
        Ok(Err(error)) => ToolExecutionError {
            tool: name,
            message: format!("{error:#}"),
        },
        Err(join_error) => ToolExecutionError {
            tool: name,
            message: format!("tool task failed: {join_error}"),
        },
    };

    tracing::warn!(
        tool = failure.tool.as_str(),
        tool_call_id,
        error = failure.message.as_str(),
        "tool execution failed"
    );
    format!("Error: {}", failure.message)
}

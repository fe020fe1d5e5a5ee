//! Wire-to-domain translation for run event streams.
//!
//! The remote sends raw deltas; this module keeps the running snapshots so the
//! dispatcher receives text events that carry the whole value so far and tool
//! call events with per-call lifecycle boundaries.

use super::stream::{SseParser, WireEvent};
use crate::error::ApiError;
use crate::types::{
    Annotation, CodeOutput, MessageDeltaEvent, Run, RunStatus, RunStep, RunStepDeltaEvent,
    StepDetails, StepDetailsDelta, StreamEvent, ThreadMessage, ToolCallDeltaBody, ToolCallDetails,
    ToolCallKind, ToolCallSnapshot,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ApiError>> + Send>>;

struct TextCursor {
    message_id: String,
    index: usize,
    snapshot: String,
    annotations: Vec<Annotation>,
}

#[derive(Default)]
pub struct EventAccumulator {
    run_id: Option<String>,
    text: Option<TextCursor>,
    streamed_messages: HashSet<String>,
    steps: HashMap<String, BTreeMap<usize, ToolCallSnapshot>>,
    current_tool_call: Option<(String, usize)>,
    finalized: HashSet<String>,
}

impl EventAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WireEvent) -> Result<Vec<StreamEvent>, ApiError> {
        let mut out = Vec::new();
        match event {
            WireEvent::Run(run) => self.on_run(run, &mut out),
            WireEvent::StepCreated(step) => self.on_step_created(step, &mut out),
            WireEvent::StepDelta(delta) => self.on_step_delta(delta, &mut out),
            WireEvent::StepFinished(step) => self.on_step_finished(step, &mut out),
            WireEvent::MessageDelta(delta) => self.on_message_delta(delta, &mut out),
            WireEvent::MessageFinished(message) => self.on_message_finished(message, &mut out),
            WireEvent::Error(body) => {
                let message = match body.code {
                    Some(code) if !code.is_empty() => format!("{code}: {}", body.message),
                    _ => body.message,
                };
                return Err(ApiError::Stream(message));
            }
            WireEvent::Done => {}
        }
        Ok(out)
    }

    fn on_run(&mut self, run: Run, out: &mut Vec<StreamEvent>) {
        if self.run_id.as_deref() != Some(run.id.as_str()) {
            self.run_id = Some(run.id.clone());
            out.push(StreamEvent::RunStarted {
                run_id: run.id.clone(),
            });
        }

        match run.status {
            // The paused status must be visible before the in-flight call finalises.
            RunStatus::RequiresAction => {
                out.push(StreamEvent::RunRequiresAction { run });
                self.finish_current_tool_call(out);
            }
            RunStatus::Completed | RunStatus::Incomplete => {
                self.finish_current_tool_call(out);
                self.finish_text(out);
                out.push(StreamEvent::RunCompleted { run_id: run.id });
            }
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired => {
                self.finish_current_tool_call(out);
                self.finish_text(out);
                let message = run
                    .last_error
                    .map(|error| error.message)
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| format!("run {}", run.status.as_str()));
                out.push(StreamEvent::RunFailed {
                    run_id: run.id,
                    message,
                });
            }
            RunStatus::Queued
            | RunStatus::InProgress
            | RunStatus::Cancelling
            | RunStatus::Unknown => self.finish_current_tool_call(out),
        }
    }

    fn on_step_created(&mut self, step: RunStep, out: &mut Vec<StreamEvent>) {
        let StepDetails::ToolCalls { tool_calls } = step.step_details else {
            return;
        };
        let calls = self.steps.entry(step.id).or_default();
        for (index, call) in tool_calls.into_iter().enumerate() {
            if calls.contains_key(&index) {
                continue;
            }
            let snapshot = ToolCallSnapshot::from(call);
            out.push(StreamEvent::ToolCallCreated {
                call: snapshot.clone(),
            });
            calls.insert(index, snapshot);
        }
    }

    fn on_step_delta(&mut self, delta: RunStepDeltaEvent, out: &mut Vec<StreamEvent>) {
        let Some(StepDetailsDelta::ToolCalls { tool_calls }) = delta.delta.step_details else {
            return;
        };

        for fragment in tool_calls {
            let key = (delta.id.clone(), fragment.index);
            let known = self
                .steps
                .get(&delta.id)
                .is_some_and(|calls| calls.contains_key(&fragment.index));

            if self.current_tool_call.as_ref() != Some(&key) {
                self.finish_current_tool_call(out);
            }

            let calls = self.steps.entry(delta.id.clone()).or_default();
            if !known {
                let Some(id) = fragment.id.clone() else {
                    tracing::warn!(
                        step_id = delta.id.as_str(),
                        index = fragment.index,
                        "tool call delta without id for an unseen call; skipping"
                    );
                    continue;
                };
                let snapshot = ToolCallSnapshot::empty(id, infer_kind(&fragment));
                out.push(StreamEvent::ToolCallCreated {
                    call: snapshot.clone(),
                });
                calls.insert(fragment.index, snapshot);
            }

            let Some(snapshot) = calls.get_mut(&fragment.index) else {
                continue;
            };
            let (input, outputs) = merge_fragment(snapshot, &fragment);
            out.push(StreamEvent::ToolCallDelta {
                call_id: snapshot.id.clone(),
                kind: snapshot.kind(),
                input,
                outputs,
            });
            self.current_tool_call = Some(key);
        }
    }

    fn on_step_finished(&mut self, step: RunStep, out: &mut Vec<StreamEvent>) {
        let StepDetails::ToolCalls { tool_calls } = step.step_details else {
            return;
        };

        if self
            .current_tool_call
            .as_ref()
            .is_some_and(|(step_id, _)| *step_id == step.id)
        {
            self.current_tool_call = None;
        }

        let calls = self.steps.entry(step.id).or_default();
        for (index, call) in tool_calls.into_iter().enumerate() {
            let snapshot = ToolCallSnapshot::from(call);
            if !calls.values().any(|known| known.id == snapshot.id) {
                out.push(StreamEvent::ToolCallCreated {
                    call: snapshot.clone(),
                });
            }
            calls.insert(index, snapshot.clone());
            if self.finalized.insert(snapshot.id.clone()) {
                out.push(StreamEvent::ToolCallDone { call: snapshot });
            }
        }
    }

    fn on_message_delta(&mut self, delta: MessageDeltaEvent, out: &mut Vec<StreamEvent>) {
        self.streamed_messages.insert(delta.id.clone());
        for part in delta.delta.content {
            if part.kind != "text" {
                continue;
            }
            let same_part = self
                .text
                .as_ref()
                .is_some_and(|cursor| cursor.message_id == delta.id && cursor.index == part.index);
            if !same_part {
                self.finish_text(out);
                self.text = Some(TextCursor {
                    message_id: delta.id.clone(),
                    index: part.index,
                    snapshot: String::new(),
                    annotations: Vec::new(),
                });
                out.push(StreamEvent::TextCreated);
            }

            let Some(cursor) = self.text.as_mut() else {
                continue;
            };
            let body = part.text.unwrap_or_default();
            let fragment = body.value.unwrap_or_default();
            cursor.snapshot.push_str(&fragment);
            for annotation in body.annotations.into_iter().filter_map(Annotation::from_wire) {
                if !cursor.annotations.contains(&annotation) {
                    cursor.annotations.push(annotation);
                }
            }
            out.push(StreamEvent::TextDelta {
                delta: fragment,
                snapshot: cursor.snapshot.clone(),
            });
        }
    }

    fn on_message_finished(&mut self, message: ThreadMessage, out: &mut Vec<StreamEvent>) {
        if message.role.as_deref() == Some("user") {
            return;
        }
        let mut parts = message
            .content
            .into_iter()
            .enumerate()
            .filter_map(|(index, content)| match content {
                crate::types::MessageContent::Text { text } => Some((index, text)),
                crate::types::MessageContent::Other => None,
            });

        let cursor_matches = self
            .text
            .as_ref()
            .is_some_and(|cursor| cursor.message_id == message.id);
        if cursor_matches {
            let Some(cursor) = self.text.take() else {
                return;
            };
            let (text, annotations) = match parts.find(|(index, _)| *index == cursor.index) {
                Some((_, content)) => (
                    content.value,
                    content
                        .annotations
                        .into_iter()
                        .filter_map(Annotation::from_wire)
                        .collect(),
                ),
                None => (cursor.snapshot, cursor.annotations),
            };
            out.push(StreamEvent::TextDone { text, annotations });
            return;
        }

        if self.streamed_messages.contains(&message.id) {
            return;
        }

        self.finish_text(out);
        for (_, content) in parts {
            out.push(StreamEvent::TextCreated);
            out.push(StreamEvent::TextDone {
                text: content.value,
                annotations: content
                    .annotations
                    .into_iter()
                    .filter_map(Annotation::from_wire)
                    .collect(),
            });
        }
    }

    fn finish_text(&mut self, out: &mut Vec<StreamEvent>) {
        if let Some(cursor) = self.text.take() {
            out.push(StreamEvent::TextDone {
                text: cursor.snapshot,
                annotations: cursor.annotations,
            });
        }
    }

    fn finish_current_tool_call(&mut self, out: &mut Vec<StreamEvent>) {
        let Some((step_id, index)) = self.current_tool_call.take() else {
            return;
        };
        let Some(call) = self.steps.get(&step_id).and_then(|calls| calls.get(&index)) else {
            return;
        };
        if self.finalized.insert(call.id.clone()) {
            out.push(StreamEvent::ToolCallDone { call: call.clone() });
        }
    }
}

fn infer_kind(fragment: &ToolCallDeltaBody) -> ToolCallKind {
    if let Some(kind) = fragment.kind.as_deref().and_then(ToolCallKind::from_wire) {
        return kind;
    }
    if fragment.function.is_some() {
        ToolCallKind::Function
    } else if fragment.code_interpreter.is_some() {
        ToolCallKind::CodeInterpreter
    } else {
        ToolCallKind::FileSearch
    }
}

fn merge_fragment(
    snapshot: &mut ToolCallSnapshot,
    fragment: &ToolCallDeltaBody,
) -> (Option<String>, Vec<CodeOutput>) {
    match &mut snapshot.details {
        ToolCallDetails::CodeInterpreter { input, outputs } => {
            let Some(code) = &fragment.code_interpreter else {
                return (None, Vec::new());
            };
            if let Some(piece) = &code.input {
                input.push_str(piece);
            }
            let new_outputs: Vec<CodeOutput> = code
                .outputs
                .iter()
                .flatten()
                .cloned()
                .filter_map(CodeOutput::from_wire)
                .collect();
            outputs.extend(new_outputs.iter().cloned());
            (code.input.clone(), new_outputs)
        }
        ToolCallDetails::Function {
            name,
            arguments,
            output,
        } => {
            if let Some(function) = &fragment.function {
                if let Some(new_name) = &function.name {
                    if name.is_empty() {
                        name.clone_from(new_name);
                    }
                }
                if let Some(piece) = &function.arguments {
                    arguments.push_str(piece);
                }
                if function.output.is_some() {
                    output.clone_from(&function.output);
                }
            }
            (None, Vec::new())
        }
        ToolCallDetails::FileSearch => (None, Vec::new()),
    }
}

/// Decodes a raw SSE byte stream into ordered domain events.
///
/// A transport failure or a remote `error` event is yielded as the final item.
pub fn event_stream(bytes: ByteStream) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut bytes = bytes;
        let mut parser = SseParser::new();
        let mut accumulator = EventAccumulator::new();
        let mut failed = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    failed = true;
                    yield Err(error);
                    break 'read;
                }
            };
            for wire in parser.process(&chunk) {
                match accumulator.push(wire) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(error) => {
                        failed = true;
                        yield Err(error);
                        break 'read;
                    }
                }
            }
        }

        if !failed {
            if let Some(wire) = parser.finish() {
                match accumulator.push(wire) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(error) => yield Err(error),
                }
            }
        }
    })
}

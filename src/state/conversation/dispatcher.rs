use super::coordinator::{PendingToolBatch, ToolCallRequest};
use crate::api::{EventStream, RunTransport};
use crate::error::TurnError;
use crate::files::inline_downloads;
use crate::state::partial::{PartialMessage, PartialToolInput};
use crate::state::session::{SessionState, Speaker, TurnPhase};
use crate::state::thread::Message;
use crate::types::{
    Annotation, CodeOutput, Run, RunStatus, StreamEvent, ToolCallDetails, ToolCallKind,
    ToolCallSnapshot,
};
use crate::ui::{markup, Renderer};
use futures::StreamExt;
use std::collections::HashMap;

/// How one stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    /// The run paused for local tool calls; resume it with their outputs.
    RequiresAction(PendingToolBatch),
}

/// Consumes one event stream, turning events into render updates and chat-log
/// entries. Partial buffers live only as long as the stream does.
pub struct StreamEventDispatcher<'a> {
    session: &'a mut SessionState,
    renderer: &'a mut dyn Renderer,
    transport: &'a dyn RunTransport,
    message: Option<PartialMessage>,
    tool_inputs: HashMap<String, PartialToolInput>,
    run: Option<Run>,
    claimed: Option<PendingToolBatch>,
}

impl<'a> StreamEventDispatcher<'a> {
    pub fn new(
        session: &'a mut SessionState,
        renderer: &'a mut dyn Renderer,
        transport: &'a dyn RunTransport,
    ) -> Self {
        Self {
            session,
            renderer,
            transport,
            message: None,
            tool_inputs: HashMap::new(),
            run: None,
            claimed: None,
        }
    }

    /// Drains `stream` in arrival order.
    pub async fn consume(mut self, mut stream: EventStream) -> Result<StreamOutcome, TurnError> {
        let mut finished = false;
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(error) => {
                    self.close_open_slots();
                    return Err(error.into());
                }
            };
            let terminal = event.is_terminal();
            self.handle(event).await?;
            if terminal {
                finished = true;
                break;
            }
        }

        if self.claimed.is_none() && self.run_requires_action() {
            tracing::debug!("stream ended paused without a finished function call; claiming batch");
            self.claim_batch()?;
        }

        match self.claimed.take() {
            Some(batch) => Ok(StreamOutcome::RequiresAction(batch)),
            None => {
                if !finished {
                    tracing::warn!("event stream ended without a terminal run event");
                }
                self.close_open_slots();
                Ok(StreamOutcome::Completed)
            }
        }
    }

    async fn handle(&mut self, event: StreamEvent) -> Result<(), TurnError> {
        match event {
            StreamEvent::RunStarted { run_id } => {
                tracing::debug!(run_id = run_id.as_str(), "run started");
            }
            StreamEvent::TextCreated => {
                let slot = self.renderer.open_slot(Speaker::Assistant);
                self.renderer.update_slot(slot, "");
                self.message = Some(PartialMessage::new(slot));
            }
            StreamEvent::TextDelta { snapshot, .. } => self.on_text_delta(&snapshot),
            StreamEvent::TextDone { text, annotations } => {
                self.on_text_done(&text, &annotations).await
            }
            StreamEvent::ToolCallCreated { call } => {
                if call.kind() == ToolCallKind::CodeInterpreter
                    && !self.session.tool_calls_seen.contains(&call.id)
                {
                    let slot = self.renderer.open_slot(Speaker::Assistant);
                    self.tool_inputs
                        .insert(call.id.clone(), PartialToolInput::new(call.id, slot));
                }
            }
            StreamEvent::ToolCallDelta {
                call_id,
                kind,
                input,
                outputs,
            } => {
                if kind == ToolCallKind::CodeInterpreter {
                    self.on_code_delta(call_id, input, &outputs);
                }
            }
            StreamEvent::ToolCallDone { call } => self.on_tool_call_done(call)?,
            StreamEvent::RunRequiresAction { run } => {
                tracing::info!(
                    run_id = run.id.as_str(),
                    pending = run.pending_tool_calls().len(),
                    "run requires action"
                );
                self.session.set_phase(TurnPhase::RequiresAction);
                self.run = Some(run);
            }
            StreamEvent::RunCompleted { run_id } => {
                tracing::info!(run_id = run_id.as_str(), "run completed");
            }
            StreamEvent::RunFailed { run_id, message } => {
                self.close_open_slots();
                return Err(TurnError::RunFailed { run_id, message });
            }
        }
        Ok(())
    }

    fn on_text_delta(&mut self, snapshot: &str) {
        let renderer = &mut *self.renderer;
        let message = self
            .message
            .get_or_insert_with(|| PartialMessage::new(renderer.open_slot(Speaker::Assistant)));
        message.replace(snapshot);
        if !snapshot.is_empty() {
            renderer.update_slot(
                message.slot(),
                &markup::replace_links_with_placeholder(message.buffer()),
            );
        }
    }

    async fn on_text_done(&mut self, text: &str, annotations: &[Annotation]) {
        let message = self.message.take();
        let inlined = inline_downloads(self.transport, text, annotations).await;
        let final_text = markup::strip_citation_markers(&inlined);

        let slot = match message {
            Some(message) => message.slot(),
            None => self.renderer.open_slot(Speaker::Assistant),
        };
        self.renderer.update_slot(slot, &final_text);
        self.renderer.close_slot(slot);

        self.session.push_entry(Speaker::Assistant, final_text.clone());
        self.session.record_message(Message::assistant(final_text));
    }

    fn on_code_delta(&mut self, call_id: String, input: Option<String>, outputs: &[CodeOutput]) {
        let renderer = &mut *self.renderer;
        let partial = self.tool_inputs.entry(call_id).or_insert_with_key(|id| {
            PartialToolInput::new(id.clone(), renderer.open_slot(Speaker::Assistant))
        });

        if let Some(fragment) = input.filter(|fragment| !fragment.is_empty()) {
            partial.append(&fragment);
            renderer.update_slot(partial.slot(), &markup::code_input_block(partial.buffer()));
        }
        if !outputs.is_empty() {
            tracing::trace!(
                tool_call_id = partial.tool_call_id(),
                outputs = outputs.len(),
                "code interpreter output observed"
            );
        }
    }

    fn on_tool_call_done(&mut self, call: ToolCallSnapshot) -> Result<(), TurnError> {
        match &call.details {
            ToolCallDetails::CodeInterpreter { input, outputs } => {
                if !self.session.mark_tool_call_seen(&call.id) {
                    tracing::debug!(tool_call_id = call.id.as_str(), "tool call already finalised");
                    if let Some(partial) = self.tool_inputs.remove(&call.id) {
                        self.renderer.close_slot(partial.slot());
                    }
                    return Ok(());
                }
                let block = markup::code_input_block(input);
                let slot = match self.tool_inputs.remove(&call.id) {
                    Some(partial) => partial.slot(),
                    None => self.renderer.open_slot(Speaker::Assistant),
                };
                self.renderer.update_slot(slot, &block);
                self.renderer.close_slot(slot);
                self.session.push_entry(Speaker::Assistant, block);

                for output in outputs {
                    if let CodeOutput::Logs(logs) = output {
                        let block = markup::code_output_block(logs);
                        self.renderer.render_entry(Speaker::Assistant, &block);
                        self.session.push_entry(Speaker::Assistant, block);
                    }
                }
            }
            ToolCallDetails::Function { name, .. } => {
                if !self.run_requires_action() {
                    tracing::debug!(
                        tool_call_id = call.id.as_str(),
                        function = name.as_str(),
                        "function call finished while run is not paused"
                    );
                } else if self.claimed.is_none() {
                    self.claim_batch()?;
                }
            }
            ToolCallDetails::FileSearch => {}
        }
        Ok(())
    }

    /// Reads the latest run status reported on this stream.
    fn run_requires_action(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.status == RunStatus::RequiresAction)
    }

    /// A paused run that lists no tool calls can never be resumed, so the
    /// stream fails instead of reporting completion.
    fn claim_batch(&mut self) -> Result<(), TurnError> {
        let Some(run) = self.run.as_ref() else {
            return Ok(());
        };
        let requests: Vec<ToolCallRequest> = run
            .pending_tool_calls()
            .iter()
            .map(ToolCallRequest::from)
            .collect();
        if requests.is_empty() {
            tracing::warn!(
                run_id = run.id.as_str(),
                "run requires action but lists no tool calls"
            );
            let run_id = run.id.clone();
            self.close_open_slots();
            return Err(TurnError::RunFailed {
                run_id,
                message: "requires action without tool calls".to_string(),
            });
        }

        for request in &requests {
            if self.session.mark_tool_call_seen(&request.id) {
                let notice = markup::function_notice(&request.function_name);
                self.renderer.render_entry(Speaker::Assistant, &notice);
                self.session.push_entry(Speaker::Assistant, notice);
            }
        }

        self.claimed = Some(PendingToolBatch {
            thread_id: run.thread_id.clone(),
            run_id: run.id.clone(),
            requests,
        });
        Ok(())
    }

    fn close_open_slots(&mut self) {
        if let Some(message) = self.message.take() {
            self.renderer.close_slot(message.slot());
        }
        for (_, partial) in self.tool_inputs.drain() {
            self.renderer.close_slot(partial.slot());
        }
    }
}

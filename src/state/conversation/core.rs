use super::coordinator::ToolCallCoordinator;
use super::dispatcher::{StreamEventDispatcher, StreamOutcome};
use crate::api::RunTransport;
use crate::error::TurnError;
use crate::export::Transcript;
use crate::files::validate_upload;
use crate::state::session::{SessionState, Speaker, TurnPhase};
use crate::state::thread::{ConversationThread, FileRef, Message};
use crate::tools::ToolRegistry;
use crate::ui::Renderer;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Owns a session and drives user turns against the remote run protocol.
pub struct SessionController {
    transport: Arc<dyn RunTransport>,
    registry: ToolRegistry,
    session: SessionState,
    additional_instructions: Option<String>,
    max_tool_rounds: usize,
}

impl SessionController {
    pub fn new(transport: Arc<dyn RunTransport>, registry: ToolRegistry) -> Self {
        Self {
            transport,
            registry,
            session: SessionState::new(),
            additional_instructions: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Extra instructions sent with every run; blank text sends nothing.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.additional_instructions = if instructions.trim().is_empty() {
            None
        } else {
            Some(instructions)
        };
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Runs one user turn to completion, including every tool round trip.
    ///
    /// Input is rejected with [`TurnError::Busy`] while another turn is in
    /// flight. Any other failure is also written to the chat log before it is
    /// returned, and the session is left ready for the next input.
    pub async fn send_message(
        &mut self,
        input: &str,
        assistant_id: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<(), TurnError> {
        self.session.begin_turn()?;
        renderer.render_entry(Speaker::User, input);
        self.session.push_entry(Speaker::User, input);

        let result = self.run_turn(input, assistant_id, renderer).await;
        match &result {
            Ok(()) => self.session.end_turn(TurnPhase::Completed),
            Err(error) => {
                tracing::warn!(error = %error, "turn failed");
                let text = error.to_string();
                renderer.render_entry(Speaker::Error, &text);
                self.session.push_entry(Speaker::Error, text);
                self.session.end_turn(TurnPhase::Failed);
            }
        }
        result
    }

    async fn run_turn(
        &mut self,
        input: &str,
        assistant_id: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<(), TurnError> {
        let thread_id = self.ensure_thread().await?;
        let attachments = self.session.take_attachments();
        let attachment_ids: Vec<String> = attachments.iter().map(|file| file.id.clone()).collect();

        self.transport
            .create_message(&thread_id, input, &attachment_ids)
            .await?;
        self.session.record_message(Message::user(input, attachments));

        tracing::info!(
            thread_id = thread_id.as_str(),
            assistant_id,
            attachments = attachment_ids.len(),
            "starting run"
        );
        let mut stream = self
            .transport
            .stream_run(
                &thread_id,
                assistant_id,
                self.additional_instructions.as_deref(),
            )
            .await?;

        let mut rounds = 0usize;
        loop {
            self.session.set_phase(TurnPhase::Streaming);
            let dispatcher =
                StreamEventDispatcher::new(&mut self.session, &mut *renderer, self.transport.as_ref());
            let batch = match dispatcher.consume(stream).await? {
                StreamOutcome::Completed => return Ok(()),
                StreamOutcome::RequiresAction(batch) => batch,
            };

            if rounds >= self.max_tool_rounds {
                return Err(TurnError::Stalled { rounds });
            }
            rounds += 1;

            self.session.set_phase(TurnPhase::ResolvingTools);
            stream = ToolCallCoordinator::new(&self.registry, self.transport.as_ref())
                .resolve_and_resume(&batch)
                .await?;
        }
    }

    async fn ensure_thread(&mut self) -> Result<String, TurnError> {
        if let Some(thread_id) = self.session.thread_id() {
            return Ok(thread_id.to_string());
        }
        let thread_id = self.transport.create_thread().await?;
        self.session.thread = Some(ConversationThread::new(thread_id.clone()));
        Ok(thread_id)
    }

    /// Uploads `path` and attaches it to the next outgoing message.
    pub async fn attach_file(&mut self, path: &Path) -> anyhow::Result<FileRef> {
        if self.session.in_progress {
            return Err(TurnError::Busy.into());
        }
        validate_upload(path)?;
        let file = self
            .transport
            .upload_file(path)
            .await
            .with_context(|| format!("failed to upload {}", path.display()))?;
        let file_ref = FileRef {
            id: file.id,
            name: file.filename.or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            }),
        };
        self.session.attach(file_ref.clone());
        Ok(file_ref)
    }

    /// Clears the visible conversation; the remote thread is reused.
    pub fn reset_chat(&mut self) {
        self.session.reset_chat();
    }

    /// Profile switches start from an empty session.
    pub fn switch_profile(&mut self) {
        tracing::info!("profile switched; clearing session");
        self.session.clear();
    }

    pub fn transcript(&self, comment: Option<&str>) -> Transcript {
        Transcript::new(self.session.snapshot(), comment)
    }
}

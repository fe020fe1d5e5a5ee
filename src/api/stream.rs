use super::logging::emit_sse_parse_error;
use crate::types::{
    ApiErrorBody, ApiErrorEnvelope, MessageDeltaEvent, Run, RunStep, RunStepDeltaEvent,
    ThreadMessage,
};
use serde::de::DeserializeOwned;

/// A decoded server-sent event of the assistant-run protocol.
#[derive(Debug, Clone)]
pub enum WireEvent {
    Run(Run),
    StepCreated(RunStep),
    StepDelta(RunStepDeltaEvent),
    StepFinished(RunStep),
    MessageDelta(MessageDeltaEvent),
    MessageFinished(ThreadMessage),
    Error(ApiErrorBody),
    Done,
}

#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk; returns every event completed by it.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<WireEvent> {
        let text = String::from_utf8_lossy(chunk);
        if text.contains('\r') {
            self.buffer.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(&text);
        }

        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find("\n\n") {
            let frame_end = start + end + 2;
            if let Some(event) = decode_frame(&self.buffer[start..frame_end]) {
                events.push(event);
            }
            start = frame_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Decodes a trailing frame the server closed without a blank line.
    pub fn finish(&mut self) -> Option<WireEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            decode_frame(&rest)
        }
    }
}

fn decode_frame(frame: &str) -> Option<WireEvent> {
    let mut event_type: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    let data = data_lines.join("\n");
    let data = data.trim();
    if data == "[DONE]" {
        return Some(WireEvent::Done);
    }
    let event_type = event_type?;

    match event_type {
        "done" => Some(WireEvent::Done),
        "error" => Some(WireEvent::Error(
            serde_json::from_str::<ApiErrorEnvelope>(data)
                .map(ApiErrorEnvelope::into_body)
                .unwrap_or_else(|_| ApiErrorBody {
                    code: None,
                    message: data.to_string(),
                }),
        )),
        "thread.run.step.created" => decode(event_type, data).map(WireEvent::StepCreated),
        "thread.run.step.delta" => decode(event_type, data).map(WireEvent::StepDelta),
        "thread.run.step.completed"
        | "thread.run.step.failed"
        | "thread.run.step.cancelled"
        | "thread.run.step.expired" => decode(event_type, data).map(WireEvent::StepFinished),
        "thread.message.delta" => decode(event_type, data).map(WireEvent::MessageDelta),
        "thread.message.completed" | "thread.message.incomplete" => {
            decode(event_type, data).map(WireEvent::MessageFinished)
        }
        "thread.run.step.in_progress" | "thread.message.created" | "thread.message.in_progress" => {
            None
        }
        other if other.starts_with("thread.run.") && !other.starts_with("thread.run.step.") => {
            decode(event_type, data).map(WireEvent::Run)
        }
        other => {
            tracing::trace!(event = other, "ignoring unrecognised stream event");
            None
        }
    }
}

fn decode<T: DeserializeOwned>(event_type: &str, data: &str) -> Option<T> {
    match serde_json::from_str::<T>(data) {
        Ok(value) => Some(value),
        Err(error) => {
            emit_sse_parse_error(Some(event_type), data, &error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;

    #[test]
    fn test_run_events_decode_with_status() {
        let mut parser = SseParser::new();
        let events = parser.process(
            b"event: thread.run.created\ndata: {\"id\":\"run_1\",\"thread_id\":\"thread_1\",\"status\":\"queued\"}\n\n",
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            WireEvent::Run(run) => {
                assert_eq!(run.id, "run_1");
                assert_eq!(run.status, RunStatus::Queued);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_crlf_frames_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.process(b": keep-alive\r\n\r\nevent: done\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WireEvent::Done));
    }

    #[test]
    fn test_finish_decodes_unterminated_frame() {
        let mut parser = SseParser::new();
        assert!(parser.process(b"event: done\ndata: [DONE]").is_empty());
        assert!(matches!(parser.finish(), Some(WireEvent::Done)));
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_error_event_keeps_raw_text_when_not_json() {
        let mut parser = SseParser::new();
        let events = parser.process(b"event: error\ndata: upstream overloaded\n\n");
        match &events[0] {
            WireEvent::Error(body) => assert_eq!(body.message, "upstream overloaded"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

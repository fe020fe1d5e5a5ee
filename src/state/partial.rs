use crate::ui::SlotId;

/// Assistant text being streamed into one render slot. Every update carries
/// the whole value so far and replaces the buffer.
#[derive(Debug)]
pub struct PartialMessage {
    slot: SlotId,
    buffer: String,
}

impl PartialMessage {
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            buffer: String::new(),
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn replace(&mut self, snapshot: &str) {
        self.buffer.clear();
        self.buffer.push_str(snapshot);
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

/// Code-interpreter input being streamed for one tool call. Fragments are
/// incremental and appended.
#[derive(Debug)]
pub struct PartialToolInput {
    tool_call_id: String,
    slot: SlotId,
    buffer: String,
}

impl PartialToolInput {
    pub fn new(tool_call_id: impl Into<String>, slot: SlotId) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            slot,
            buffer: String::new(),
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn append(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

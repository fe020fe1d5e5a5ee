use crate::state::Speaker;
use std::collections::HashMap;

/// Handle of one live render target (an assistant bubble being streamed into).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u64);

/// The UI collaborator. Content passed to a slot always replaces what the slot
/// showed before, so re-rendering the same content is a no-op for the viewer.
pub trait Renderer: Send {
    fn open_slot(&mut self, speaker: Speaker) -> SlotId;

    fn update_slot(&mut self, slot: SlotId, content: &str);

    /// No further updates will arrive for `slot`.
    fn close_slot(&mut self, slot: SlotId);

    /// A complete entry that is never updated.
    fn render_entry(&mut self, speaker: Speaker, content: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    Open { slot: SlotId, speaker: Speaker },
    Update { slot: SlotId, content: String },
    Close { slot: SlotId },
    Entry { speaker: Speaker, content: String },
}

/// Renderer that records every operation; used by tests and transcripts.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    ops: Vec<RenderOp>,
    slots: HashMap<SlotId, (Speaker, String)>,
    next_slot: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    /// What `slot` currently shows.
    pub fn slot_content(&self, slot: SlotId) -> Option<&str> {
        self.slots.get(&slot).map(|(_, content)| content.as_str())
    }

    /// Every content update `slot` received, in order.
    pub fn updates_for(&self, slot: SlotId) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::Update { slot: target, content } if *target == slot => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Final visible content in display order: each slot's last state and every
    /// standalone entry.
    pub fn visible(&self) -> Vec<(Speaker, String)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::Open { slot, .. } => self.slots.get(slot).cloned(),
                RenderOp::Entry { speaker, content } => Some((*speaker, content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_slot(&self) -> Option<SlotId> {
        self.ops.iter().rev().find_map(|op| match op {
            RenderOp::Open { slot, .. } => Some(*slot),
            _ => None,
        })
    }
}

impl Renderer for RecordingRenderer {
    fn open_slot(&mut self, speaker: Speaker) -> SlotId {
        self.next_slot += 1;
        let slot = SlotId(self.next_slot);
        self.slots.insert(slot, (speaker, String::new()));
        self.ops.push(RenderOp::Open { slot, speaker });
        slot
    }

    fn update_slot(&mut self, slot: SlotId, content: &str) {
        if let Some((_, shown)) = self.slots.get_mut(&slot) {
            shown.clear();
            shown.push_str(content);
        }
        self.ops.push(RenderOp::Update {
            slot,
            content: content.to_string(),
        });
    }

    fn close_slot(&mut self, slot: SlotId) {
        self.ops.push(RenderOp::Close { slot });
    }

    fn render_entry(&mut self, speaker: Speaker, content: &str) {
        self.ops.push(RenderOp::Entry {
            speaker,
            content: content.to_string(),
        });
    }
}

use super::render::{Renderer, SlotId};
use crate::state::Speaker;
use crossterm::queue;
use crossterm::style::{Color, Print, PrintStyledContent, Stylize};
use std::collections::HashMap;
use std::io::{self, Stdout, Write};

/// Line-oriented renderer: streamed slots print only their new suffix; a slot
/// whose content was rewritten is printed again in full.
pub struct TerminalRenderer<W: Write + Send = Stdout> {
    out: W,
    printed: HashMap<SlotId, String>,
    speakers: HashMap<SlotId, Speaker>,
    active: Option<SlotId>,
    next_slot: u64,
}

impl TerminalRenderer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: HashMap::new(),
            speakers: HashMap::new(),
            active: None,
            next_slot: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Styled one-line notice outside the chat flow.
    pub fn notice(&mut self, text: &str) {
        self.finish_active();
        let result = queue!(
            self.out,
            PrintStyledContent(text.with(Color::DarkGrey)),
            Print("\n")
        )
        .and_then(|_| self.out.flush());
        report(result);
    }

    fn header(&mut self, speaker: Speaker) -> io::Result<()> {
        let label = format!("{}:", speaker.as_str());
        let styled = match speaker {
            Speaker::User => label.bold().with(Color::Green),
            Speaker::Assistant => label.bold().with(Color::Cyan),
            Speaker::Error => label.bold().with(Color::Red),
        };
        queue!(self.out, PrintStyledContent(styled), Print("\n"))
    }

    fn activate(&mut self, slot: SlotId) -> io::Result<()> {
        if self.active == Some(slot) {
            return Ok(());
        }
        self.finish_active();
        let speaker = self.speakers.get(&slot).copied().unwrap_or(Speaker::Assistant);
        self.header(speaker)?;
        self.active = Some(slot);
        Ok(())
    }

    fn finish_active(&mut self) {
        if self.active.take().is_some() {
            report(queue!(self.out, Print("\n\n")).and_then(|_| self.out.flush()));
        }
    }

    fn write_update(&mut self, slot: SlotId, content: &str) -> io::Result<()> {
        self.activate(slot)?;
        let printed = self.printed.entry(slot).or_default();
        if let Some(suffix) = content.strip_prefix(printed.as_str()) {
            if !suffix.is_empty() {
                queue!(self.out, Print(suffix))?;
                printed.push_str(suffix);
            }
        } else {
            queue!(self.out, Print("\n"), Print(content))?;
            printed.clear();
            printed.push_str(content);
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn open_slot(&mut self, speaker: Speaker) -> SlotId {
        self.next_slot += 1;
        let slot = SlotId(self.next_slot);
        self.speakers.insert(slot, speaker);
        slot
    }

    fn update_slot(&mut self, slot: SlotId, content: &str) {
        let result = self.write_update(slot, content);
        report(result);
    }

    fn close_slot(&mut self, slot: SlotId) {
        if self.active == Some(slot) {
            self.finish_active();
        }
        self.printed.remove(&slot);
        self.speakers.remove(&slot);
    }

    fn render_entry(&mut self, speaker: Speaker, content: &str) {
        self.finish_active();
        let result = self
            .header(speaker)
            .and_then(|_| queue!(self.out, Print(content), Print("\n\n")))
            .and_then(|_| self.out.flush());
        report(result);
    }
}

fn report(result: io::Result<()>) {
    if let Err(error) = result {
        tracing::warn!(error = %error, "terminal write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(renderer: TerminalRenderer<Vec<u8>>) -> String {
        let bytes = renderer.into_inner();
        let text = String::from_utf8(bytes).expect("utf8");
        strip_ansi(&text)
    }

    fn strip_ansi(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == '\u{1b}' {
                for next in chars.by_ref() {
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    #[test]
    fn test_growing_snapshots_print_only_suffixes() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let slot = renderer.open_slot(Speaker::Assistant);
        renderer.update_slot(slot, "");
        renderer.update_slot(slot, "Hel");
        renderer.update_slot(slot, "Hello");
        renderer.update_slot(slot, "Hello");
        renderer.close_slot(slot);

        assert_eq!(rendered(renderer), "assistant:\nHello\n\n");
    }

    #[test]
    fn test_rewritten_content_is_printed_again() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let slot = renderer.open_slot(Speaker::Assistant);
        renderer.update_slot(slot, "see [a](b)");
        renderer.update_slot(slot, "see Download Link");
        renderer.close_slot(slot);

        assert_eq!(
            rendered(renderer),
            "assistant:\nsee [a](b)\nsee Download Link\n\n"
        );
    }

    #[test]
    fn test_entries_close_the_active_slot() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let slot = renderer.open_slot(Speaker::Assistant);
        renderer.update_slot(slot, "partial");
        renderer.render_entry(Speaker::Error, "boom");

        assert_eq!(rendered(renderer), "assistant:\npartial\n\nerror:\nboom\n\n");
    }
}

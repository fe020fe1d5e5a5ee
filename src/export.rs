//! Chat-log exports: a plain-text body and a document batch update.

use crate::state::{ChatEntry, Speaker};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// A block of the document form of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum DocBlock {
    Header(String),
    Paragraph(String),
}

impl DocBlock {
    fn text(&self) -> &str {
        match self {
            Self::Header(text) | Self::Paragraph(text) => text,
        }
    }
}

/// Snapshot of a chat log plus an optional reviewer comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
    comment: Option<String>,
}

impl Transcript {
    pub fn new(entries: Vec<ChatEntry>, comment: Option<&str>) -> Self {
        Self {
            entries,
            comment: comment
                .map(str::trim)
                .filter(|comment| !comment.is_empty())
                .map(str::to_string),
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn plain_text(&self) -> String {
        let mut out = self
            .entries
            .iter()
            .map(|entry| format!("{}: {}", entry.speaker.as_str(), entry.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        if let Some(comment) = &self.comment {
            out.push_str("\n\nUser comments:\n");
            out.push_str(comment);
        }
        out
    }

    pub fn document_blocks(&self) -> Vec<DocBlock> {
        let mut blocks = vec![DocBlock::Header("START OF LOG".to_string())];
        for entry in &self.entries {
            blocks.push(DocBlock::Paragraph(entry.speaker.as_str().to_string()));
            blocks.push(DocBlock::Paragraph(entry.text.clone()));
        }
        blocks.push(DocBlock::Header("END OF LOG\n\n\n".to_string()));
        blocks
    }

    /// Document batch-update requests. Every block is inserted at index 1, so
    /// blocks are emitted in reverse; speaker names become bold headers.
    pub fn document_requests(&self) -> Vec<Value> {
        let mut requests = Vec::new();
        for block in self.document_blocks().iter().rev() {
            let text = block.text();
            let is_speaker = matches!(block, DocBlock::Paragraph(_))
                && [Speaker::User, Speaker::Assistant, Speaker::Error]
                    .iter()
                    .any(|speaker| speaker.as_str() == text);
            let (inserted, bold) = if is_speaker {
                (format!("{text}:\n"), true)
            } else {
                (format!("{text}\n\n"), false)
            };
            requests.push(json!({
                "insertText": { "location": { "index": 1 }, "text": inserted }
            }));
            requests.push(json!({
                "updateTextStyle": {
                    "range": { "startIndex": 1, "endIndex": 1 + text.chars().count() },
                    "textStyle": { "bold": bold },
                    "fields": "bold",
                }
            }));
        }
        requests
    }

    /// Writes `transcript-<stamp>.txt` and `transcript-<stamp>.requests.json`
    /// into `dir`; returns both paths.
    pub fn write_to_dir(&self, dir: &Path, stamp: &str) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let text_path = dir.join(format!("transcript-{stamp}.txt"));
        let requests_path = dir.join(format!("transcript-{stamp}.requests.json"));

        std::fs::write(&text_path, self.plain_text())
            .with_context(|| format!("failed to write {}", text_path.display()))?;
        let requests = serde_json::to_string_pretty(&json!({ "requests": self.document_requests() }))?;
        std::fs::write(&requests_path, requests)
            .with_context(|| format!("failed to write {}", requests_path.display()))?;
        Ok((text_path, requests_path))
    }
}

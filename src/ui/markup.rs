//! Text transforms applied to assistant output before it is shown or logged.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use std::sync::LazyLock;

pub const DOWNLOAD_PLACEHOLDER: &str = "Download Link";

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.*?)\]\s*\(\s*(.*?)\s*\)").expect("markdown link pattern must compile")
});

static CITATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"【[^【】]*†[^【】]*】").expect("citation marker pattern must compile")
});

/// Replaces every markdown link with the download placeholder so raw sandbox
/// URLs never reach the screen.
pub fn replace_links_with_placeholder(text: &str) -> String {
    MARKDOWN_LINK
        .replace_all(text, DOWNLOAD_PLACEHOLDER)
        .into_owned()
}

/// Removes source markers such as `【4:0†source】`, repeating until none remain
/// (removing an inner marker can expose an outer one).
pub fn strip_citation_markers(text: &str) -> String {
    let mut current = text.to_string();
    while CITATION_MARKER.is_match(&current) {
        current = CITATION_MARKER.replace_all(&current, "").into_owned();
    }
    current
}

/// Replaces the markdown link pointing at `target` (or the bare `target` text
/// when it is not inside a link) with `replacement`.
pub fn replace_link_target(text: &str, target: &str, replacement: &str) -> String {
    let mut replaced = false;
    let out = MARKDOWN_LINK.replace_all(text, |captures: &regex::Captures<'_>| {
        if captures.get(2).map(|m| m.as_str()) == Some(target) {
            replaced = true;
            replacement.to_string()
        } else {
            captures[0].to_string()
        }
    });
    if replaced {
        out.into_owned()
    } else {
        text.replace(target, replacement)
    }
}

pub fn code_input_block(input: &str) -> String {
    format!("### code interpreter\ninput:\n```python\n{input}\n```")
}

pub fn code_output_block(logs: &str) -> String {
    format!("### code interpreter\noutput:\n```\n{logs}\n```")
}

pub fn function_notice(function_name: &str) -> String {
    format!("### Function Calling: {function_name}")
}

/// Inline HTML anchor embedding the file as a base64 data URI.
pub fn download_link_tag(mime_type: &str, bytes: &[u8], file_name: &str) -> String {
    let encoded = STANDARD.encode(bytes);
    let file_name = file_name.replace('"', "");
    format!(
        "<a href=\"data:{mime_type};base64,{encoded}\" download=\"{file_name}\">{DOWNLOAD_PLACEHOLDER}</a>"
    )
}

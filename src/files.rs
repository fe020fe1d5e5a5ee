//! Upload validation and download inlining.

use crate::api::RunTransport;
use crate::types::Annotation;
use crate::ui::markup::{download_link_tag, replace_link_target, DOWNLOAD_PLACEHOLDER};
use std::path::Path;
use thiserror::Error;

pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] =
    &["txt", "pdf", "csv", "json", "geojson", "xlsx", "xls"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("file uploads are disabled")]
    Disabled,
    #[error("'{0}' does not exist")]
    Missing(String),
    #[error("'{0}' is not a regular file")]
    NotAFile(String),
    #[error("unsupported file type '{extension}'; allowed: {}", ALLOWED_UPLOAD_EXTENSIONS.join(", "))]
    UnsupportedExtension { extension: String },
}

/// Checks that `path` names an existing file with an allowed extension.
pub fn validate_upload(path: &Path) -> Result<(), UploadError> {
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(UploadError::Missing(shown));
    }
    if !path.is_file() {
        return Err(UploadError::NotAFile(shown));
    }
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::UnsupportedExtension { extension });
    }
    Ok(())
}

/// Download name for a generated file: the last path segment of the sandbox
/// path the annotation points at.
pub fn download_file_name(annotation_text: &str) -> String {
    annotation_text
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Replaces each `file_path` annotation's link with an inline data-URI anchor.
/// A file that cannot be fetched degrades to the plain placeholder.
pub async fn inline_downloads(
    transport: &dyn RunTransport,
    text: &str,
    annotations: &[Annotation],
) -> String {
    let mut out = text.to_string();
    for annotation in annotations {
        let Annotation::FilePath {
            text: target,
            file_id,
        } = annotation
        else {
            continue;
        };

        let replacement = match transport.file_content(file_id).await {
            Ok(content) => download_link_tag(
                &content.mime_type,
                &content.bytes,
                &download_file_name(target),
            ),
            Err(error) => {
                tracing::warn!(
                    file_id = file_id.as_str(),
                    error = %error,
                    "could not fetch generated file; showing placeholder"
                );
                DOWNLOAD_PLACEHOLDER.to_string()
            }
        };
        out = replace_link_target(&out, target, &replacement);
    }
    out
}

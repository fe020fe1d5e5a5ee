use super::events::{event_stream, EventStream};
use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::{AzureSettings, Config};
use crate::error::ApiError;
use crate::types::{
    ApiErrorEnvelope, FileObject, MessageAttachment, MessageCreate, RunCreate, SubmitToolOutputs,
    ThreadObject, ToolOutput,
};
use crate::util::is_local_endpoint_url;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

/// Downloaded file body plus the MIME type the server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// The remote run protocol. Every operation that opens a stream returns the
/// decoded domain events of that stream.
#[async_trait]
pub trait RunTransport: Send + Sync {
    async fn create_thread(&self) -> Result<String, ApiError>;

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachment_ids: &[String],
    ) -> Result<(), ApiError>;

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<EventStream, ApiError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, ApiError>;

    async fn file_content(&self, file_id: &str) -> Result<FileContent, ApiError>;

    async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Flavor {
    OpenAi { api_key: Option<String> },
    Azure { api_key: String, api_version: String },
}

/// HTTP implementation of [`RunTransport`] for OpenAI and Azure OpenAI.
#[derive(Clone)]
pub struct AssistantsClient {
    http: reqwest::Client,
    base_url: String,
    flavor: Flavor,
}

impl AssistantsClient {
    pub fn new(config: &Config) -> Self {
        match &config.azure {
            Some(azure) => Self::azure(azure),
            None => Self::openai(&config.api_url, config.api_key.clone()),
        }
    }

    pub fn openai(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            flavor: Flavor::OpenAi { api_key },
        }
    }

    pub fn azure(settings: &AzureSettings) -> Self {
        let endpoint = settings.endpoint.trim().trim_end_matches('/');
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{endpoint}/openai"),
            flavor: Flavor::Azure {
                api_key: settings.api_key.clone(),
                api_version: settings.api_version.clone(),
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.request(method, url);
        match &self.flavor {
            Flavor::OpenAi { api_key } => {
                let request = request.header("OpenAI-Beta", ASSISTANTS_BETA_HEADER);
                match api_key {
                    Some(api_key) => request.header("authorization", format!("Bearer {api_key}")),
                    None => request,
                }
            }
            Flavor::Azure {
                api_key,
                api_version,
            } => request
                .header("api-key", api_key)
                .query(&[("api-version", api_version.as_str())]),
        }
    }

    fn json_request<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let payload = serde_json::to_value(body)?;
        if debug_payload_enabled() {
            emit_debug_payload(url, &payload);
        }
        Ok(self
            .request(reqwest::Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, url))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|envelope| envelope.into_body().message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("error").to_string()
                } else {
                    body.trim().to_string()
                }
            });
        Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(request, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_api_request_error(error, url))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_stream(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<EventStream, ApiError> {
        let response = self.send(request, url).await?;
        let url_for_stream = url.to_string();
        let bytes = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_api_request_error(error, &url_for_stream)));
        Ok(event_stream(Box::pin(bytes)))
    }
}

#[async_trait]
impl RunTransport for AssistantsClient {
    async fn create_thread(&self) -> Result<String, ApiError> {
        let url = self.url("threads");
        let request = self.json_request(&url, &serde_json::json!({}))?;
        let thread: ThreadObject = self.send_json(request, &url).await?;
        tracing::info!(thread_id = thread.id.as_str(), "created thread");
        Ok(thread.id)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachment_ids: &[String],
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("threads/{thread_id}/messages"));
        let body = MessageCreate {
            role: "user".to_string(),
            content: content.to_string(),
            attachments: attachment_ids
                .iter()
                .map(|id| MessageAttachment::for_file(id.as_str()))
                .collect(),
        };
        let request = self.json_request(&url, &body)?;
        let _: serde_json::Value = self.send_json(request, &url).await?;
        Ok(())
    }

    async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<EventStream, ApiError> {
        let url = self.url(&format!("threads/{thread_id}/runs"));
        let body = RunCreate {
            assistant_id: assistant_id.to_string(),
            stream: true,
            additional_instructions: additional_instructions
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string),
        };
        let request = self.json_request(&url, &body)?;
        self.send_stream(request, &url).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, ApiError> {
        let url = self.url(&format!(
            "threads/{thread_id}/runs/{run_id}/submit_tool_outputs"
        ));
        let body = SubmitToolOutputs {
            tool_outputs: outputs,
            stream: true,
        };
        let request = self.json_request(&url, &body)?;
        self.send_stream(request, &url).await
    }

    async fn file_content(&self, file_id: &str) -> Result<FileContent, ApiError> {
        let url = self.url(&format!("files/{file_id}/content"));
        let response = self
            .send(self.request(reqwest::Method::GET, &url), &url)
            .await?;
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_api_request_error(error, &url))?;
        Ok(FileContent { bytes, mime_type })
    }

    async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError> {
        let url = self.url("files");
        let contents = tokio::fs::read(path)
            .await
            .map_err(|error| ApiError::Request {
                url: url.clone(),
                message: format!("cannot read '{}': {error}", path.display()),
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part(
                "file",
                reqwest::multipart::Part::bytes(contents).file_name(file_name),
            );
        let request = self.request(reqwest::Method::POST, &url).multipart(form);
        let file: FileObject = self.send_json(request, &url).await?;
        tracing::info!(file_id = file.id.as_str(), path = %path.display(), "uploaded file");
        Ok(file)
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> ApiError {
    let url = request_url.to_string();
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return ApiError::Connect {
            url,
            message: format!("{error}. Start your local server or update RUNSTREAM_API_URL."),
        };
    }
    if error.is_connect() {
        return ApiError::Connect {
            url,
            message: error.to_string(),
        };
    }
    if error.is_timeout() {
        return ApiError::Timeout {
            url,
            message: error.to_string(),
        };
    }
    if let Some(status) = error.status() {
        return ApiError::Status {
            url,
            status: status.as_u16(),
            message: error.to_string(),
        };
    }
    ApiError::Request {
        url,
        message: error.to_string(),
    }
}

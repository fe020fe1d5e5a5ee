use futures::StreamExt;
use runstream::api::mock_client::frames;
use runstream::api::{AssistantsClient, RunTransport};
use runstream::config::AzureSettings;
use runstream::error::ApiError;
use runstream::types::{StreamEvent, ToolOutput};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_client(server: &MockServer) -> AssistantsClient {
    AssistantsClient::openai(&server.uri(), Some("sk-test".to_string()))
}

fn sse_body(frames: &[String]) -> String {
    frames.concat()
}

#[tokio::test]
async fn test_create_thread_sends_beta_and_bearer_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "thread_abc",
            "object": "thread",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let thread_id = openai_client(&server).create_thread().await.expect("thread");
    assert_eq!(thread_id, "thread_abc");
}

#[tokio::test]
async fn test_create_message_attaches_files_for_both_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/messages"))
        .and(body_json(json!({
            "role": "user",
            "content": "summarise",
            "attachments": [{
                "file_id": "file_1",
                "tools": [{ "type": "code_interpreter" }, { "type": "file_search" }]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_1" })))
        .expect(1)
        .mount(&server)
        .await;

    openai_client(&server)
        .create_message("thread_1", "summarise", &["file_1".to_string()])
        .await
        .expect("message");
}

#[tokio::test]
async fn test_stream_run_decodes_sse_body() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        frames::run_created("run_1"),
        frames::message_delta("msg_1", "Hi"),
        frames::message_completed("msg_1", "Hi"),
        frames::run_completed("run_1"),
        frames::done(),
    ]);
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/runs"))
        .and(body_json(json!({
            "assistant_id": "asst_1",
            "stream": true,
            "additional_instructions": "Be brief."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = openai_client(&server)
        .stream_run("thread_1", "asst_1", Some("Be brief."))
        .await
        .expect("stream");
    let events: Vec<StreamEvent> = stream
        .map(|item| item.expect("event"))
        .collect()
        .await;

    assert_eq!(
        events.first(),
        Some(&StreamEvent::RunStarted {
            run_id: "run_1".to_string()
        })
    );
    assert_eq!(
        events.last(),
        Some(&StreamEvent::RunCompleted {
            run_id: "run_1".to_string()
        })
    );
}

#[tokio::test]
async fn test_submit_tool_outputs_posts_every_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/runs/run_1/submit_tool_outputs"))
        .and(body_json(json!({
            "tool_outputs": [
                { "tool_call_id": "call_1", "output": "4" },
                { "tool_call_id": "call_2", "output": "Error: boom" }
            ],
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&[frames::run_completed("run_1")]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outputs = vec![
        ToolOutput {
            tool_call_id: "call_1".to_string(),
            output: "4".to_string(),
        },
        ToolOutput {
            tool_call_id: "call_2".to_string(),
            output: "Error: boom".to_string(),
        },
    ];
    let stream = openai_client(&server)
        .submit_tool_outputs("thread_1", "run_1", outputs)
        .await
        .expect("stream");
    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_error_status_surfaces_remote_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .mount(&server)
        .await;

    let error = openai_client(&server)
        .create_thread()
        .await
        .expect_err("unauthorised");
    match error {
        ApiError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_file_content_reports_mime_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/file_1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a,b\n", "text/csv"))
        .mount(&server)
        .await;

    let content = openai_client(&server)
        .file_content("file_1")
        .await
        .expect("content");
    assert_eq!(content.mime_type, "text/csv");
    assert_eq!(content.bytes.as_ref(), b"a,b\n");
}

#[tokio::test]
async fn test_upload_file_sends_multipart_with_purpose() {
    let temp = tempfile::TempDir::new().expect("temp dir");
    let file = temp.path().join("data.csv");
    std::fs::write(&file, "a,b\n1,2\n").expect("write");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(body_string_contains("assistants"))
        .and(body_string_contains("filename=\"data.csv\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file_up",
            "object": "file",
            "filename": "data.csv",
            "purpose": "assistants"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uploaded = openai_client(&server).upload_file(&file).await.expect("upload");
    assert_eq!(uploaded.id, "file_up");
    assert_eq!(uploaded.filename.as_deref(), Some("data.csv"));
}

#[tokio::test]
async fn test_azure_flavour_uses_api_key_header_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/threads"))
        .and(header("api-key", "azure-key"))
        .and(query_param("api-version", "2024-05-01-preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "thread_az" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AssistantsClient::azure(&AzureSettings {
        endpoint: server.uri(),
        api_key: "azure-key".to_string(),
        api_version: "2024-05-01-preview".to_string(),
    });
    assert_eq!(client.create_thread().await.expect("thread"), "thread_az");
}

use runstream::api::mock_client::frames;
use runstream::api::MockTransport;
use runstream::error::TurnError;
use runstream::state::{SessionController, Speaker};
use runstream::tools::{default_registry, ToolRegistry};
use runstream::ui::{RecordingRenderer, TerminalRenderer};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_generated_file_is_inlined_as_download_link() {
    let transport = MockTransport::default().with_file("file_7", b"x,y\n", "text/csv");
    transport.push_stream(vec![
        frames::run_created("run_1"),
        frames::message_delta("msg_1", "Saved [out.csv](sandbox:/mnt/data/out.csv)"),
        frames::message_completed_annotated(
            "msg_1",
            "Saved [out.csv](sandbox:/mnt/data/out.csv)",
            vec![frames::file_path_annotation("sandbox:/mnt/data/out.csv", "file_7")],
        ),
        frames::run_completed("run_1"),
    ]);
    let mut controller = SessionController::new(Arc::new(transport.clone()), ToolRegistry::empty());
    let mut renderer = RecordingRenderer::new();

    controller
        .send_message("export it", "asst_1", &mut renderer)
        .await
        .expect("turn");

    let last = controller.session().chat_log.last().expect("assistant entry");
    assert_eq!(
        last.text,
        "Saved <a href=\"data:text/csv;base64,eCx5Cg==\" download=\"out.csv\">Download Link</a>"
    );
    let slot = renderer.last_slot().expect("slot");
    assert_eq!(renderer.updates_for(slot)[1], "Saved Download Link");
}

#[tokio::test]
async fn test_workspace_tool_round_trip() {
    let workspace = TempDir::new().expect("temp dir");
    std::fs::write(workspace.path().join("answer.txt"), "42").expect("write");
    let registry = default_registry(workspace.path().to_path_buf()).expect("registry");

    let transport = MockTransport::new(vec![
        vec![
            frames::run_created("run_1"),
            frames::function_call_delta(
                "step_1",
                0,
                "call_1",
                "read_file",
                "{\"path\":\"answer.txt\"}",
            ),
            frames::run_requires_action(
                "run_1",
                &[("call_1", "read_file", "{\"path\":\"answer.txt\"}")],
            ),
        ],
        vec![
            frames::message_delta("msg_2", "The file says 42."),
            frames::message_completed("msg_2", "The file says 42."),
            frames::run_completed("run_1"),
        ],
    ]);
    let mut controller = SessionController::new(Arc::new(transport.clone()), registry);
    let mut renderer = TerminalRenderer::new(Vec::new());

    controller
        .send_message("what is in answer.txt?", "asst_1", &mut renderer)
        .await
        .expect("turn");

    let outputs = transport.submitted_outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0][0].output, "42");

    let printed = String::from_utf8(renderer.into_inner()).expect("utf8");
    assert!(printed.contains("### Function Calling: read_file"));
    assert!(printed.contains("The file says 42."));
}

#[tokio::test]
async fn test_tool_error_is_submitted_not_raised() {
    let workspace = TempDir::new().expect("temp dir");
    let registry = default_registry(workspace.path().to_path_buf()).expect("registry");
    let transport = MockTransport::new(vec![
        vec![
            frames::run_created("run_1"),
            frames::run_requires_action(
                "run_1",
                &[("call_1", "read_file", "{\"path\":\"missing.txt\"}")],
            ),
        ],
        vec![
            frames::message_completed("msg_2", "That file does not exist."),
            frames::run_completed("run_1"),
        ],
    ]);
    let mut controller = SessionController::new(Arc::new(transport.clone()), registry);
    let mut renderer = RecordingRenderer::new();

    controller
        .send_message("read missing.txt", "asst_1", &mut renderer)
        .await
        .expect("turn");

    let submitted = transport.submitted_outputs();
    let output = &submitted[0][0];
    assert_eq!(output.tool_call_id, "call_1");
    assert!(output.output.starts_with("Error: no such file or directory: missing.txt"));
    assert!(controller
        .session()
        .chat_log
        .iter()
        .all(|entry| entry.speaker != Speaker::Error));
}

#[tokio::test]
async fn test_remote_error_event_fails_turn() {
    let transport = MockTransport::new(vec![vec![
        frames::run_created("run_1"),
        frames::error("server overloaded"),
    ]]);
    let mut controller = SessionController::new(Arc::new(transport), ToolRegistry::empty());
    let mut renderer = RecordingRenderer::new();

    let result = controller.send_message("hi", "asst_1", &mut renderer).await;

    assert!(matches!(result, Err(TurnError::Transport(_))));
    let last = controller.session().chat_log.last().expect("error entry");
    assert_eq!(last.speaker, Speaker::Error);
    assert_eq!(last.text, "event stream error: server overloaded");
}

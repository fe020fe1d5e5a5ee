use bytes::Bytes;
use futures::{stream, StreamExt};
use runstream::api::mock_client::frames;
use runstream::api::stream::{SseParser, WireEvent};
use runstream::api::{event_stream, EventAccumulator};
use runstream::error::ApiError;
use runstream::types::{Annotation, RunStatus, StreamEvent};
use serde_json::json;

fn decode(chunks: &[&[u8]]) -> Vec<StreamEvent> {
    let mut parser = SseParser::new();
    let mut accumulator = EventAccumulator::new();
    let mut events = Vec::new();
    for chunk in chunks {
        for wire in parser.process(chunk) {
            events.extend(accumulator.push(wire).expect("no stream error"));
        }
    }
    events
}

#[test]
fn test_fragmented_frames() {
    let frame = frames::message_delta("msg_1", "Hi");
    let (head, tail) = frame.split_at(frame.len() / 2);

    let mut parser = SseParser::new();
    assert!(parser.process(head.as_bytes()).is_empty());
    let events = parser.process(tail.as_bytes());
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WireEvent::MessageDelta(_)));
}

#[test]
fn test_malformed_payload_is_skipped() {
    let mut parser = SseParser::new();
    let events = parser.process(b"event: thread.run.created\ndata: {invalid json}\n\n");
    assert!(events.is_empty());

    let events = parser.process(frames::run_completed("run_1").as_bytes());
    assert_eq!(events.len(), 1);
}

#[test]
fn test_unknown_events_are_ignored() {
    let mut parser = SseParser::new();
    let events = parser.process(b"event: thread.created\ndata: {\"id\":\"thread_1\"}\n\n");
    assert!(events.is_empty());
}

#[test]
fn test_done_sentinel() {
    let mut parser = SseParser::new();
    let events = parser.process(frames::done().as_bytes());
    assert!(matches!(events.as_slice(), [WireEvent::Done]));
}

#[test]
fn test_run_status_decodes_requires_action_calls() {
    let mut parser = SseParser::new();
    let frame = frames::run_requires_action("run_1", &[("call_1", "add", "{\"a\":1}")]);
    let events = parser.process(frame.as_bytes());

    match events.as_slice() {
        [WireEvent::Run(run)] => {
            assert_eq!(run.status, RunStatus::RequiresAction);
            let pending = run.pending_tool_calls();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].function.name, "add");
            assert_eq!(pending[0].function.arguments, "{\"a\":1}");
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn test_text_snapshots_grow_across_deltas() {
    let a = frames::message_delta("msg_1", "a");
    let b = frames::message_delta("msg_1", "b");
    let c = frames::message_delta("msg_1", "c");
    let events = decode(&[a.as_bytes(), b.as_bytes(), c.as_bytes()]);

    let snapshots: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::TextDelta { snapshot, .. } => Some(snapshot.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(snapshots, vec!["a", "ab", "abc"]);
}

#[test]
fn test_completed_message_supplies_annotations() {
    let delta = frames::message_delta("msg_1", "[f](sandbox:/mnt/data/f.csv)");
    let completed = frames::message_completed_annotated(
        "msg_1",
        "[f](sandbox:/mnt/data/f.csv)",
        vec![frames::file_path_annotation("sandbox:/mnt/data/f.csv", "file_9")],
    );
    let events = decode(&[delta.as_bytes(), completed.as_bytes()]);

    assert_eq!(
        events.last(),
        Some(&StreamEvent::TextDone {
            text: "[f](sandbox:/mnt/data/f.csv)".to_string(),
            annotations: vec![Annotation::FilePath {
                text: "sandbox:/mnt/data/f.csv".to_string(),
                file_id: "file_9".to_string(),
            }],
        })
    );
}

#[test]
fn test_message_without_deltas_still_produces_text() {
    let completed = frames::message_completed("msg_1", "whole answer");
    let events = decode(&[completed.as_bytes()]);

    assert_eq!(
        events,
        vec![
            StreamEvent::TextCreated,
            StreamEvent::TextDone {
                text: "whole answer".to_string(),
                annotations: Vec::new(),
            },
        ]
    );
}

#[test]
fn test_incomplete_run_counts_as_completed() {
    let frame = frames::sse(
        "thread.run.incomplete",
        &json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "assistant_id": "asst_1",
            "status": "incomplete",
        }),
    );
    let events = decode(&[frame.as_bytes()]);
    assert_eq!(
        events.last(),
        Some(&StreamEvent::RunCompleted {
            run_id: "run_1".to_string()
        })
    );
}

#[tokio::test]
async fn test_transport_break_ends_event_stream() {
    let chunks: Vec<Result<Bytes, ApiError>> = vec![
        Ok(Bytes::from(frames::run_created("run_1"))),
        Err(ApiError::Stream("connection reset".to_string())),
        Ok(Bytes::from(frames::run_completed("run_1"))),
    ];
    let items: Vec<_> = event_stream(Box::pin(stream::iter(chunks))).collect().await;

    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(ApiError::Stream(ref message)) if message == "connection reset"));
}

#[tokio::test]
async fn test_unterminated_final_frame_is_decoded() {
    let last = frames::run_completed("run_1");
    let chunks: Vec<Result<Bytes, ApiError>> = vec![Ok(Bytes::from(
        last.trim_end_matches('\n').to_string(),
    ))];
    let items: Vec<_> = event_stream(Box::pin(stream::iter(chunks))).collect().await;

    assert!(matches!(
        items.last(),
        Some(Ok(StreamEvent::RunCompleted { run_id })) if run_id == "run_1"
    ));
}

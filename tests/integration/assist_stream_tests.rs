//! End-to-end `/assist` flows through the axum router.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use agent_stream::agent::Agent;
use agent_stream::models::request::{Query, Session};
use agent_stream::response::ResponseHandler;
use agent_stream::transport::sse::router;
use agent_stream::{AppError, Result};

use super::test_helpers::{echo_app_state, parse_frames, test_app_state};

fn assist_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/assist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn post_assist(
    state: Arc<agent_stream::transport::sse::AppState>,
    body: &Value,
) -> (StatusCode, String) {
    let resp = router(state)
        .oneshot(assist_request(body))
        .await
        .expect("router responds");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body completes");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
}

/// Interleaves two text streams, then leaves one open for `complete()`.
struct InterleavingAgent;

impl Agent for InterleavingAgent {
    fn name(&self) -> &str {
        "interleaver"
    }

    fn assist<'a>(
        &'a self,
        _session: &'a Session,
        _query: &'a Query,
        handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let left = handler.create_text_stream("LEFT")?;
            let right = handler.create_text_stream("RIGHT")?;
            left.emit_chunk("l1").await?;
            right.emit_chunk("r1").await?;
            left.emit_chunk("l2").await?;
            left.complete().await?;
            right.emit_chunk("r2").await?;
            handler.emit_error("partial data", 206, None).await?;
            handler.complete().await
        })
    }
}

/// Fails without touching the handler.
struct BrokenAgent;

impl Agent for BrokenAgent {
    fn name(&self) -> &str {
        "broken"
    }

    fn assist<'a>(
        &'a self,
        _session: &'a Session,
        _query: &'a Query,
        _handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { Err(AppError::Agent("model crashed".into())) })
    }
}

/// Counts how often it is invoked.
struct CountingAgent(AtomicUsize);

impl Agent for CountingAgent {
    fn name(&self) -> &str {
        "counter"
    }

    fn assist<'a>(
        &'a self,
        _session: &'a Session,
        _query: &'a Query,
        handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { handler.respond("count", "counted").await })
    }
}

#[tokio::test]
async fn echo_agent_frames_arrive_in_order_ending_with_done() {
    let (status, body) = post_assist(
        echo_app_state(),
        &json!({"query": {"id": "q-1", "prompt": "one two"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let frames = parse_frames(&body);
    let names: Vec<&str> = frames.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        [
            "ACKNOWLEDGEMENT",
            "FINAL_RESPONSE",
            "FINAL_RESPONSE",
            "FINAL_RESPONSE",
            "FINAL_RESPONSE",
            "SUMMARY",
            "done"
        ]
    );

    let (_, summary) = &frames[5];
    assert_eq!(summary["content_type"], "atomic.json");
    assert_eq!(summary["content"]["words"], 2);
    assert_eq!(summary["content"]["query_id"], "q-1");

    for (_, data) in &frames {
        assert_eq!(data["source"], "test-client");
    }
}

#[tokio::test]
async fn frames_are_event_line_then_data_line() {
    let (status, body) = post_assist(
        echo_app_state(),
        &json!({"query": {"id": "q-raw", "prompt": "hi"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        body.starts_with("event: ACKNOWLEDGEMENT\ndata: {"),
        "unexpected body start: {body:?}"
    );
    assert!(body.ends_with("\n\n"), "unterminated body: {body:?}");

    for frame in body.split_terminator("\n\n") {
        let lines: Vec<&str> = frame.split('\n').collect();
        assert_eq!(lines.len(), 2, "frame {frame:?}");
        assert!(lines[0].starts_with("event: "), "frame {frame:?}");
        let data = lines[1].strip_prefix("data: ").expect("data line");
        let value: Value = serde_json::from_str(data).expect("data is one JSON line");
        assert_eq!(value["event_name"], lines[0].trim_start_matches("event: "));
    }
    let last = body.split_terminator("\n\n").last().expect("frames");
    assert!(last.starts_with("event: done\ndata: {"), "last frame {last:?}");
}

#[tokio::test]
async fn session_processor_id_becomes_event_source() {
    let (_, body) = post_assist(
        echo_app_state(),
        &json!({
            "session": {
                "processor_id": "proc-77",
                "activity_id": "act",
                "request_id": "req",
                "interactions": []
            },
            "query": {"id": "q-1", "prompt": "hi"}
        }),
    )
    .await;

    let frames = parse_frames(&body);
    assert!(frames.iter().all(|(_, data)| data["source"] == "proc-77"));
}

#[tokio::test]
async fn interleaved_streams_are_each_terminated_before_done() {
    let (status, body) = post_assist(
        test_app_state(Arc::new(InterleavingAgent)),
        &json!({"query": {"id": "q", "prompt": ""}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let frames = parse_frames(&body);
    let chunk = |name: &str, content: &str, complete: bool| {
        frames.iter().position(|(n, d)| {
            n == name && d["content"] == content && d["is_complete"] == complete
        })
    };

    let l_final = chunk("LEFT", "", true).expect("left final chunk");
    let r_final = chunk("RIGHT", "", true).expect("right final chunk");
    assert!(chunk("LEFT", "l2", false).expect("l2") < l_final);
    assert!(chunk("RIGHT", "r2", false).expect("r2") < r_final);

    let error_at = frames
        .iter()
        .position(|(n, _)| n == "error")
        .expect("error frame");
    assert_eq!(frames[error_at].1["content"]["error_code"], 206);
    assert!(r_final > error_at, "open stream is closed by complete()");

    let (last, _) = frames.last().expect("frames");
    assert_eq!(last, "done");
    assert_eq!(frames.iter().filter(|(n, _)| n == "done").count(), 1);
}

#[tokio::test]
async fn failing_agent_still_terminates_the_stream() {
    let (status, body) = post_assist(
        test_app_state(Arc::new(BrokenAgent)),
        &json!({"query": {"id": "q", "prompt": "hi"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let frames = parse_frames(&body);
    assert_eq!(frames.len(), 2);
    let (name, data) = &frames[0];
    assert_eq!(name, "error");
    assert_eq!(data["content"]["error_code"], 500);
    assert!(data["content"]["error_message"]
        .as_str()
        .unwrap()
        .contains("model crashed"));
    assert_eq!(frames[1].0, "done");
}

#[tokio::test]
async fn invalid_request_is_rejected_without_running_the_agent() {
    let agent = Arc::new(CountingAgent(AtomicUsize::new(0)));
    let state = test_app_state(Arc::clone(&agent) as Arc<dyn Agent>);

    let (status, body) =
        post_assist(Arc::clone(&state), &json!({"query": {"id": "", "prompt": "hi"}})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("query.id"), "{body}");

    let (status, _) = post_assist(Arc::clone(&state), &json!({"session": null})).await;
    assert!(status.is_client_error(), "{status}");

    assert_eq!(agent.0.load(Ordering::SeqCst), 0);

    let (status, body) =
        post_assist(state, &json!({"query": {"id": "q", "prompt": "hi"}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent.0.load(Ordering::SeqCst), 1);
    assert_eq!(parse_frames(&body).len(), 2);
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let state = echo_app_state();
    let alpha = json!({"query": {"id": "a", "prompt": "alpha"}});
    let beta = json!({"query": {"id": "b", "prompt": "beta"}});
    let first = post_assist(Arc::clone(&state), &alpha);
    let second = post_assist(state, &beta);
    let ((_, first), (_, second)) = tokio::join!(first, second);

    let text = |body: &str| -> String {
        parse_frames(body)
            .iter()
            .filter(|(n, _)| n == "FINAL_RESPONSE")
            .filter_map(|(_, d)| d["content"].as_str().map(str::to_owned))
            .collect()
    };
    assert_eq!(text(&first), "alpha");
    assert_eq!(text(&second), "beta");
}

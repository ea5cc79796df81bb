//! Forced-completion policy of the agent runner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agent_stream::agent::runner::{run_agent, spawn_agent, RunOutcome};
use agent_stream::agent::{Agent, EchoAgent};
use agent_stream::hook::{self, EventReceiver};
use agent_stream::models::event::{Event, EventPayload, DEFAULT_ERROR_CODE};
use agent_stream::models::identity::Identity;
use agent_stream::models::request::{Query, Session};
use agent_stream::response::ResponseHandler;
use agent_stream::{AppError, Result};

#[derive(Clone, Copy)]
enum Behaviour {
    Completes,
    Forgets,
    Fails,
    FailsAfterComplete,
    Panics,
    Hangs,
}

struct ScriptedAgent(Behaviour);

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn assist<'a>(
        &'a self,
        _session: &'a Session,
        _query: &'a Query,
        handler: &'a mut ResponseHandler,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let behaviour = self.0;
        Box::pin(async move {
            let stream = handler.create_text_stream("FINAL")?;
            stream.emit_chunk("partial").await?;
            match behaviour {
                Behaviour::Completes => handler.complete().await,
                Behaviour::Forgets => Ok(()),
                Behaviour::Fails => Err(AppError::Agent("upstream model unavailable".into())),
                Behaviour::FailsAfterComplete => {
                    handler.complete().await?;
                    handler.emit_text_block("late", "x").await
                }
                Behaviour::Panics => panic!("agent bug"),
                Behaviour::Hangs => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            }
        })
    }
}

fn fixtures() -> (Session, Query, ResponseHandler, EventReceiver) {
    let (hook, rx) = hook::channel();
    let handler = ResponseHandler::new(Identity::new("proc-1", "scripted"), Arc::new(hook));
    let session = Session::from_object(None, "proc-1");
    let query = Query {
        id: "q-1".into(),
        prompt: "hello streaming world".into(),
    };
    (session, query, handler, rx)
}

async fn run(behaviour: Behaviour, timeout: Option<Duration>) -> (RunOutcome, Vec<Event>) {
    let (session, query, handler, mut rx) = fixtures();
    let outcome = run_agent(
        Arc::new(ScriptedAgent(behaviour)),
        session,
        query,
        handler,
        timeout,
    )
    .await;
    (outcome, rx.drain())
}

fn assert_terminated_once(events: &[Event]) {
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    assert!(events.last().expect("events").is_done());
}

fn error_content(events: &[Event]) -> (String, i64, String) {
    events
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::Error { content } => Some((
                content.error_message.clone(),
                content.error_code,
                content
                    .details
                    .as_ref()
                    .and_then(|d| d.get("failure"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned(),
            )),
            _ => None,
        })
        .expect("error event")
}

#[tokio::test]
async fn completing_agent_is_left_alone() {
    let (outcome, events) = run(Behaviour::Completes, None).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(events.len(), 3);
    assert_terminated_once(&events);
}

#[tokio::test]
async fn forgotten_completion_is_supplied() {
    let (outcome, events) = run(Behaviour::Forgets, None).await;

    assert_eq!(outcome, RunOutcome::AutoCompleted);
    assert_terminated_once(&events);
    assert!(!events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::Error { .. })));
}

#[tokio::test]
async fn agent_error_becomes_error_event_then_done() {
    let (outcome, events) = run(Behaviour::Fails, None).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    let (message, code, failure) = error_content(&events);
    assert!(message.contains("upstream model unavailable"), "{message}");
    assert_eq!(code, DEFAULT_ERROR_CODE);
    assert_eq!(failure, "error");
    assert_terminated_once(&events);

    // The open stream is closed before the terminal event.
    let final_chunk = events
        .iter()
        .position(|e| matches!(e.payload, EventPayload::TextChunk { is_complete: true, .. }))
        .expect("final chunk");
    assert_eq!(final_chunk, events.len() - 2);
}

#[tokio::test]
async fn failure_after_complete_emits_nothing_more() {
    let (outcome, events) = run(Behaviour::FailsAfterComplete, None).await;

    match outcome {
        RunOutcome::Failed(message) => assert!(message.starts_with("response stream closed")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(events.len(), 3);
    assert_terminated_once(&events);
}

#[tokio::test]
async fn panic_becomes_error_event_then_done() {
    let (outcome, events) = run(Behaviour::Panics, None).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    let (message, _, failure) = error_content(&events);
    assert!(message.contains("agent bug"), "{message}");
    assert_eq!(failure, "panic");
    assert_terminated_once(&events);
}

#[tokio::test]
async fn timeout_becomes_error_event_then_done() {
    let (outcome, events) = run(Behaviour::Hangs, Some(Duration::from_millis(50))).await;

    let RunOutcome::Failed(reason) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(reason.ends_with("timed out after 50ms"), "{reason}");
    let (message, _, failure) = error_content(&events);
    assert_eq!(message, reason);
    assert_eq!(failure, "timeout");
    assert_terminated_once(&events);
}

#[tokio::test]
async fn spawned_echo_agent_terminates_the_stream() {
    let (session, query, handler, mut rx) = fixtures();
    let agent: Arc<dyn Agent> = Arc::new(EchoAgent::new("echo", Duration::ZERO));

    let task = spawn_agent(agent, session, query, handler, Some(Duration::from_secs(5)));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let done = event.is_done();
        events.push(event);
        if done {
            break;
        }
    }
    assert_eq!(task.await.unwrap(), RunOutcome::Completed);

    let chunks: String = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::TextChunk { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, "hello streaming world");
    assert_eq!(events[0].event_name, "ACKNOWLEDGEMENT");
    assert_terminated_once(&events);
}

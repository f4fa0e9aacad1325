mod common;

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use browser_task_runner::{ActionResult, JobManager, RunnerConfig, TaskRunner, server};
use common::{MockBackend, Script};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(script: Script) -> (axum::Router, JobManager<MockBackend>) {
    let jobs = JobManager::new(TaskRunner::new(MockBackend::new(script), RunnerConfig::default()));
    (server::router(jobs.clone()), jobs)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_run(body: Value) -> Request<Body> {
    Request::post("/runs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health() {
    let (app, _) = app(Script::Results(vec![]));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_then_poll_until_finished() {
    let (app, jobs) = app(Script::Results(vec![ActionResult::terminal("Langchain is a framework...")]));

    let response = app
        .clone()
        .oneshot(post_run(json!({
            "task": "What is Langchain?",
            "model": "gpt-4o-mini",
            "api_key": "sk-test"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id: uuid::Uuid = serde_json::from_value(body_json(response).await["id"].clone()).unwrap();

    jobs.wait(id).await.unwrap();

    let response = app
        .oneshot(Request::get(format!("/runs/{id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["state"], "finished");
    assert_eq!(view["model"], "gpt-4o-mini");
    assert_eq!(view["outcome"]["success"], true);
    assert_eq!(view["outcome"]["status"], "completed");
    assert_eq!(
        view["outcome"]["aggregated_text"],
        "Langchain is a framework...\n\n"
    );
}

#[tokio::test]
async fn events_stream_ends_after_finished() {
    let (app, jobs) = app(Script::Results(vec![ActionResult::terminal("done")]));

    let response = app
        .clone()
        .oneshot(post_run(json!({ "task": "t", "api_key": "sk-test" })))
        .await
        .unwrap();
    let id: uuid::Uuid = serde_json::from_value(body_json(response).await["id"].clone()).unwrap();
    jobs.wait(id).await.unwrap();

    let response = app
        .oneshot(
            Request::get(format!("/runs/{id}/events"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = tokio::time::timeout(
        Duration::from_secs(2),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("event stream did not end")
    .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("event: finished"));
    assert!(body.contains(r#""aggregated_text":"done\n\n""#));
    assert_eq!(body.matches("event: ").count(), 1);
}

#[tokio::test]
async fn missing_key_is_a_bad_request() {
    let (app, jobs) = app(Script::Results(vec![]));

    let response = app
        .oneshot(post_run(json!({ "task": "What is Langchain?" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "an API key is required to run the agent"
    );
    assert!(jobs.list().await.is_empty());
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let (app, _) = app(Script::Results(vec![]));
    let id = uuid::Uuid::new_v4();

    let response = app
        .oneshot(
            Request::delete(format!("/runs/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

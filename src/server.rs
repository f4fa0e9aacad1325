//! JSON API over the job manager.

use std::convert::Infallible;
use std::time::Duration;

use anyhow::{Result, anyhow};
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::backend::AutomationBackend;
use crate::jobs::{JobError, JobId, JobManager, JobStatus};
use crate::types::{Credential, ModelId, TaskRequest};

/// Ports tried after the requested one when it is taken.
const PORT_FALLBACKS: u16 = 10;

#[derive(Debug, Deserialize)]
pub struct RunPayload {
    pub task: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: String,
}

impl RunPayload {
    fn into_request(self) -> Result<TaskRequest, ApiError> {
        let model = match self.model.as_deref() {
            Some(name) => name.parse::<ModelId>().map_err(ApiError::bad_request)?,
            None => ModelId::default(),
        };
        Ok(TaskRequest::new(self.task, model, Credential::new(self.api_key)))
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(err: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }

    fn not_found(id: JobId) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: JobError::NotFound(id).to_string(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => Self::not_found(id),
            JobError::Rejected(e) => Self::bad_request(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router<B: AutomationBackend>(jobs: JobManager<B>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/runs", get(list_runs::<B>).post(submit_run::<B>))
        .route("/runs/{id}", get(get_run::<B>).delete(cancel_run::<B>))
        .route("/runs/{id}/events", get(run_events::<B>))
        .with_state(jobs)
}

/// Binds 127.0.0.1 on `port`, or the next free port within the fallback
/// range, and serves until the process exits.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let mut bound = None;
    for p in port..port.saturating_add(PORT_FALLBACKS) {
        match tokio::net::TcpListener::bind(("127.0.0.1", p)).await {
            Ok(listener) => {
                bound = Some((listener, p));
                break;
            }
            Err(e) => debug!(port = p, error = %e, "Port unavailable"),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow!(
            "could not bind any port in {}..{}",
            port,
            port.saturating_add(PORT_FALLBACKS)
        )
    })?;

    info!("API listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn submit_run<B: AutomationBackend>(
    State(jobs): State<JobManager<B>>,
    Json(payload): Json<RunPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.into_request()?;
    let id = jobs.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id }))))
}

async fn list_runs<B: AutomationBackend>(State(jobs): State<JobManager<B>>) -> impl IntoResponse {
    Json(jobs.list().await)
}

async fn get_run<B: AutomationBackend>(
    State(jobs): State<JobManager<B>>,
    Path(id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError> {
    let view = jobs.view(id).await.ok_or(ApiError::not_found(id))?;
    Ok(Json(view))
}

async fn cancel_run<B: AutomationBackend>(
    State(jobs): State<JobManager<B>>,
    Path(id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError> {
    jobs.cancel(id).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn run_events<B: AutomationBackend>(
    State(jobs): State<JobManager<B>>,
    Path(id): Path<JobId>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = jobs.subscribe(id).await.ok_or(ApiError::not_found(id))?;
    // Ends right after the finished event; the sender outlives the job.
    let events = stream::unfold((WatchStream::new(rx), false), |(mut statuses, done)| async move {
        if done {
            return None;
        }
        let status = statuses.next().await?;
        let finished = status.is_finished();
        Some((Ok::<_, Infallible>(status_event(&status)), (statuses, finished)))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn status_event(status: &JobStatus) -> Event {
    let name = match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Finished { .. } => "finished",
    };
    Event::default()
        .event(name)
        .data(serde_json::to_string(status).unwrap_or_else(|_| "{}".to_string()))
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::auth::AuthError;
use super::domain::{ActorContext, ProposalId};
use super::reminder::ReminderSweeper;
use super::repository::{SchedulingStore, StoreError};
use super::service::{SchedulingError, SchedulingService};
use super::validate::{CreateProposalRequest, ScheduleSignatureRequest};

/// Shared handler state; cloning only bumps the service/sweeper refcounts.
pub struct SchedulingRouterState<S> {
    service: Arc<SchedulingService<S>>,
    sweeper: Arc<ReminderSweeper<S>>,
}

impl<S> Clone for SchedulingRouterState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            sweeper: self.sweeper.clone(),
        }
    }
}

/// Router builder exposing the scheduling workflow over HTTP.
pub fn scheduling_router<S>(
    service: Arc<SchedulingService<S>>,
    sweeper: Arc<ReminderSweeper<S>>,
) -> Router
where
    S: SchedulingStore + 'static,
{
    Router::new()
        .route("/api/v1/scheduling/proposals", post(create_handler::<S>))
        .route(
            "/api/v1/scheduling/proposals/:proposal_id",
            get(get_handler::<S>),
        )
        .route(
            "/api/v1/scheduling/proposals/:proposal_id/confirmation",
            post(confirm_handler::<S>),
        )
        .route(
            "/api/v1/scheduling/proposals/:proposal_id/decision",
            post(decision_handler::<S>),
        )
        .route("/api/v1/scheduling/signatures", post(signature_handler::<S>))
        .route(
            "/api/v1/scheduling/reminder-sweep",
            post(sweep_handler::<S>),
        )
        .with_state(SchedulingRouterState { service, sweeper })
}

/// Body for the date-confirmation endpoint.
#[derive(Debug, Deserialize)]
pub struct ConfirmDateRequest {
    pub chosen_date: NaiveDate,
    #[serde(default)]
    pub option: Option<u8>,
}

/// Body for the reviewer-decision endpoint.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
    #[serde(default)]
    pub note: String,
}

/// The actor context is built explicitly from the request headers; there is
/// no ambient session state.
fn actor_from_headers(headers: &HeaderMap) -> ActorContext {
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    ActorContext { actor_id }
}

fn error_response(error: SchedulingError) -> Response {
    let status = match &error {
        SchedulingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingError::Auth(AuthError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        SchedulingError::Auth(_) => StatusCode::FORBIDDEN,
        SchedulingError::ProposalNotFound(_) | SchedulingError::ComplianceNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        SchedulingError::InvalidStateTransition { .. }
        | SchedulingError::VersionConflict(_)
        | SchedulingError::InterviewNotApproved(_)
        | SchedulingError::Storage(StoreError::Conflict)
        | SchedulingError::Storage(StoreError::InterviewNotApproved(_)) => StatusCode::CONFLICT,
        SchedulingError::Storage(StoreError::NotFound) => StatusCode::NOT_FOUND,
        SchedulingError::Storage(StoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = match &error {
        SchedulingError::Validation(violation) => json!({
            "error": error.to_string(),
            "field": violation.field(),
        }),
        _ => json!({ "error": error.to_string() }),
    };

    (status, Json(body)).into_response()
}

fn worker_failure() -> Response {
    let body = json!({ "error": "scheduling worker task failed" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn create_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    headers: HeaderMap,
    Json(request): Json<CreateProposalRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
{
    let actor = actor_from_headers(&headers);
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.create(&actor, request)).await {
        Ok(Ok(proposal)) => (StatusCode::CREATED, Json(proposal.status_view())).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(_) => worker_failure(),
    }
}

async fn get_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    Path(proposal_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
{
    match state.service.get(&ProposalId(proposal_id)) {
        Ok(proposal) => (StatusCode::OK, Json(proposal.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn confirm_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    Path(proposal_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ConfirmDateRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
{
    let actor = actor_from_headers(&headers);
    let service = state.service.clone();
    let id = ProposalId(proposal_id);
    match tokio::task::spawn_blocking(move || {
        service.confirm_date(&actor, &id, request.chosen_date, request.option)
    })
    .await
    {
        Ok(Ok(proposal)) => (StatusCode::OK, Json(proposal.status_view())).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(_) => worker_failure(),
    }
}

async fn decision_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    Path(proposal_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
{
    let actor = actor_from_headers(&headers);
    let service = state.service.clone();
    let id = ProposalId(proposal_id);
    match tokio::task::spawn_blocking(move || {
        service.decide(&actor, &id, request.approve, &request.note)
    })
    .await
    {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(_) => worker_failure(),
    }
}

async fn signature_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    headers: HeaderMap,
    Json(request): Json<ScheduleSignatureRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
{
    let actor = actor_from_headers(&headers);
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.schedule_signature(&actor, request)).await {
        Ok(Ok(appointment)) => (StatusCode::CREATED, Json(appointment)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(_) => worker_failure(),
    }
}

async fn sweep_handler<S>(
    State(state): State<SchedulingRouterState<S>>,
    headers: HeaderMap,
) -> Response
where
    S: SchedulingStore + 'static,
{
    let actor = actor_from_headers(&headers);
    let service = state.service.clone();
    let sweeper = state.sweeper.clone();
    match tokio::task::spawn_blocking(move || {
        service.authorize_sweep(&actor)?;
        sweeper.sweep(Utc::now()).map_err(SchedulingError::from)
    })
    .await
    {
        Ok(Ok(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(_) => worker_failure(),
    }
}

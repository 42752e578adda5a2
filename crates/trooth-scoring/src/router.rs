use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::email::{RateLimitError, SendScope};
use crate::history::HistoryError;
use crate::repository::{AssessmentStore, EmailEventLog};
use crate::scoring::{ScoringError, ScoringStrategy};
use crate::service::{AssessmentService, ScoreRequest, ServiceError};

/// HTTP endpoints for scoring, history and e-mail throttling.
pub fn scoring_router<S, L>(service: Arc<AssessmentService<S, L>>) -> Router
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    Router::new()
        .route("/api/v1/scoring/:strategy", post(score_handler::<S, L>))
        .route(
            "/api/v1/history/:owner_id/:scope",
            get(history_handler::<S, L>),
        )
        .route(
            "/api/v1/email/:category/check",
            post(email_check_handler::<S, L>),
        )
        .route(
            "/api/v1/email/:category/sent",
            post(email_sent_handler::<S, L>),
        )
        .with_state(service)
}

pub(crate) async fn score_handler<S, L>(
    State(service): State<Arc<AssessmentService<S, L>>>,
    Path(strategy): Path<String>,
    Json(request): Json<ScoreRequest>,
) -> Response
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    let strategy = ScoringStrategy::from_tag(&strategy);
    match service.submit(strategy, request).await {
        Ok(scored) => (StatusCode::OK, Json(scored)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<usize>,
    cursor: Option<String>,
}

pub(crate) async fn history_handler<S, L>(
    State(service): State<Arc<AssessmentService<S, L>>>,
    Path((owner_id, scope)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    match service.history(&owner_id, &scope, query.limit, query.cursor.as_deref()) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn email_check_handler<S, L>(
    State(service): State<Arc<AssessmentService<S, L>>>,
    Path(category): Path<String>,
    Json(scope): Json<SendScope>,
) -> Response
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    match service.authorize_email(&scope, &category) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn email_sent_handler<S, L>(
    State(service): State<Arc<AssessmentService<S, L>>>,
    Path(category): Path<String>,
    Json(scope): Json<SendScope>,
) -> Response
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    match service.record_email(&scope, &category) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: ServiceError) -> Response {
    if err.is_unavailable() {
        let payload = json!({ "error": err.to_string() });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response();
    }

    match err {
        ServiceError::Scoring(ScoringError::Validation(error)) => {
            let payload = json!({
                "error": "validation failed",
                "details": error.problems,
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        ServiceError::Scoring(ScoringError::TimedOut { seconds }) => {
            let payload = json!({
                "error": "scoring timed out",
                "timeout_seconds": seconds,
            });
            (StatusCode::GATEWAY_TIMEOUT, Json(payload)).into_response()
        }
        ServiceError::History(
            error @ (HistoryError::InvalidLimit { .. } | HistoryError::Cursor(_)),
        ) => {
            let message = error.to_string();
            let payload = json!({
                "error": message,
                "details": [message],
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        ServiceError::RateLimit(RateLimitError::Limited {
            retry_after_seconds,
        }) => {
            let payload = json!({
                "error": "RATE_LIMIT",
                "retry_after_seconds": retry_after_seconds,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

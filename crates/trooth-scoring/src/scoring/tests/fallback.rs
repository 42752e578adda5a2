use std::sync::Arc;

use super::common::*;
use crate::llm::{CompletionRequest, ErrorKind, FallbackClient, LlmClient, LlmError};
use crate::scoring::ai::{BlobStatus, DEFAULT_CATEGORY_SCORE};
use crate::scoring::{AiScorer, RetryPolicy};

fn scorer_over(primary: Arc<ScriptedLlm>, secondary: Option<Arc<ScriptedLlm>>) -> AiScorer {
    let client = FallbackClient::new(
        primary,
        secondary.map(|client| client as Arc<dyn LlmClient>),
    );
    AiScorer::new(Arc::new(client), RetryPolicy::immediate(3))
}

fn healthy() -> Arc<ScriptedLlm> {
    Arc::new(ScriptedLlm::new(|call, _| match call {
        Call::Category(_) => reply(category_reply(8, "Backup advice.")),
        Call::Mentor => reply(mentor_blob_json().to_string()),
    }))
}

#[tokio::test]
async fn secondary_answers_when_primary_rejects() {
    let primary = Arc::new(ScriptedLlm::new(|_, _| {
        Err(LlmError::Permanent("HTTP 401: invalid key".into()))
    }));
    let secondary = healthy();
    let scorer = scorer_over(primary.clone(), Some(secondary.clone()));

    let report = scorer.score(&mixed_submission()).await;

    assert_eq!(report.category_scores.get("Bible"), Some(&8));
    assert_eq!(report.category_scores.get("Prayer"), Some(&8));
    assert_eq!(report.mentor_blob_v2.status, BlobStatus::Complete);
    assert_eq!(primary.total_calls(), 3);
    assert_eq!(secondary.total_calls(), 3);
}

#[tokio::test]
async fn healthy_primary_never_touches_secondary() {
    let primary = healthy();
    let secondary = healthy();
    let scorer = scorer_over(primary.clone(), Some(secondary.clone()));

    let report = scorer.score(&mixed_submission()).await;

    assert_eq!(report.mentor_blob_v2.status, BlobStatus::Complete);
    assert_eq!(primary.total_calls(), 3);
    assert_eq!(secondary.total_calls(), 0);
}

#[tokio::test]
async fn retryable_primary_failure_keeps_retrying_past_a_rejecting_secondary() {
    let primary = Arc::new(ScriptedLlm::new(|_, _| {
        Err(LlmError::Transient("HTTP 503: unavailable".into()))
    }));
    let secondary = Arc::new(ScriptedLlm::new(|_, _| {
        Err(LlmError::Permanent("HTTP 400: bad request".into()))
    }));
    let scorer = scorer_over(primary.clone(), Some(secondary.clone()));

    let report = scorer.score(&mixed_submission()).await;

    assert!(report
        .category_scores
        .values()
        .all(|score| *score == DEFAULT_CATEGORY_SCORE));
    assert_eq!(report.mentor_blob_v2.status, BlobStatus::Fallback);
    assert_eq!(primary.calls("Bible"), 3);
    assert_eq!(secondary.calls("Bible"), 3);
}

#[tokio::test]
async fn without_secondary_the_primary_error_is_returned() {
    let primary = Arc::new(ScriptedLlm::new(|_, _| {
        Err(LlmError::RateLimited("HTTP 429".into()))
    }));
    let client = FallbackClient::new(primary.clone(), None);
    assert!(!client.has_secondary());
    assert_eq!(client.model(), "scripted-model");

    let request = CompletionRequest::new(
        "system",
        serde_json::json!({ "category": "Bible" }).to_string(),
    );
    let err = client.complete(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(primary.calls("Bible"), 1);
}

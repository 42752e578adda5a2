//! AI-assisted category scoring and mentor report generation.
//!
//! Every external call is retried with backoff, its output recovered
//! leniently, and any failure degraded locally: a category falls back to a
//! default score, the mentor blob to its objective-only form. Nothing here
//! returns an error to the caller.

mod mentor_blob;
mod metrics;
mod mock;
pub mod prompt;
mod recover;
mod retry;

pub use mentor_blob::{
    knowledge_band, BiblicalKnowledge, BlobStatus, Flags, FourWeekPlan, Insight, MentorBlob,
    Resource, SchemaError, Snapshot, TopicBreakdown,
};
pub use metrics::{McMetrics, MissedItem, TopicTally, WEAK_TOPIC_PERCENT};
pub use recover::{recover_json, recover_object, strip_fences, RecoveryError, RecoveryStrategy};
pub use retry::{with_retry, RetryPolicy};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::scoring::domain::{coerce_number, value_text, Submission};
use prompt::QaItem;

pub const DEFAULT_CATEGORY_SCORE: u32 = 7;
pub const MIN_CATEGORY_SCORE: u32 = 1;
pub const MAX_CATEGORY_SCORE: u32 = 10;
const MENTOR_UNIT: &str = "mentor_blob";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question: String,
    pub answer: String,
    pub question_id: String,
    pub correct: Option<bool>,
    pub explanation: String,
}

/// Category scores, feedback and the mentor blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiReport {
    pub overall_score: u32,
    pub category_scores: BTreeMap<String, u32>,
    pub recommendations: BTreeMap<String, String>,
    pub question_feedback: Vec<QuestionFeedback>,
    pub summary_recommendation: String,
    pub mentor_blob_v2: MentorBlob,
}

/// Failure of one external unit of work before it is degraded locally.
#[derive(Debug, thiserror::Error)]
pub enum AiCallError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result of scoring one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub score: u32,
    pub recommendation: String,
    pub feedback: Vec<QuestionFeedback>,
    pub degraded: bool,
}

impl CategoryOutcome {
    pub fn fallback(category: &str) -> Self {
        Self {
            score: DEFAULT_CATEGORY_SCORE,
            recommendation: default_recommendation(category),
            feedback: Vec::new(),
            degraded: true,
        }
    }
}

fn default_recommendation(category: &str) -> String {
    format!(
        "Continue developing your {} practices.",
        category.to_lowercase()
    )
}

/// Scores submissions with an injected completion client, or offline
/// heuristics when none is configured.
#[derive(Clone)]
pub struct AiScorer {
    client: Option<Arc<dyn LlmClient>>,
    retry: RetryPolicy,
}

impl AiScorer {
    pub fn new(client: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self {
            client: Some(client),
            retry,
        }
    }

    pub fn offline() -> Self {
        Self {
            client: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_parts(client: Option<Arc<dyn LlmClient>>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn is_offline(&self) -> bool {
        self.client.is_none()
    }

    pub async fn score(&self, submission: &Submission) -> AiReport {
        let Some(client) = self.client.as_deref() else {
            info!("no completion client configured, using offline scoring");
            return mock::offline_report(submission);
        };

        let grouped = prompt::group_by_category(&submission.answers, &submission.questions);
        let input = prompt::mentor_input(submission);

        let categories = join_all(grouped.iter().map(|(category, items)| async move {
            let outcome = self.score_category(client, category, items).await;
            (category.clone(), outcome)
        }));
        let (outcomes, mentor_blob) =
            tokio::join!(categories, self.mentor_blob(client, &input));

        let mut category_scores = BTreeMap::new();
        let mut recommendations = BTreeMap::new();
        let mut question_feedback = Vec::new();
        for (category, outcome) in outcomes {
            category_scores.insert(category.clone(), outcome.score);
            recommendations.insert(category, outcome.recommendation);
            question_feedback.extend(outcome.feedback);
        }

        AiReport {
            overall_score: overall_score(&category_scores),
            summary_recommendation: summary_recommendation(&category_scores),
            category_scores,
            recommendations,
            question_feedback,
            mentor_blob_v2: mentor_blob,
        }
    }

    /// Scores a single category; failures degrade to the default outcome.
    pub async fn score_category(
        &self,
        client: &dyn LlmClient,
        category: &str,
        items: &[QaItem],
    ) -> CategoryOutcome {
        let request = prompt::category_request(category, items);
        match self.call_for_object(client, category, request).await {
            Ok(object) => interpret_category(category, &object, items),
            Err(err) => {
                warn!(category, error = %err, "category scoring degraded to default");
                CategoryOutcome::fallback(category)
            }
        }
    }

    /// Validated mentor blob, retrying once on schema failure, else the
    /// objective-only fallback.
    pub async fn mentor_blob(
        &self,
        client: &dyn LlmClient,
        input: &prompt::MentorInput,
    ) -> MentorBlob {
        for attempt in 1..=2 {
            match self.generate_blob(client, &input.payload).await {
                Ok(blob) => return blob,
                Err(AiCallError::Schema(err)) if attempt == 1 => {
                    warn!(error = %err, "mentor blob failed validation, requesting once more");
                }
                Err(err) => {
                    warn!(attempt, error = %err, "mentor blob replaced with fallback");
                    break;
                }
            }
        }
        MentorBlob::safe_minimal(&input.metrics)
    }

    async fn generate_blob(
        &self,
        client: &dyn LlmClient,
        payload: &Value,
    ) -> Result<MentorBlob, AiCallError> {
        let request = prompt::mentor_request(payload);
        let object = self.call_for_object(client, MENTOR_UNIT, request).await?;
        Ok(MentorBlob::validate(Value::Object(object))?)
    }

    async fn call_for_object(
        &self,
        client: &dyn LlmClient,
        unit: &str,
        request: CompletionRequest,
    ) -> Result<Map<String, Value>, AiCallError> {
        let started = Instant::now();
        let response =
            with_retry(&self.retry, unit, || client.complete(request.clone())).await?;
        info!(
            unit,
            model = client.model(),
            latency_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            total_tokens = response.usage.total_tokens(),
            "completion scored"
        );
        let (object, strategy) = recover_object(&response.content)?;
        if strategy != RecoveryStrategy::Direct {
            info!(unit, ?strategy, "recovered malformed model output");
        }
        Ok(object)
    }
}

fn interpret_category(
    category: &str,
    object: &Map<String, Value>,
    items: &[QaItem],
) -> CategoryOutcome {
    let score = object
        .get("score")
        .and_then(coerce_number)
        .map(|score| {
            score
                .round_ties_even()
                .clamp(f64::from(MIN_CATEGORY_SCORE), f64::from(MAX_CATEGORY_SCORE)) as u32
        })
        .unwrap_or(DEFAULT_CATEGORY_SCORE);

    let recommendation = object
        .get("recommendation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_recommendation(category));

    let feedback = object
        .get("question_feedback")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| feedback_entry(entry, items.get(index)))
                .collect()
        })
        .unwrap_or_default();

    CategoryOutcome {
        score,
        recommendation,
        feedback,
        degraded: false,
    }
}

/// Normalizes one feedback entry, filling gaps from the item at the same position.
fn feedback_entry(entry: &Value, item: Option<&QaItem>) -> Option<QuestionFeedback> {
    let entry = entry.as_object()?;
    let text = |key: &str| {
        entry
            .get(key)
            .map(value_text)
            .filter(|text| !text.is_empty())
    };

    Some(QuestionFeedback {
        question: text("question")
            .or_else(|| item.map(|item| item.question.clone()))
            .unwrap_or_default(),
        answer: text("answer")
            .or_else(|| item.map(|item| item.answer.clone()))
            .unwrap_or_default(),
        question_id: text("question_id")
            .or_else(|| item.map(|item| item.question_id.clone()))
            .unwrap_or_default(),
        correct: entry.get("correct").and_then(Value::as_bool),
        explanation: text("explanation").unwrap_or_default(),
    })
}

/// Mean of category scores with halves rounded to even, or the default when
/// nothing was scored.
pub fn overall_score(category_scores: &BTreeMap<String, u32>) -> u32 {
    if category_scores.is_empty() {
        return DEFAULT_CATEGORY_SCORE;
    }
    let total: u32 = category_scores.values().sum();
    (f64::from(total) / category_scores.len() as f64).round_ties_even() as u32
}

/// Names the strongest category and, when the spread exceeds two points,
/// the weakest.
pub fn summary_recommendation(category_scores: &BTreeMap<String, u32>) -> String {
    let mut ranked = category_scores.iter();
    let Some(first) = ranked.next() else {
        return "Continue your spiritual journey with consistency and dedication.".to_string();
    };

    let (mut strongest, mut weakest) = (first, first);
    for entry in ranked {
        if entry.1 > strongest.1 {
            strongest = entry;
        }
        if entry.1 < weakest.1 {
            weakest = entry;
        }
    }

    let mut summary = format!(
        "Your strongest area is {} (score: {}). ",
        strongest.0, strongest.1
    );
    if strongest.1 - weakest.1 > 2 {
        summary.push_str(&format!(
            "Consider focusing more attention on {} to create better balance in your spiritual growth. ",
            weakest.0
        ));
    }
    summary.push_str(
        "Continue practicing spiritual disciplines consistently and seek mentorship for areas of growth.",
    );
    summary
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::email::{EmailRateLimiter, RateLimitError, RateWindow, SendScope};
use crate::history::{HistoryError, HistoryPage, HistoryService};
use crate::repository::{AssessmentRecord, AssessmentStore, EmailEventLog, RepositoryError};
use crate::scoring::ai::prompt::HISTORY_CONTEXT_LIMIT;
use crate::scoring::{ScoreReport, ScoringError, ScoringOrchestrator, ScoringStrategy, Submission};

/// Scoring request body: the submission plus optional history ownership.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRequest {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl ScoreRequest {
    pub fn anonymous(submission: Submission) -> Self {
        Self {
            submission,
            ..Self::default()
        }
    }

    /// Template id, else the strategy tag.
    fn scope(&self, strategy: ScoringStrategy) -> String {
        self.scope
            .clone()
            .or_else(|| self.submission.context.template_id.clone())
            .unwrap_or_else(|| strategy.tag().to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredAssessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    pub strategy: String,
    pub report: ScoreReport,
}

static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_assessment_id() -> String {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("asm-{id:06}")
}

/// Composes the orchestrator with history and e-mail throttling.
pub struct AssessmentService<S, L> {
    orchestrator: Arc<ScoringOrchestrator>,
    history: HistoryService<S>,
    limiter: EmailRateLimiter<L>,
}

impl<S, L> AssessmentService<S, L>
where
    S: AssessmentStore + 'static,
    L: EmailEventLog + 'static,
{
    pub fn new(
        orchestrator: Arc<ScoringOrchestrator>,
        history: HistoryService<S>,
        limiter: EmailRateLimiter<L>,
    ) -> Self {
        Self {
            orchestrator,
            history,
            limiter,
        }
    }

    pub fn orchestrator(&self) -> &ScoringOrchestrator {
        &self.orchestrator
    }

    /// Scores a submission. Owned submissions get trend context for the AI
    /// strategies and are stored for history.
    pub async fn submit(
        &self,
        strategy: ScoringStrategy,
        request: ScoreRequest,
    ) -> Result<ScoredAssessment, ServiceError> {
        let scope = request.scope(strategy);
        let ScoreRequest {
            mut submission,
            owner_id,
            ..
        } = request;

        if let Some(owner_id) = owner_id.as_deref() {
            let wants_context = matches!(
                strategy,
                ScoringStrategy::AiCategory | ScoringStrategy::AiMaster
            );
            if wants_context && submission.previous_assessments.is_empty() {
                match self.history.recent(owner_id, &scope, HISTORY_CONTEXT_LIMIT) {
                    Ok(records) => {
                        submission.previous_assessments =
                            records.iter().map(AssessmentRecord::as_prior).collect();
                    }
                    Err(err) => {
                        warn!(owner_id, error = %err, "scoring without trend context");
                    }
                }
            }
        }

        let report = self.orchestrator.score(strategy, &submission).await?;

        let Some(owner_id) = owner_id else {
            return Ok(ScoredAssessment {
                assessment_id: None,
                strategy: strategy.tag().to_string(),
                report,
            });
        };

        let id = submission
            .context
            .assessment_id
            .clone()
            .unwrap_or_else(next_assessment_id);
        let record = AssessmentRecord {
            id,
            owner_id,
            scope,
            created_at: submission.context.submitted_at.unwrap_or_else(Utc::now),
            strategy: strategy.tag().to_string(),
            overall_score: report.overall_score(),
            category_scores: report.category_scores(),
        };
        let stored = self.history.store().insert(record)?;
        info!(assessment_id = %stored.id, owner_id = %stored.owner_id, "stored assessment");

        Ok(ScoredAssessment {
            assessment_id: Some(stored.id),
            strategy: strategy.tag().to_string(),
            report,
        })
    }

    pub fn history(
        &self,
        owner_id: &str,
        scope: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, ServiceError> {
        Ok(self.history.page(owner_id, scope, limit, cursor)?)
    }

    pub fn authorize_email(
        &self,
        scope: &SendScope,
        category: &str,
    ) -> Result<RateWindow, ServiceError> {
        Ok(self.limiter.check(scope, category, Utc::now())?)
    }

    pub fn record_email(&self, scope: &SendScope, category: &str) -> Result<(), ServiceError> {
        Ok(self.limiter.record(scope, category, Utc::now())?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    /// Whether the failure came from an unreachable collaborator.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ServiceError::Repository(RepositoryError::Unavailable(_))
                | ServiceError::History(HistoryError::Repository(
                    RepositoryError::Unavailable(_)
                ))
                | ServiceError::RateLimit(RateLimitError::Repository(
                    RepositoryError::Unavailable(_)
                ))
        )
    }
}

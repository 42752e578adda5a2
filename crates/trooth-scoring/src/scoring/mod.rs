//! Scoring strategies and the orchestrator that dispatches between them.

pub mod ai;
pub mod baseline;
pub mod domain;
pub mod gifts;
pub mod master;
pub mod rubric;

#[cfg(test)]
mod tests;

pub use ai::{AiReport, AiScorer, MentorBlob, RetryPolicy};
pub use baseline::{score_baseline, BaselineReport};
pub use domain::{
    AnswerSet, AssessmentContext, PriorAssessment, Question, QuestionOption, QuestionType,
    Submission,
};
pub use gifts::{CatalogError, GiftCatalog, GiftReport, GiftScorer, GiftValidationError};
pub use master::MasterReport;
pub use rubric::{score_rubric, RubricReport};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// Closed set of scoring strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoringStrategy {
    SpiritualGifts,
    Rubric,
    AiCategory,
    AiMaster,
    Baseline,
    Unscored,
}

impl ScoringStrategy {
    /// Maps legacy and current tags; unknown tags score with the rubric.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "spiritual_gifts" | "gifts" => Self::SpiritualGifts,
            "rubric" | "ai_generic" | "deterministic" => Self::Rubric,
            "ai_category" | "ai" => Self::AiCategory,
            "ai_master" | "master" => Self::AiMaster,
            "baseline" => Self::Baseline,
            "none" => Self::Unscored,
            other => {
                warn!(tag = other, "unknown scoring strategy, using rubric");
                Self::Rubric
            }
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::SpiritualGifts => "spiritual_gifts",
            Self::Rubric => "rubric",
            Self::AiCategory => "ai_category",
            Self::AiMaster => "ai_master",
            Self::Baseline => "baseline",
            Self::Unscored => "none",
        }
    }
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Report produced by any strategy, serialized in that strategy's own shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScoreReport {
    Gifts(GiftReport),
    Rubric(RubricReport),
    Ai(AiReport),
    Master(MasterReport),
    Baseline(BaselineReport),
}

impl ScoreReport {
    pub fn overall_score(&self) -> f64 {
        match self {
            ScoreReport::Gifts(report) => f64::from(report.top_score()),
            ScoreReport::Rubric(report) => report.overall_score,
            ScoreReport::Ai(report) => f64::from(report.overall_score),
            ScoreReport::Master(report) => f64::from(report.overall_score),
            ScoreReport::Baseline(report) => f64::from(report.overall_score),
        }
    }

    pub fn version_tag(&self) -> &str {
        match self {
            ScoreReport::Gifts(report) => &report.scoring_algorithm,
            ScoreReport::Rubric(report) => &report.scoring_version,
            ScoreReport::Ai(_) => "ai_category_v2",
            ScoreReport::Master(report) => &report.version,
            ScoreReport::Baseline(report) => &report.model,
        }
    }

    /// Per-category (or per-gift) scores, flattened for history records.
    pub fn category_scores(&self) -> BTreeMap<String, f64> {
        match self {
            ScoreReport::Gifts(report) => report
                .all_scores
                .iter()
                .map(|entry| (entry.gift.clone(), f64::from(entry.score)))
                .collect(),
            ScoreReport::Rubric(report) => report
                .categories
                .iter()
                .map(|category| (category.name.clone(), category.score))
                .collect(),
            ScoreReport::Ai(report) => widen(&report.category_scores),
            ScoreReport::Master(report) => widen(&report.category_scores),
            ScoreReport::Baseline(_) => BTreeMap::new(),
        }
    }
}

fn widen(scores: &BTreeMap<String, u32>) -> BTreeMap<String, f64> {
    scores
        .iter()
        .map(|(name, score)| (name.clone(), f64::from(*score)))
        .collect()
}

/// Shared contract: turn a submission into a complete report.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError>;
}

#[async_trait]
impl Scorer for GiftScorer {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError> {
        Ok(ScoreReport::Gifts(GiftScorer::score(self, &submission.answers)?))
    }
}

/// Rubric-weighted local scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricScorer;

#[async_trait]
impl Scorer for RubricScorer {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError> {
        Ok(ScoreReport::Rubric(score_rubric(
            &submission.answers,
            submission.rubric.as_ref(),
        )))
    }
}

/// Opt-out strategy producing an empty rubric-shaped report.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnscoredScorer;

#[async_trait]
impl Scorer for UnscoredScorer {
    async fn score(&self, _submission: &Submission) -> Result<ScoreReport, ScoringError> {
        Ok(ScoreReport::Rubric(RubricReport::unscored()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineScorer;

#[async_trait]
impl Scorer for BaselineScorer {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError> {
        Ok(ScoreReport::Baseline(score_baseline(submission)))
    }
}

#[async_trait]
impl Scorer for AiScorer {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError> {
        Ok(ScoreReport::Ai(AiScorer::score(self, submission).await))
    }
}

/// AI category scoring wrapped into the versioned master report.
#[derive(Clone)]
pub struct MasterScorer {
    inner: AiScorer,
}

impl MasterScorer {
    pub fn new(inner: AiScorer) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Scorer for MasterScorer {
    async fn score(&self, submission: &Submission) -> Result<ScoreReport, ScoringError> {
        let report = self.inner.score(submission).await;
        Ok(ScoreReport::Master(MasterReport::from(report)))
    }
}

/// Selects a strategy and enforces the overall deadline.
pub struct ScoringOrchestrator {
    gifts: GiftScorer,
    rubric: RubricScorer,
    ai: AiScorer,
    master: MasterScorer,
    baseline: BaselineScorer,
    unscored: UnscoredScorer,
    deadline: Duration,
}

impl ScoringOrchestrator {
    pub fn new(catalog: Arc<GiftCatalog>, ai: AiScorer, deadline: Duration) -> Self {
        Self {
            gifts: GiftScorer::new(catalog),
            rubric: RubricScorer,
            master: MasterScorer::new(ai.clone()),
            ai,
            baseline: BaselineScorer,
            unscored: UnscoredScorer,
            deadline,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.ai.is_offline()
    }

    pub fn gift_scorer(&self) -> &GiftScorer {
        &self.gifts
    }

    fn scorer(&self, strategy: ScoringStrategy) -> &dyn Scorer {
        match strategy {
            ScoringStrategy::SpiritualGifts => &self.gifts,
            ScoringStrategy::Rubric => &self.rubric,
            ScoringStrategy::AiCategory => &self.ai,
            ScoringStrategy::AiMaster => &self.master,
            ScoringStrategy::Baseline => &self.baseline,
            ScoringStrategy::Unscored => &self.unscored,
        }
    }

    /// Runs one strategy to completion. When the deadline passes, in-flight
    /// work is dropped and no partial report is returned.
    pub async fn score(
        &self,
        strategy: ScoringStrategy,
        submission: &Submission,
    ) -> Result<ScoreReport, ScoringError> {
        let scorer = self.scorer(strategy);
        match tokio::time::timeout(self.deadline, scorer.score(submission)).await {
            Ok(Ok(report)) => {
                info!(
                    %strategy,
                    version = report.version_tag(),
                    overall = report.overall_score(),
                    "submission scored"
                );
                Ok(report)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(%strategy, deadline_secs = self.deadline.as_secs(), "scoring timed out");
                Err(ScoringError::TimedOut {
                    seconds: self.deadline.as_secs(),
                })
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] GiftValidationError),
    #[error("scoring exceeded the {seconds}s deadline")]
    TimedOut { seconds: u64 },
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::Cursor;
use crate::scoring::PriorAssessment;

/// Stored assessment summary listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: String,
    pub owner_id: String,
    /// Template id or assessment category the record belongs to.
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub strategy: String,
    pub overall_score: f64,
    #[serde(default)]
    pub category_scores: BTreeMap<String, f64>,
}

impl AssessmentRecord {
    pub fn as_prior(&self) -> PriorAssessment {
        PriorAssessment {
            created_at: self.created_at,
            overall_score: Some(self.overall_score),
            category_scores: self.category_scores.clone(),
        }
    }

    /// Whether this record sorts strictly after `cursor` in
    /// `(created_at DESC, id DESC)` order.
    pub fn follows(&self, cursor: &Cursor) -> bool {
        self.created_at < cursor.created_at
            || (self.created_at == cursor.created_at && self.id < cursor.id)
    }
}

/// Storage abstraction for assessment history.
pub trait AssessmentStore: Send + Sync {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError>;

    /// Records for `(owner_id, scope)` ordered by `(created_at DESC, id DESC)`,
    /// strictly after `after` when given, at most `limit` rows.
    fn list(
        &self,
        owner_id: &str,
        scope: &str,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError>;
}

/// One report e-mail that was actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSendEvent {
    pub sender_id: String,
    pub category: String,
    pub purpose: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub assessment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of sent e-mails, owned by the persistence layer.
pub trait EmailEventLog: Send + Sync {
    /// Events for `(sender_id, category, purpose)` at or after `since`.
    fn count_since(
        &self,
        sender_id: &str,
        category: &str,
        purpose: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;

    fn record(&self, event: EmailSendEvent) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

//! Keyset pagination over stored assessment history.

mod cursor;

pub use cursor::{decode, encode, Cursor, CursorError};

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::repository::{AssessmentRecord, AssessmentStore, RepositoryError};

/// One page of history plus the token for the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub results: Vec<AssessmentRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub struct HistoryService<S> {
    store: Arc<S>,
    default_limit: usize,
    max_limit: usize,
}

impl<S> HistoryService<S>
where
    S: AssessmentStore,
{
    pub fn new(store: Arc<S>, default_limit: usize, max_limit: usize) -> Self {
        Self {
            store,
            default_limit,
            max_limit,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Newest-first page for `(owner_id, scope)` strictly after `cursor`.
    pub fn page(
        &self,
        owner_id: &str,
        scope: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, HistoryError> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 || limit > self.max_limit {
            return Err(HistoryError::InvalidLimit {
                max: self.max_limit,
            });
        }

        let after = cursor
            .filter(|token| !token.trim().is_empty())
            .map(decode)
            .transpose()?;

        let mut results = self.store.list(owner_id, scope, after.as_ref(), limit + 1)?;
        let has_more = results.len() > limit;
        results.truncate(limit);

        let next_cursor = if has_more {
            results
                .last()
                .map(|record| encode(record.created_at, &record.id))
        } else {
            None
        };

        debug!(
            owner_id,
            scope,
            limit,
            returned = results.len(),
            has_more,
            "served history page"
        );

        Ok(HistoryPage {
            results,
            next_cursor,
            has_more,
        })
    }

    /// Most recent records, newest first, used as trend context for scoring.
    pub fn recent(
        &self,
        owner_id: &str,
        scope: &str,
        count: usize,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        self.store.list(owner_id, scope, None, count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("limit must be between 1 and {max}")]
    InvalidLimit { max: usize },
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use tracing::info;
use trooth_scoring::config::{EmailConfig, HistoryConfig, LlmConfig, ScoringConfig};
use trooth_scoring::email::EmailRateLimiter;
use trooth_scoring::error::AppError;
use trooth_scoring::history::{Cursor, HistoryService};
use trooth_scoring::llm::client_from_config;
use trooth_scoring::repository::{
    AssessmentRecord, AssessmentStore, EmailEventLog, EmailSendEvent, RepositoryError,
};
use trooth_scoring::scoring::{AiScorer, GiftCatalog, ScoringOrchestrator};
use trooth_scoring::AssessmentService;

pub(crate) type ApiService = AssessmentService<InMemoryAssessmentStore, InMemoryEmailEventLog>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentStore {
    records: Arc<Mutex<Vec<AssessmentRecord>>>,
}

impl AssessmentStore for InMemoryAssessmentStore {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn list(
        &self,
        owner_id: &str,
        scope: &str,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut rows: Vec<AssessmentRecord> = guard
            .iter()
            .filter(|record| record.owner_id == owner_id && record.scope == scope)
            .filter(|record| after.map_or(true, |cursor| record.follows(cursor)))
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEmailEventLog {
    events: Arc<Mutex<Vec<EmailSendEvent>>>,
}

impl EmailEventLog for InMemoryEmailEventLog {
    fn count_since(
        &self,
        sender_id: &str,
        category: &str,
        purpose: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let guard = lock(&self.events)?;
        Ok(guard
            .iter()
            .filter(|event| {
                event.sender_id == sender_id
                    && event.category == category
                    && event.purpose == purpose
                    && event.created_at >= since
            })
            .count())
    }

    fn record(&self, event: EmailSendEvent) -> Result<(), RepositoryError> {
        lock(&self.events)?.push(event);
        Ok(())
    }
}

/// Gift catalog plus an AI scorer that uses the configured provider when a
/// real key is present.
pub(crate) fn orchestrator(
    llm: &LlmConfig,
    scoring: &ScoringConfig,
    force_offline: bool,
) -> Result<Arc<ScoringOrchestrator>, AppError> {
    let catalog = Arc::new(GiftCatalog::standard()?);

    let client = if force_offline {
        None
    } else {
        client_from_config(llm)?
    };
    let ai = match client {
        Some(client) => {
            info!(
                model = %llm.model,
                fallback = llm.fallback().is_some(),
                "AI scoring uses the configured provider"
            );
            AiScorer::new(client, llm.retry_policy())
        }
        None => {
            info!("no provider key configured, AI scoring runs offline");
            AiScorer::offline()
        }
    };

    Ok(Arc::new(ScoringOrchestrator::new(
        catalog,
        ai,
        scoring.deadline(),
    )))
}

pub(crate) fn assessment_service(
    orchestrator: Arc<ScoringOrchestrator>,
    history: &HistoryConfig,
    email: &EmailConfig,
) -> ApiService {
    AssessmentService::new(
        orchestrator,
        HistoryService::new(
            Arc::new(InMemoryAssessmentStore::default()),
            history.default_limit,
            history.max_limit,
        ),
        EmailRateLimiter::new(
            Arc::new(InMemoryEmailEventLog::default()),
            email.max_per_hour,
            Duration::from_secs(email.window_seconds),
        ),
    )
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn record(id: &str, second: u32) -> AssessmentRecord {
        AssessmentRecord {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            scope: "scope".to_string(),
            created_at: Utc
                .with_ymd_and_hms(2025, 2, 1, 8, 0, second)
                .single()
                .expect("valid timestamp"),
            strategy: "rubric".to_string(),
            overall_score: 3.0,
            category_scores: BTreeMap::new(),
        }
    }

    #[test]
    fn store_rejects_duplicate_ids() {
        let store = InMemoryAssessmentStore::default();
        store.insert(record("a", 0)).expect("first insert");
        assert!(matches!(
            store.insert(record("a", 1)),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn store_lists_newest_first_after_cursor() {
        let store = InMemoryAssessmentStore::default();
        for (id, second) in [("a", 0), ("b", 1), ("c", 2)] {
            store.insert(record(id, second)).expect("insert");
        }
        let cursor = Cursor::new(record("c", 2).created_at, "c");

        let rows = store
            .list("owner", "scope", Some(&cursor), 10)
            .expect("list succeeds");
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn offline_orchestrator_without_key() {
        let llm = LlmConfig {
            api_key: Some("your_api_key_here".to_string()),
            ..LlmConfig::default()
        };
        let orchestrator =
            orchestrator(&llm, &ScoringConfig::default(), false).expect("orchestrator builds");
        assert!(orchestrator.is_offline());
    }

    #[test]
    fn fallback_key_alone_does_not_enable_the_provider() {
        let llm = LlmConfig {
            api_key: None,
            fallback_api_key: Some("sk-secondary".to_string()),
            ..LlmConfig::default()
        };
        let orchestrator =
            orchestrator(&llm, &ScoringConfig::default(), false).expect("orchestrator builds");
        assert!(orchestrator.is_offline());
    }

    #[test]
    fn primary_with_fallback_scores_online() {
        let llm = LlmConfig {
            api_key: Some("sk-primary".to_string()),
            fallback_api_key: Some("sk-secondary".to_string()),
            ..LlmConfig::default()
        };
        let orchestrator =
            orchestrator(&llm, &ScoringConfig::default(), false).expect("orchestrator builds");
        assert!(!orchestrator.is_offline());
    }
}

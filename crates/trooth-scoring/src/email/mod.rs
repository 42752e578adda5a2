//! Per-sender report e-mail throttling over a sliding window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::repository::{EmailEventLog, EmailSendEvent, RepositoryError};

pub const DEFAULT_PURPOSE: &str = "report";

/// Derived view of recent sends for one `(sender, category, purpose)` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateWindow {
    pub sender_id: String,
    pub category: String,
    pub purpose: String,
    pub window_start: DateTime<Utc>,
    pub count: usize,
}

/// Who is sending what; `purpose` falls back to [`DEFAULT_PURPOSE`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendScope {
    pub sender_id: String,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub assessment_id: Option<String>,
}

impl SendScope {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            purpose: None,
            target_id: None,
            assessment_id: None,
        }
    }

    pub fn purpose(&self) -> &str {
        self.purpose
            .as_deref()
            .filter(|purpose| !purpose.trim().is_empty())
            .unwrap_or(DEFAULT_PURPOSE)
    }
}

pub struct EmailRateLimiter<L> {
    log: Arc<L>,
    cap: usize,
    window: Duration,
}

impl<L> EmailRateLimiter<L>
where
    L: EmailEventLog,
{
    pub fn new(log: Arc<L>, cap: usize, window: Duration) -> Self {
        Self { log, cap, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts qualifying events in `[now - window, now]`.
    pub fn window_at(
        &self,
        scope: &SendScope,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, RateLimitError> {
        let span = chrono::Duration::from_std(self.window)
            .map_err(|_| RateLimitError::InvalidWindow)?;
        let window_start = now
            .checked_sub_signed(span)
            .ok_or(RateLimitError::InvalidWindow)?;
        let count =
            self.log
                .count_since(&scope.sender_id, category, scope.purpose(), window_start)?;
        Ok(RateWindow {
            sender_id: scope.sender_id.clone(),
            category: category.to_string(),
            purpose: scope.purpose().to_string(),
            window_start,
            count,
        })
    }

    /// Fails once `cap` sends already fall inside the window.
    pub fn check(
        &self,
        scope: &SendScope,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<RateWindow, RateLimitError> {
        let window = self.window_at(scope, category, now)?;
        if window.count >= self.cap {
            warn!(
                sender_id = %window.sender_id,
                category,
                purpose = %window.purpose,
                count = window.count,
                cap = self.cap,
                "email rate limit reached"
            );
            return Err(RateLimitError::Limited {
                retry_after_seconds: self.window.as_secs(),
            });
        }
        Ok(window)
    }

    /// Appends a send event after the e-mail went out.
    pub fn record(
        &self,
        scope: &SendScope,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        self.log.record(EmailSendEvent {
            sender_id: scope.sender_id.clone(),
            category: category.to_string(),
            purpose: scope.purpose().to_string(),
            target_id: scope.target_id.clone(),
            assessment_id: scope.assessment_id.clone(),
            created_at: now,
        })?;
        info!(
            sender_id = %scope.sender_id,
            category,
            purpose = scope.purpose(),
            "recorded email send"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("RATE_LIMIT: retry after {retry_after_seconds}s")]
    Limited { retry_after_seconds: u64 },
    #[error("rate window is out of range")]
    InvalidWindow,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecLog {
        events: Mutex<Vec<EmailSendEvent>>,
    }

    impl EmailEventLog for VecLog {
        fn count_since(
            &self,
            sender_id: &str,
            category: &str,
            purpose: &str,
            since: DateTime<Utc>,
        ) -> Result<usize, RepositoryError> {
            let guard = self.events.lock().expect("log lock");
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
            self.events.lock().expect("log lock").push(event);
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn limiter(cap: usize) -> EmailRateLimiter<VecLog> {
        EmailRateLimiter::new(Arc::new(VecLog::default()), cap, Duration::from_secs(3600))
    }

    #[test]
    fn blocks_after_cap_events_inside_window() {
        let limiter = limiter(3);
        let scope = SendScope::new("mentor-1");

        for minute in 0..3 {
            limiter
                .check(&scope, "bible", now())
                .expect("under the cap");
            limiter
                .record(&scope, "bible", now() - chrono::Duration::minutes(minute))
                .expect("recorded");
        }

        match limiter.check(&scope, "bible", now()) {
            Err(RateLimitError::Limited {
                retry_after_seconds,
            }) => assert_eq!(retry_after_seconds, 3600),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn oversized_window_is_rejected() {
        let limiter = EmailRateLimiter::new(
            Arc::new(VecLog::default()),
            5,
            Duration::from_secs(10_000_000_000_000),
        );
        let scope = SendScope::new("mentor-1");

        assert!(matches!(
            limiter.check(&scope, "bible", now()),
            Err(RateLimitError::InvalidWindow)
        ));
    }

    #[test]
    fn events_older_than_window_do_not_count() {
        let limiter = limiter(1);
        let scope = SendScope::new("mentor-1");
        limiter
            .record(&scope, "bible", now() - chrono::Duration::seconds(3601))
            .expect("recorded");

        let window = limiter.check(&scope, "bible", now()).expect("old event ignored");
        assert_eq!(window.count, 0);
    }

    #[test]
    fn scopes_by_category_and_purpose() {
        let limiter = limiter(1);
        let scope = SendScope::new("mentor-1");
        limiter.record(&scope, "bible", now()).expect("recorded");

        assert!(limiter.check(&scope, "prayer", now()).is_ok());

        let mut invite = SendScope::new("mentor-1");
        invite.purpose = Some("invite".to_string());
        assert!(limiter.check(&invite, "bible", now()).is_ok());
        assert!(limiter.check(&scope, "bible", now()).is_err());
    }

    #[test]
    fn purpose_defaults_to_report() {
        let mut scope = SendScope::new("mentor-1");
        assert_eq!(scope.purpose(), "report");
        scope.purpose = Some("  ".to_string());
        assert_eq!(scope.purpose(), DEFAULT_PURPOSE);
    }
}

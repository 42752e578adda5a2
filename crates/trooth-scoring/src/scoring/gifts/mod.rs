mod catalog;

pub use catalog::{
    display_name, CatalogError, Gift, GiftCatalog, GiftItem, EXPECTED_GIFTS, EXPECTED_ITEMS,
    GIFT_MAP, ITEMS_PER_GIFT, QUESTION_ITEMS,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::AnswerSet;

pub const GIFT_REPORT_VERSION: u32 = 1;
pub const GIFT_SCORING_ALGORITHM: &str = "simple_sum_v1";
pub const MAX_RATING: i64 = 4;

/// Sum-and-rank scorer over a validated gift catalog.
#[derive(Debug, Clone)]
pub struct GiftScorer {
    catalog: Arc<GiftCatalog>,
}

impl GiftScorer {
    pub fn new(catalog: Arc<GiftCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &GiftCatalog {
        &self.catalog
    }

    /// Collects every problem with the answer set in a single pass.
    pub fn validate(&self, answers: &AnswerSet) -> Vec<String> {
        let mut problems = Vec::new();

        let missing: Vec<&str> = self
            .catalog
            .codes()
            .filter(|code| !answers.contains(code))
            .collect();
        if !missing.is_empty() {
            problems.push(format!("Missing items: {}", missing.join(", ")));
        }

        let unexpected: Vec<&str> = answers
            .codes()
            .filter(|code| !self.catalog.contains(code))
            .collect();
        if !unexpected.is_empty() {
            problems.push(format!("Unexpected items: {}", unexpected.join(", ")));
        }

        let out_of_range: Vec<&str> = answers
            .iter()
            .filter(|(code, _)| self.catalog.contains(code))
            .filter(|(_, value)| rating(value).is_none())
            .map(|(code, _)| code)
            .collect();
        if !out_of_range.is_empty() {
            problems.push(format!(
                "Out-of-range (0-{MAX_RATING}) values: {}",
                out_of_range.join(", ")
            ));
        }

        problems
    }

    /// Validates then ranks; never returns a partial report.
    pub fn score(&self, answers: &AnswerSet) -> Result<GiftReport, GiftValidationError> {
        let problems = self.validate(answers);
        if !problems.is_empty() {
            return Err(GiftValidationError { problems });
        }
        Ok(self.rank(answers))
    }

    /// Ranks gifts by `(-score, display name ascending)`.
    ///
    /// Assumes a validated answer set; unanswered codes count as zero.
    pub fn rank(&self, answers: &AnswerSet) -> GiftReport {
        let mut all_scores: Vec<GiftScore> = self
            .catalog
            .gifts()
            .iter()
            .map(|gift| GiftScore {
                gift: gift.display_name.clone(),
                score: gift
                    .codes
                    .iter()
                    .filter_map(|code| answers.get(code).and_then(rating))
                    .sum(),
            })
            .collect();

        all_scores.sort_by(|left, right| {
            right
                .score
                .cmp(&left.score)
                .then_with(|| left.gift.to_lowercase().cmp(&right.gift.to_lowercase()))
        });

        let top_gifts_truncated: Vec<GiftScore> = all_scores.iter().take(3).cloned().collect();
        let third_place_score = all_scores
            .get(2)
            .or_else(|| all_scores.last())
            .map(|entry| entry.score);
        let top_gifts_expanded = match third_place_score {
            Some(boundary) => all_scores
                .iter()
                .filter(|entry| entry.score >= boundary)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        debug!(
            gifts = all_scores.len(),
            expanded = top_gifts_expanded.len(),
            ?third_place_score,
            "ranked gift inventory"
        );

        GiftReport {
            version: GIFT_REPORT_VERSION,
            scoring_algorithm: GIFT_SCORING_ALGORITHM.to_string(),
            all_scores,
            top_gifts_truncated,
            top_gifts_expanded,
            rank_meta: RankMeta { third_place_score },
        }
    }
}

fn rating(value: &serde_json::Value) -> Option<u32> {
    value
        .as_i64()
        .filter(|rating| (0..=MAX_RATING).contains(rating))
        .map(|rating| rating as u32)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftScore {
    pub gift: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMeta {
    pub third_place_score: Option<u32>,
}

/// Full ranking plus the truncated and tie-expanded top lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftReport {
    pub version: u32,
    pub scoring_algorithm: String,
    pub all_scores: Vec<GiftScore>,
    pub top_gifts_truncated: Vec<GiftScore>,
    pub top_gifts_expanded: Vec<GiftScore>,
    pub rank_meta: RankMeta,
}

impl GiftReport {
    pub fn top_score(&self) -> u32 {
        self.all_scores.first().map(|entry| entry.score).unwrap_or(0)
    }
}

/// Every problem found in a non-conforming gift answer set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .problems.join("; "))]
pub struct GiftValidationError {
    pub problems: Vec<String>,
}

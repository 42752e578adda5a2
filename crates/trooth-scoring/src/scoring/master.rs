use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ai::{AiReport, MentorBlob};

pub const MASTER_VERSION: &str = "master_v1";
const DEFAULT_SUMMARY: &str = "Keep pursuing growth across key disciplines.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCategory {
    pub category: String,
    pub score: u32,
}

/// Versioned wrapper over the AI category report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterReport {
    pub version: String,
    pub overall_score: u32,
    pub category_scores: BTreeMap<String, u32>,
    pub summary_recommendation: String,
    pub top3: Vec<RankedCategory>,
    pub mentor_blob_v2: MentorBlob,
}

impl From<AiReport> for MasterReport {
    fn from(report: AiReport) -> Self {
        let mut ranked: Vec<RankedCategory> = report
            .category_scores
            .iter()
            .map(|(category, score)| RankedCategory {
                category: category.clone(),
                score: *score,
            })
            .collect();
        ranked.sort_by(|left, right| {
            right.score.cmp(&left.score).then_with(|| {
                left.category
                    .to_lowercase()
                    .cmp(&right.category.to_lowercase())
            })
        });
        ranked.truncate(3);

        let summary_recommendation = if report.summary_recommendation.trim().is_empty() {
            DEFAULT_SUMMARY.to_string()
        } else {
            report.summary_recommendation
        };

        Self {
            version: MASTER_VERSION.to_string(),
            overall_score: report.overall_score,
            category_scores: report.category_scores,
            summary_recommendation,
            top3: ranked,
            mentor_blob_v2: report.mentor_blob_v2,
        }
    }
}

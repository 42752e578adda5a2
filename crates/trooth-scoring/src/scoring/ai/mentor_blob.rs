use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::metrics::McMetrics;

/// Where a blob came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobStatus {
    #[default]
    Complete,
    Fallback,
    Baseline,
}

/// Structured mentor report. Either fully validated model output or a
/// locally computed fallback, never a mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorBlob {
    pub snapshot: Snapshot,
    pub biblical_knowledge: BiblicalKnowledge,
    pub open_ended_insights: Vec<Insight>,
    pub flags: Flags,
    pub four_week_plan: FourWeekPlan,
    pub conversation_starters: Vec<String>,
    pub recommended_resources: Vec<Resource>,
    #[serde(default)]
    pub status: BlobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub overall_mc_percent: f64,
    pub knowledge_band: String,
    #[serde(default)]
    pub top_strengths: Vec<String>,
    #[serde(default)]
    pub top_gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiblicalKnowledge {
    pub summary: String,
    pub topic_breakdown: Vec<TopicBreakdown>,
    pub study_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBreakdown {
    pub topic: String,
    #[serde(deserialize_with = "whole_count")]
    pub correct: u32,
    #[serde(deserialize_with = "whole_count")]
    pub total: u32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Accepts `3` as well as `3.0`; rejects fractions and negatives.
fn whole_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) {
        Ok(value as u32)
    } else {
        Err(serde::de::Error::custom(format!(
            "expected a whole non-negative count, found {value}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub category: String,
    pub level: String,
    pub evidence: String,
    pub discernment: String,
    pub scripture_anchor: String,
    pub mentor_moves: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub red: Vec<String>,
    pub yellow: Vec<String>,
    pub green: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourWeekPlan {
    pub rhythm: Vec<String>,
    pub checkpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub why: String,
    #[serde(rename = "type", default = "default_resource_type")]
    pub kind: String,
}

fn default_resource_type() -> String {
    "book".to_string()
}

/// Model output that does not match the mentor blob contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mentor blob failed schema validation: {0}")]
pub struct SchemaError(pub String);

/// Five-tier band for multiple-choice knowledge.
pub fn knowledge_band(percent: f64) -> &'static str {
    match percent {
        p if p >= 90.0 => "Excellent",
        p if p >= 80.0 => "Good",
        p if p >= 70.0 => "Average",
        p if p >= 60.0 => "Needs Improvement",
        _ => "Significant Study",
    }
}

impl MentorBlob {
    /// Checks a parsed model response against the contract.
    pub fn validate(value: Value) -> Result<Self, SchemaError> {
        if !value.is_object() {
            return Err(SchemaError("expected a JSON object".to_string()));
        }
        let mut blob: MentorBlob =
            serde_json::from_value(value).map_err(|err| SchemaError(err.to_string()))?;
        blob.status = BlobStatus::Complete;
        Ok(blob)
    }

    /// Objective-only blob: multiple-choice results, no narrative.
    pub fn safe_minimal(metrics: &McMetrics) -> Self {
        let weak_topics = metrics.weak_topics();
        let summary = if metrics.total_questions == 0 {
            "No multiple-choice questions were answered.".to_string()
        } else {
            format!(
                "{} of {} multiple-choice questions correct ({}%).",
                metrics.correct_count, metrics.total_questions, metrics.percent_correct
            )
        };

        Self {
            snapshot: Snapshot {
                overall_mc_percent: metrics.percent_correct,
                knowledge_band: knowledge_band(metrics.percent_correct).to_string(),
                top_strengths: Vec::new(),
                top_gaps: weak_topics.clone(),
            },
            biblical_knowledge: BiblicalKnowledge {
                summary,
                topic_breakdown: metrics
                    .by_topic
                    .iter()
                    .map(|tally| TopicBreakdown {
                        topic: tally.topic.clone(),
                        correct: tally.correct,
                        total: tally.total,
                        note: None,
                    })
                    .collect(),
                study_targets: weak_topics,
            },
            open_ended_insights: Vec::new(),
            flags: Flags::default(),
            four_week_plan: FourWeekPlan::default(),
            conversation_starters: Vec::new(),
            recommended_resources: Vec::new(),
            status: BlobStatus::Fallback,
        }
    }
}

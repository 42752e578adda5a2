use serde::{Deserialize, Serialize};
use tracing::info;

use super::ai::{
    BiblicalKnowledge, BlobStatus, Flags, FourWeekPlan, Insight, MentorBlob, Snapshot,
    TopicBreakdown,
};
use super::domain::Submission;

pub const BASELINE_MODEL: &str = "baseline_heuristic_v1";
pub const BASELINE_STATUS: &str = "baseline";
pub const LOW_KNOWLEDGE_PERCENT: u32 = 50;

/// Three-tier band used before the AI report is available.
pub fn baseline_band(percent: u32) -> &'static str {
    if percent >= 80 {
        "Strong"
    } else if percent >= LOW_KNOWLEDGE_PERCENT {
        "Developing"
    } else {
        "Foundational"
    }
}

/// Instant local estimate, later replaced by the enriched AI report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    pub overall_score: u32,
    pub knowledge_band: String,
    pub summary_recommendation: String,
    pub mentor_blob_v2: MentorBlob,
    pub status: String,
    pub model: String,
}

/// Percent-correct over the supplied multiple-choice questions (unanswered
/// counts as incorrect) plus a count of answered open-ended prompts.
pub fn score_baseline(submission: &Submission) -> BaselineReport {
    let mut correct = 0u32;
    let mut total = 0u32;
    let mut breakdown: Vec<TopicBreakdown> = Vec::new();
    let mut open_answered = 0u32;
    let mut open_total = 0u32;

    for question in &submission.questions {
        let answer = submission.answers.text(&question.id);
        if !question.is_multiple_choice() {
            open_total += 1;
            if !answer.trim().is_empty() {
                open_answered += 1;
            }
            continue;
        }

        let is_correct = question
            .chosen_option(&answer)
            .map(|option| option.is_correct)
            .unwrap_or(false);
        total += 1;
        correct += u32::from(is_correct);

        let topic = question.topic();
        match breakdown.iter_mut().find(|entry| entry.topic == topic) {
            Some(entry) => {
                entry.total += 1;
                entry.correct += u32::from(is_correct);
            }
            None => breakdown.push(TopicBreakdown {
                topic: topic.to_string(),
                correct: u32::from(is_correct),
                total: 1,
                note: None,
            }),
        }
    }

    let percent = if total == 0 { 0 } else { correct * 100 / total };
    let band = baseline_band(percent);
    info!(
        mc_total = total,
        mc_correct = correct,
        open_answered,
        open_total,
        "generated baseline score"
    );

    let yellow = if percent < LOW_KNOWLEDGE_PERCENT {
        vec!["Low biblical knowledge score".to_string()]
    } else {
        Vec::new()
    };

    let mentor_blob_v2 = MentorBlob {
        snapshot: Snapshot {
            overall_mc_percent: f64::from(percent),
            knowledge_band: band.to_string(),
            top_strengths: vec![
                "Completed assessment".to_string(),
                "Engaged with questions".to_string(),
            ],
            top_gaps: vec!["Awaiting detailed AI analysis".to_string()],
        },
        biblical_knowledge: BiblicalKnowledge {
            summary: format!("{correct} of {total} multiple-choice questions correct."),
            topic_breakdown: breakdown,
            study_targets: Vec::new(),
        },
        open_ended_insights: vec![Insight {
            category: "Assessment".to_string(),
            level: "Baseline".to_string(),
            evidence: format!(
                "Answered {open_answered}/{open_total} open-ended questions. Full analysis pending."
            ),
            discernment: "AI analysis in progress.".to_string(),
            scripture_anchor: String::new(),
            mentor_moves: Vec::new(),
        }],
        flags: Flags {
            red: Vec::new(),
            yellow,
            green: vec!["Completed full assessment".to_string()],
        },
        four_week_plan: FourWeekPlan::default(),
        conversation_starters: vec![
            "What motivated you to complete this assessment?".to_string(),
            "Which questions were most challenging for you?".to_string(),
        ],
        recommended_resources: Vec::new(),
        status: BlobStatus::Baseline,
    };

    BaselineReport {
        overall_score: percent,
        knowledge_band: band.to_string(),
        summary_recommendation: format!(
            "Baseline assessment complete. Scored {percent}% on biblical knowledge. Full AI analysis in progress."
        ),
        mentor_blob_v2,
        status: BASELINE_STATUS.to_string(),
        model: BASELINE_MODEL.to_string(),
    }
}

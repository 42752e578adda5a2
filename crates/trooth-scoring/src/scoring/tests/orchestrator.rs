use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::common::*;
use crate::scoring::domain::{AnswerSet, Submission};
use crate::scoring::{
    AiScorer, ScoreReport, ScoringError, ScoringOrchestrator, ScoringStrategy,
};

fn orchestrator(ai: AiScorer) -> ScoringOrchestrator {
    ScoringOrchestrator::new(catalog(), ai, Duration::from_secs(5))
}

#[test]
fn legacy_tags_map_onto_strategies() {
    let cases = [
        ("spiritual_gifts", ScoringStrategy::SpiritualGifts),
        ("ai_generic", ScoringStrategy::Rubric),
        ("deterministic", ScoringStrategy::Rubric),
        ("ai_category", ScoringStrategy::AiCategory),
        ("ai_master", ScoringStrategy::AiMaster),
        ("baseline", ScoringStrategy::Baseline),
        (" NONE ", ScoringStrategy::Unscored),
        ("mystery", ScoringStrategy::Rubric),
    ];
    for (tag, expected) in cases {
        assert_eq!(ScoringStrategy::from_tag(tag), expected, "tag {tag}");
    }
    assert_eq!(ScoringStrategy::AiMaster.to_string(), "ai_master");
}

#[tokio::test]
async fn gift_validation_errors_surface_from_orchestrator() {
    let orchestrator = orchestrator(AiScorer::offline());
    let submission = Submission::from_answers(AnswerSet::new().with("Q01", 4));

    match orchestrator
        .score(ScoringStrategy::SpiritualGifts, &submission)
        .await
    {
        Err(ScoringError::Validation(err)) => {
            assert_eq!(err.problems.len(), 1);
            assert!(err.problems[0].starts_with("Missing items: Q02, Q03"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn rubric_and_unscored_reports_share_a_shape() {
    let orchestrator = orchestrator(AiScorer::offline());
    let submission = Submission::from_answers(AnswerSet::new().with("a", 4).with("b", 6));

    let rubric = orchestrator
        .score(ScoringStrategy::from_tag("deterministic"), &submission)
        .await
        .expect("rubric scores");
    let unscored = orchestrator
        .score(ScoringStrategy::Unscored, &submission)
        .await
        .expect("none scores");

    assert_eq!(
        serde_json::to_value(&rubric).expect("serializes"),
        json!({
            "overall_score": 5.0,
            "categories": [{"name": "General", "score": 5.0}],
            "scoring_version": "generic_v1",
            "model": "none"
        })
    );
    assert_eq!(unscored.version_tag(), "none_v1");
    assert_eq!(unscored.overall_score(), 0.0);
}

#[tokio::test]
async fn master_report_ranks_top_three() {
    let client = Arc::new(ScriptedLlm::new(|call, _| match call {
        Call::Category("Bible") => reply(category_reply(6, "Read daily.")),
        Call::Category(_) => reply(category_reply(8, "Keep praying.")),
        Call::Mentor => reply(mentor_blob_json().to_string()),
    }));
    let orchestrator = orchestrator(ai_scorer(client));

    let report = orchestrator
        .score(ScoringStrategy::AiMaster, &mixed_submission())
        .await
        .expect("master scores");

    let master = match report {
        ScoreReport::Master(master) => master,
        other => panic!("expected master report, got {other:?}"),
    };
    assert_eq!(master.version, "master_v1");
    let ranked: Vec<(&str, u32)> = master
        .top3
        .iter()
        .map(|entry| (entry.category.as_str(), entry.score))
        .collect();
    assert_eq!(ranked, vec![("Prayer", 8), ("Bible", 6)]);
    assert_eq!(master.overall_score, 7);
}

#[tokio::test]
async fn ai_report_keeps_its_own_contract() {
    let orchestrator = orchestrator(AiScorer::offline());

    let report = orchestrator
        .score(ScoringStrategy::AiCategory, &mixed_submission())
        .await
        .expect("offline ai scores");
    let json = serde_json::to_value(&report).expect("serializes");

    assert!(json["category_scores"].is_object());
    assert!(json["mentor_blob_v2"]["snapshot"].is_object());
    assert_eq!(json["mentor_blob_v2"]["status"], "fallback");
    assert_eq!(report.category_scores().len(), 2);
}

#[tokio::test]
async fn deadline_cancels_slow_scoring() {
    let client = Arc::new(
        ScriptedLlm::new(|_, _| reply(category_reply(9, "Too late.")))
            .slow(Duration::from_secs(30)),
    );
    let orchestrator =
        ScoringOrchestrator::new(catalog(), ai_scorer(client), Duration::from_millis(50));

    match orchestrator
        .score(ScoringStrategy::AiCategory, &mixed_submission())
        .await
    {
        Err(ScoringError::TimedOut { .. }) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn baseline_runs_without_a_client() {
    let orchestrator = orchestrator(AiScorer::offline());
    assert!(orchestrator.is_offline());

    let report = orchestrator
        .score(ScoringStrategy::Baseline, &mixed_submission())
        .await
        .expect("baseline scores");

    assert_eq!(report.version_tag(), "baseline_heuristic_v1");
    assert_eq!(report.overall_score(), 50.0);
}

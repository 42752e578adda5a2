use super::common::*;
use crate::scoring::ai::BlobStatus;
use crate::scoring::baseline::{baseline_band, score_baseline, BASELINE_MODEL};

#[test]
fn half_correct_is_developing() {
    let report = score_baseline(&mixed_submission());

    assert_eq!(report.overall_score, 50);
    assert_eq!(report.knowledge_band, "Developing");
    assert_eq!(report.status, "baseline");
    assert_eq!(report.model, BASELINE_MODEL);
    assert!(report.mentor_blob_v2.flags.yellow.is_empty());
    assert_eq!(
        report.mentor_blob_v2.open_ended_insights[0].evidence,
        "Answered 2/2 open-ended questions. Full analysis pending."
    );
}

#[test]
fn unanswered_multiple_choice_counts_against_the_score() {
    let mut submission = mixed_submission();
    submission
        .questions
        .push(mc_question("mc3", "Bible", "Law", "Ten"));

    let report = score_baseline(&submission);

    assert_eq!(report.overall_score, 33);
    assert_eq!(report.knowledge_band, "Foundational");
    assert_eq!(
        report.mentor_blob_v2.flags.yellow,
        vec!["Low biblical knowledge score".to_string()]
    );
    let law = report
        .mentor_blob_v2
        .biblical_knowledge
        .topic_breakdown
        .iter()
        .find(|entry| entry.topic == "Law")
        .expect("law topic");
    assert_eq!((law.correct, law.total), (0, 2));
    assert_eq!(report.mentor_blob_v2.status, BlobStatus::Baseline);
}

#[test]
fn bands_have_three_tiers() {
    assert_eq!(baseline_band(100), "Strong");
    assert_eq!(baseline_band(80), "Strong");
    assert_eq!(baseline_band(79), "Developing");
    assert_eq!(baseline_band(49), "Foundational");
}

#[test]
fn serializes_blob_status_as_baseline() {
    let report = score_baseline(&mixed_submission());
    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["mentor_blob_v2"]["status"], "baseline");
    assert_eq!(json["mentor_blob_v2"]["snapshot"]["overall_mc_percent"], 50.0);
}

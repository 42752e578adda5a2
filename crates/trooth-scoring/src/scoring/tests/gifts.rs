use super::common::*;
use crate::scoring::gifts::{GIFT_REPORT_VERSION, GIFT_SCORING_ALGORITHM};

#[test]
fn complete_answer_set_validates_cleanly() {
    let scorer = gift_scorer();
    let answers = uniform_gift_answers(2);

    assert_eq!(answers.len(), 72);
    assert!(scorer.validate(&answers).is_empty());
}

#[test]
fn validation_reports_every_problem_at_once() {
    let scorer = gift_scorer();
    let mut answers = uniform_gift_answers(2);
    answers.remove("Q07");
    answers.insert("Q99", 3);
    answers.insert("Q12", 5);

    let problems = scorer.validate(&answers);

    assert_eq!(
        problems,
        vec![
            "Missing items: Q07".to_string(),
            "Unexpected items: Q99".to_string(),
            "Out-of-range (0-4) values: Q12".to_string(),
        ]
    );

    match scorer.score(&answers) {
        Err(err) => {
            assert_eq!(err.problems.len(), 3);
            assert!(err.to_string().contains("Missing items: Q07; Unexpected items: Q99"));
        }
        Ok(report) => panic!("expected validation failure, got {report:?}"),
    }
}

#[test]
fn non_integer_ratings_are_out_of_range() {
    let scorer = gift_scorer();
    let mut answers = uniform_gift_answers(1);
    answers.insert("Q01", "3");
    answers.insert("Q02", 2.5);
    answers.insert("Q03", -1);

    let problems = scorer.validate(&answers);
    assert_eq!(problems, vec!["Out-of-range (0-4) values: Q01, Q02, Q03".to_string()]);
}

#[test]
fn ranking_breaks_ties_alphabetically_and_expands_third_place() {
    let scorer = gift_scorer();
    let mut answers = uniform_gift_answers(2);
    set_gift_total(&mut answers, "faith", 12);
    set_gift_total(&mut answers, "wisdom", 12);
    set_gift_total(&mut answers, "leadership", 9);
    set_gift_total(&mut answers, "teaching", 9);

    let report = scorer.score(&answers).expect("valid answer set");

    let names: Vec<&str> = report
        .all_scores
        .iter()
        .take(4)
        .map(|entry| entry.gift.as_str())
        .collect();
    assert_eq!(names, vec!["Faith", "Wisdom", "Leadership", "Teaching"]);
    assert_eq!(report.all_scores.len(), 24);
    assert_eq!(report.all_scores[4].score, 6);

    assert_eq!(report.top_gifts_truncated.len(), 3);
    assert_eq!(report.rank_meta.third_place_score, Some(9));
    let expanded: Vec<&str> = report
        .top_gifts_expanded
        .iter()
        .map(|entry| entry.gift.as_str())
        .collect();
    assert_eq!(expanded, vec!["Faith", "Wisdom", "Leadership", "Teaching"]);

    assert_eq!(report.version, GIFT_REPORT_VERSION);
    assert_eq!(report.scoring_algorithm, GIFT_SCORING_ALGORITHM);
    assert_eq!(report.top_score(), 12);
}

#[test]
fn all_zero_answers_expand_to_every_gift() {
    let scorer = gift_scorer();
    let report = scorer
        .score(&uniform_gift_answers(0))
        .expect("valid answer set");

    assert_eq!(report.rank_meta.third_place_score, Some(0));
    assert_eq!(report.top_gifts_expanded.len(), 24);
    assert_eq!(report.all_scores[0].gift, "Administration");
}

#[test]
fn report_serializes_with_overridden_display_names() {
    let scorer = gift_scorer();
    let mut answers = uniform_gift_answers(0);
    set_gift_total(&mut answers, "pastor-shepherd", 12);

    let report = scorer.score(&answers).expect("valid answer set");
    let json = serde_json::to_value(&report).expect("report serializes");

    assert_eq!(json["all_scores"][0]["gift"], "Pastor/Shepherd");
    assert_eq!(json["all_scores"][0]["score"], 12);
    assert_eq!(json["rank_meta"]["third_place_score"], 0);
    assert_eq!(json["scoring_algorithm"], "simple_sum_v1");
}

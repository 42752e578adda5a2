use std::collections::BTreeMap;

use super::mentor_blob::MentorBlob;
use super::metrics::McMetrics;
use super::{overall_score, summary_recommendation, AiReport, QuestionFeedback};
use crate::scoring::domain::{value_text, Submission};

const DETAIL_WORD_THRESHOLD: usize = 5;

/// Deterministic offline report: answer-length heuristics plus the
/// objective-only mentor blob.
pub(crate) fn offline_report(submission: &Submission) -> AiReport {
    let mut categories: Vec<&str> = Vec::new();
    for question in &submission.questions {
        if !categories.contains(&question.category()) {
            categories.push(question.category());
        }
    }

    let mut category_scores = BTreeMap::new();
    let mut recommendations = BTreeMap::new();
    for category in categories {
        let word_counts: Vec<usize> = submission
            .questions
            .iter()
            .filter(|question| question.category() == category)
            .filter_map(|question| submission.answers.get(&question.id))
            .map(|value| value_text(value).split_whitespace().count())
            .collect();
        let average = word_counts.iter().sum::<usize>() as f64 / word_counts.len().max(1) as f64;
        let score = (5.0 + average / 10.0).floor().clamp(1.0, 10.0) as u32;

        category_scores.insert(category.to_string(), score);
        recommendations.insert(
            category.to_string(),
            format!(
                "Continue growing in {}. Focus on consistent practice and deeper understanding.",
                category.to_lowercase()
            ),
        );
    }

    let question_feedback = submission
        .answers
        .iter()
        .filter_map(|(code, value)| {
            let question = submission.question(code)?;
            let answer = value_text(value);
            let detailed = answer.split_whitespace().count() > DETAIL_WORD_THRESHOLD;
            Some(QuestionFeedback {
                question: question.text.clone(),
                answer,
                question_id: code.to_string(),
                correct: Some(detailed),
                explanation: if detailed {
                    String::new()
                } else {
                    "Consider providing more detailed responses.".to_string()
                },
            })
        })
        .collect();

    let metrics = McMetrics::tally(&submission.answers, &submission.questions);

    AiReport {
        overall_score: overall_score(&category_scores),
        summary_recommendation: summary_recommendation(&category_scores),
        category_scores,
        recommendations,
        question_feedback,
        mentor_blob_v2: MentorBlob::safe_minimal(&metrics),
    }
}

use serde::{Deserialize, Serialize};

use crate::scoring::domain::{AnswerSet, Question};

/// Topics under this percent-correct are treated as study gaps.
pub const WEAK_TOPIC_PERCENT: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTally {
    pub topic: String,
    pub correct: u32,
    pub total: u32,
}

impl TopicTally {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedItem {
    pub question_id: String,
    pub question_text: String,
    pub correct_answer: String,
    pub apprentice_answer: String,
    pub topic: String,
}

/// Objective multiple-choice results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McMetrics {
    pub total_questions: u32,
    pub correct_count: u32,
    pub percent_correct: f64,
    pub by_topic: Vec<TopicTally>,
    pub wrong_items: Vec<MissedItem>,
}

impl McMetrics {
    /// Grades every answered multiple-choice question. Topics keep the order
    /// in which they are first seen.
    pub fn tally(answers: &AnswerSet, questions: &[Question]) -> Self {
        let mut metrics = McMetrics::default();

        for (code, value) in answers.iter() {
            let Some(question) = questions
                .iter()
                .find(|question| question.id == code && question.is_multiple_choice())
            else {
                continue;
            };

            let answer = crate::scoring::domain::value_text(value);
            let correct = question
                .chosen_option(&answer)
                .map(|option| option.is_correct)
                .unwrap_or(false);
            let topic = question.topic().to_string();

            metrics.total_questions += 1;
            if correct {
                metrics.correct_count += 1;
            }

            match metrics.by_topic.iter_mut().find(|tally| tally.topic == topic) {
                Some(tally) => {
                    tally.total += 1;
                    tally.correct += u32::from(correct);
                }
                None => metrics.by_topic.push(TopicTally {
                    topic: topic.clone(),
                    correct: u32::from(correct),
                    total: 1,
                }),
            }

            if !correct {
                metrics.wrong_items.push(MissedItem {
                    question_id: question.id.clone(),
                    question_text: question.text.clone(),
                    correct_answer: question
                        .correct_option()
                        .map(|option| option.text.clone())
                        .unwrap_or_default(),
                    apprentice_answer: answer,
                    topic,
                });
            }
        }

        metrics.percent_correct = if metrics.total_questions == 0 {
            0.0
        } else {
            let raw =
                f64::from(metrics.correct_count) / f64::from(metrics.total_questions) * 100.0;
            (raw * 10.0).round_ties_even() / 10.0
        };
        metrics
    }

    /// Whole-number percent, truncated.
    pub fn whole_percent(&self) -> u32 {
        if self.total_questions == 0 {
            0
        } else {
            self.correct_count * 100 / self.total_questions
        }
    }

    pub fn weak_topics(&self) -> Vec<String> {
        self.by_topic
            .iter()
            .filter(|tally| tally.percent() < WEAK_TOPIC_PERCENT)
            .map(|tally| tally.topic.clone())
            .collect()
    }
}

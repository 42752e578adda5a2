use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category assigned to questions that do not declare one.
pub const DEFAULT_CATEGORY: &str = "Spiritual Assessment";

/// Raw answers keyed by item/question code.
///
/// Keys are unique by construction; values stay untyped until a scorer
/// coerces them under its own rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<String, Value>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(code.into(), value.into());
    }

    pub fn with(mut self, code: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(code, value);
        self
    }

    pub fn get(&self, code: &str) -> Option<&Value> {
        self.0.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(code, value)| (code.as_str(), value))
    }

    pub fn remove(&mut self, code: &str) -> Option<Value> {
        self.0.remove(code)
    }

    /// Numeric view of an answer; see [`coerce_number`].
    pub fn number(&self, code: &str) -> Option<f64> {
        self.get(code).and_then(coerce_number)
    }

    /// Display text of an answer, empty when absent.
    pub fn text(&self, code: &str) -> String {
        self.get(code).map(value_text).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(code, value)| (code.into(), value.into()))
                .collect(),
        )
    }
}

/// Accepts JSON numbers and trimmed numeric strings; everything else is dropped.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Renders a JSON value the way a participant typed it.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[serde(alias = "mc", alias = "multiple-choice")]
    MultipleChoice,
    #[default]
    #[serde(other)]
    OpenEnded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Question metadata supplied alongside the answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn category(&self) -> &str {
        self.category
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn topic(&self) -> &str {
        self.topic
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.category())
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.question_type == QuestionType::MultipleChoice
    }

    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.is_correct)
    }

    /// Resolves an answer against the option set: option id first, then
    /// case-insensitive option text.
    pub fn chosen_option(&self, answer: &str) -> Option<&QuestionOption> {
        let answer = answer.trim();
        self.options
            .iter()
            .find(|option| option.id.as_deref() == Some(answer))
            .or_else(|| {
                self.options
                    .iter()
                    .find(|option| option.text.trim().eq_ignore_ascii_case(answer))
            })
    }
}

/// Summary of an earlier assessment, used as trend context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorAssessment {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub category_scores: BTreeMap<String, f64>,
}

/// Identity of the assessment being scored; echoed into the mentor payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentContext {
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub apprentice: Option<Value>,
}

/// Everything a strategy may need to produce a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub answers: AnswerSet,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub rubric: Option<Value>,
    #[serde(default)]
    pub previous_assessments: Vec<PriorAssessment>,
    #[serde(default)]
    pub context: AssessmentContext,
}

impl Submission {
    pub fn from_answers(answers: AnswerSet) -> Self {
        Self {
            answers,
            ..Self::default()
        }
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }
}

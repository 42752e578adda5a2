use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::domain::AnswerSet;

pub const RUBRIC_SCORING_VERSION: &str = "generic_v1";
pub const NONE_SCORING_VERSION: &str = "none_v1";
pub const LOCAL_MODEL: &str = "none";
pub const GENERAL_CATEGORY: &str = "General";

/// Rubric document: categories plus the overall combination method.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rubric {
    pub categories: Vec<RubricCategory>,
    #[serde(default)]
    pub overall_weights: OverallWeights,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RubricCategory {
    #[serde(default = "unnamed", deserialize_with = "name_or_default")]
    pub name: String,
    #[serde(default)]
    pub question_ids: Vec<String>,
    #[serde(default = "unit_weight", deserialize_with = "weight_or_default")]
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverallWeights {
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallMethod {
    Average,
    Sum,
}

impl OverallWeights {
    pub fn method(&self) -> OverallMethod {
        match self.method.as_deref().map(str::trim) {
            Some(method) if method.eq_ignore_ascii_case("sum") => OverallMethod::Sum,
            _ => OverallMethod::Average,
        }
    }
}

fn unnamed() -> String {
    "Unnamed".to_string()
}

fn unit_weight() -> f64 {
    1.0
}

fn name_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.filter(|name| !name.is_empty()).unwrap_or_else(unnamed))
}

fn weight_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let weight = Option::<f64>::deserialize(deserializer)?;
    Ok(weight
        .filter(|weight| *weight != 0.0 && weight.is_finite())
        .unwrap_or(1.0))
}

impl Rubric {
    /// Parses a rubric document; an empty category list counts as malformed.
    pub fn from_value(value: &Value) -> Result<Self, RubricError> {
        let rubric: Rubric = serde_json::from_value(value.clone())
            .map_err(|err| RubricError::Malformed(err.to_string()))?;
        if rubric.categories.is_empty() {
            return Err(RubricError::NoCategories);
        }
        Ok(rubric)
    }
}

/// Why a supplied rubric could not be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RubricError {
    #[error("rubric is malformed: {0}")]
    Malformed(String),
    #[error("rubric declares no categories")]
    NoCategories,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    pub score: f64,
}

/// Output shared by the rubric and `none` strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricReport {
    pub overall_score: f64,
    pub categories: Vec<CategoryScore>,
    pub scoring_version: String,
    pub model: String,
}

impl RubricReport {
    /// Placeholder report for submissions that opt out of scoring.
    pub fn unscored() -> Self {
        Self {
            overall_score: 0.0,
            categories: Vec::new(),
            scoring_version: NONE_SCORING_VERSION.to_string(),
            model: LOCAL_MODEL.to_string(),
        }
    }
}

/// Scores answers against an optional rubric document.
///
/// Missing or unusable rubrics fall back to a single `General` category
/// holding the mean of every numeric answer.
pub fn score_rubric(answers: &AnswerSet, rubric: Option<&Value>) -> RubricReport {
    if answers.is_empty() {
        return report(0.0, Vec::new());
    }

    let rubric = match rubric.map(Rubric::from_value) {
        Some(Ok(rubric)) => Some(rubric),
        Some(Err(err)) => {
            warn!(error = %err, "ignoring rubric, scoring as a single category");
            None
        }
        None => None,
    };

    let Some(rubric) = rubric else {
        let values: Vec<f64> = answers
            .codes()
            .filter_map(|code| answers.number(code))
            .collect();
        let score = round2(mean(&values));
        return report(
            score,
            vec![CategoryScore {
                name: GENERAL_CATEGORY.to_string(),
                score,
            }],
        );
    };

    let categories: Vec<(CategoryScore, f64)> = rubric
        .categories
        .iter()
        .map(|category| {
            let values: Vec<f64> = category
                .question_ids
                .iter()
                .filter_map(|id| answers.number(id))
                .collect();
            (
                CategoryScore {
                    name: category.name.clone(),
                    score: round2(mean(&values)),
                },
                category.weight,
            )
        })
        .collect();

    let method = rubric.overall_weights.method();
    let overall = match method {
        OverallMethod::Sum => {
            let (weighted, total_weight) = categories
                .iter()
                .fold((0.0, 0.0), |(weighted, total), (category, weight)| {
                    (weighted + category.score * weight, total + weight)
                });
            if total_weight == 0.0 {
                0.0
            } else {
                weighted / total_weight
            }
        }
        OverallMethod::Average => {
            let scores: Vec<f64> = categories
                .iter()
                .map(|(category, _)| category.score)
                .collect();
            mean(&scores)
        }
    };

    debug!(?method, categories = categories.len(), "scored rubric");

    report(
        round2(overall),
        categories.into_iter().map(|(category, _)| category).collect(),
    )
}

fn report(overall_score: f64, categories: Vec<CategoryScore>) -> RubricReport {
    RubricReport {
        overall_score,
        categories,
        scoring_version: RUBRIC_SCORING_VERSION.to_string(),
        model: LOCAL_MODEL.to_string(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Two decimals, halves to even.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

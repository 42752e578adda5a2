use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::metrics::McMetrics;
use crate::llm::CompletionRequest;
use crate::scoring::domain::{
    value_text, AnswerSet, PriorAssessment, Question, QuestionType, Submission,
};

pub const CATEGORY_SYSTEM_PROMPT: &str =
    "You are an expert spiritual mentor and assessor. Output pure JSON.";

pub const MENTOR_SYSTEM_PROMPT: &str = "You must return STRICT JSON only, matching the requested \
     mentor report schema exactly. Do not include markdown, commentary, or extra keys.";

const CATEGORY_INSTRUCTION: &str = "Score this category from 1-10 based on the set of answers. \
     For multiple-choice questions, use the provided options with is_correct as ground truth \
     and mark correct/incorrect. For open-ended questions, do not mark correct/incorrect; give \
     a brief qualitative note. Respond JSON ONLY with keys: score (int), recommendation \
     (string), question_feedback (array). Each feedback item must include: question, answer, \
     question_id, correct (boolean or null), explanation (string).";

const MENTOR_INSTRUCTION: &str = "Write a mentor report for the assessment below. Return a JSON \
     object with exactly these keys: snapshot {overall_mc_percent, knowledge_band, \
     top_strengths[], top_gaps[]}; biblical_knowledge {summary, topic_breakdown[{topic, \
     correct, total, note}], study_targets[]}; open_ended_insights[{category, level, evidence, \
     discernment, scripture_anchor, mentor_moves[]}]; flags {red[], yellow[], green[]}; \
     four_week_plan {rhythm[], checkpoints[]}; conversation_starters[]; \
     recommended_resources[{title, why, type}]. Use mc_summary for every multiple-choice \
     figure; never invent scores.";

pub const CATEGORY_TEMPERATURE: f32 = 0.2;
pub const CATEGORY_MAX_TOKENS: u32 = 4000;
pub const MENTOR_TEMPERATURE: f32 = 0.2;
pub const MENTOR_MAX_TOKENS: u32 = 8000;
pub const HISTORY_CONTEXT_LIMIT: usize = 3;

/// One answered question as presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaItem {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub text: String,
    pub is_correct: bool,
}

/// Groups answered questions by category; unknown question ids are skipped.
pub fn group_by_category(
    answers: &AnswerSet,
    questions: &[Question],
) -> BTreeMap<String, Vec<QaItem>> {
    let mut grouped: BTreeMap<String, Vec<QaItem>> = BTreeMap::new();
    for (code, value) in answers.iter() {
        let Some(question) = questions.iter().find(|question| question.id == code) else {
            continue;
        };
        let options = if question.is_multiple_choice() {
            question
                .options
                .iter()
                .map(|option| OptionView {
                    text: option.text.clone(),
                    is_correct: option.is_correct,
                })
                .collect()
        } else {
            Vec::new()
        };
        grouped
            .entry(question.category().to_string())
            .or_default()
            .push(QaItem {
                question_id: question.id.clone(),
                question: question.text.clone(),
                answer: value_text(value),
                question_type: question.question_type,
                options,
            });
    }
    grouped
}

pub fn category_request(category: &str, items: &[QaItem]) -> CompletionRequest {
    let payload = json!({
        "instruction": CATEGORY_INSTRUCTION,
        "category": category,
        "items": items,
    });
    CompletionRequest::new(CATEGORY_SYSTEM_PROMPT, payload.to_string())
        .with_temperature(CATEGORY_TEMPERATURE)
        .with_max_tokens(CATEGORY_MAX_TOKENS)
        .with_json_output()
}

/// Mentor payload plus the metrics it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct MentorInput {
    pub payload: Value,
    pub metrics: McMetrics,
}

/// Assembles the mentor report payload: MC summary, open-ended answers and
/// up to three most recent prior assessments.
pub fn mentor_input(submission: &Submission) -> MentorInput {
    let metrics = McMetrics::tally(&submission.answers, &submission.questions);

    let mut categories: Vec<&str> = Vec::new();
    let mut open_ended = Vec::new();
    for (code, value) in submission.answers.iter() {
        let Some(question) = submission.question(code) else {
            continue;
        };
        if !categories.contains(&question.category()) {
            categories.push(question.category());
        }
        if question.is_multiple_choice() {
            continue;
        }
        open_ended.push(json!({
            "category": question.category(),
            "question_id": question.id,
            "question_text": question.text,
            "apprentice_answer": value_text(value),
            "rubric": { "dimensions": [] },
        }));
    }

    let context = &submission.context;
    let mut payload = json!({
        "apprentice": context.apprentice.clone().unwrap_or_else(|| json!({})),
        "assessment": {
            "id": context.assessment_id,
            "template_id": context.template_id,
            "submitted_at": context.submitted_at.map(|at| at.to_rfc3339()),
            "version": "v2",
            "categories": categories,
            "mc_summary": metrics,
            "open_ended": open_ended,
        },
    });

    if let Some(history) = historical_context(&submission.previous_assessments) {
        payload["historical_context"] = history;
    }

    MentorInput { payload, metrics }
}

fn historical_context(previous: &[PriorAssessment]) -> Option<Value> {
    if previous.is_empty() {
        return None;
    }
    let mut recent: Vec<&PriorAssessment> = previous.iter().collect();
    recent.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    let summaries: Vec<Value> = recent
        .into_iter()
        .take(HISTORY_CONTEXT_LIMIT)
        .map(|prior| {
            json!({
                "date": prior.created_at.to_rfc3339(),
                "overall_score": prior.overall_score,
                "category_scores": prior.category_scores,
            })
        })
        .collect();
    Some(json!({
        "previous_count": previous.len(),
        "previous_assessments": summaries,
    }))
}

pub fn mentor_request(payload: &Value) -> CompletionRequest {
    let body = json!({
        "instruction": MENTOR_INSTRUCTION,
        "input": payload,
    });
    CompletionRequest::new(MENTOR_SYSTEM_PROMPT, body.to_string())
        .with_temperature(MENTOR_TEMPERATURE)
        .with_max_tokens(MENTOR_MAX_TOKENS)
        .with_json_output()
}

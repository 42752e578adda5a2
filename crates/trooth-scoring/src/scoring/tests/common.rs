use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Usage};
use crate::scoring::ai::prompt::MENTOR_SYSTEM_PROMPT;
use crate::scoring::domain::{AnswerSet, Question, QuestionOption, QuestionType, Submission};
use crate::scoring::{AiScorer, GiftCatalog, GiftScorer, RetryPolicy};

pub(super) const MENTOR_KEY: &str = "mentor_blob";

/// Which unit of work a scripted call belongs to.
pub(super) enum Call<'a> {
    Category(&'a str),
    Mentor,
}

type Responder = dyn Fn(Call<'_>, usize) -> Result<CompletionResponse, LlmError> + Send + Sync;

/// Completion client answering from a closure keyed by unit of work and the
/// 1-based attempt number within that unit.
pub(super) struct ScriptedLlm {
    responder: Box<Responder>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub(super) fn new(
        responder: impl Fn(Call<'_>, usize) -> Result<CompletionResponse, LlmError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleeps before every reply.
    pub(super) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(super) fn calls(&self, key: &str) -> usize {
        self.calls
            .lock()
            .expect("call counter lock")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub(super) fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = if request.messages[0].content == MENTOR_SYSTEM_PROMPT {
            MENTOR_KEY.to_string()
        } else {
            let body: Value =
                serde_json::from_str(&request.messages[1].content).expect("category payload");
            body["category"]
                .as_str()
                .expect("category name")
                .to_string()
        };
        let attempt = {
            let mut calls = self.calls.lock().expect("call counter lock");
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let call = if key == MENTOR_KEY {
            Call::Mentor
        } else {
            Call::Category(&key)
        };
        (self.responder)(call, attempt)
    }
}

pub(super) fn reply(content: impl Into<String>) -> Result<CompletionResponse, LlmError> {
    Ok(CompletionResponse {
        content: content.into(),
        usage: Usage {
            prompt_tokens: 120,
            completion_tokens: 40,
        },
    })
}

pub(super) fn category_reply(score: impl Into<Value>, recommendation: &str) -> String {
    json!({
        "score": score.into(),
        "recommendation": recommendation,
        "question_feedback": [],
    })
    .to_string()
}

pub(super) fn mentor_blob_json() -> Value {
    json!({
        "snapshot": {
            "overall_mc_percent": 50.0,
            "knowledge_band": "Significant Study",
            "top_strengths": ["Prayer life"],
            "top_gaps": ["Law"]
        },
        "biblical_knowledge": {
            "summary": "1 of 2 correct.",
            "topic_breakdown": [
                {"topic": "Gospels", "correct": 1, "total": 1, "note": "Solid"},
                {"topic": "Law", "correct": 0, "total": 1, "note": "Review Exodus"}
            ],
            "study_targets": ["Law"]
        },
        "open_ended_insights": [{
            "category": "Prayer",
            "level": "Growing",
            "evidence": "Prays daily.",
            "discernment": "Consistent habit.",
            "scripture_anchor": "1 Thessalonians 5:17",
            "mentor_moves": ["Pray together weekly"]
        }],
        "flags": {"red": [], "yellow": [], "green": ["Teachable"]},
        "four_week_plan": {"rhythm": ["Read Exodus"], "checkpoints": ["Week 2 recap"]},
        "conversation_starters": ["What does prayer look like for you?"],
        "recommended_resources": [
            {"title": "Praying the Bible", "why": "Structure for prayer", "type": "book"}
        ]
    })
}

pub(super) fn ai_scorer(client: Arc<ScriptedLlm>) -> AiScorer {
    AiScorer::new(client, RetryPolicy::immediate(3))
}

pub(super) fn catalog() -> Arc<GiftCatalog> {
    Arc::new(GiftCatalog::standard().expect("bundled catalog is valid"))
}

pub(super) fn gift_scorer() -> GiftScorer {
    GiftScorer::new(catalog())
}

/// Every catalog code answered with `rating`.
pub(super) fn uniform_gift_answers(rating: i64) -> AnswerSet {
    catalog().codes().map(|code| (code, rating)).collect()
}

/// Rates each of a gift's three items so the gift totals `total`.
pub(super) fn set_gift_total(answers: &mut AnswerSet, slug: &str, total: u32) {
    let catalog = catalog();
    let codes = catalog
        .gifts()
        .iter()
        .find(|gift| gift.slug == slug)
        .map(|gift| gift.codes.clone())
        .expect("gift exists in catalog");
    let mut remaining = total;
    for code in codes {
        let rating = remaining.min(4);
        answers.insert(code, rating);
        remaining -= rating;
    }
    assert_eq!(remaining, 0, "{slug} cannot reach {total} with three items");
}

pub(super) fn mc_question(id: &str, category: &str, topic: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        category: Some(category.to_string()),
        topic: Some(topic.to_string()),
        question_type: QuestionType::MultipleChoice,
        options: vec![
            QuestionOption {
                id: Some("a".to_string()),
                text: correct.to_string(),
                is_correct: true,
            },
            QuestionOption {
                id: Some("b".to_string()),
                text: "Someone else".to_string(),
                is_correct: false,
            },
        ],
    }
}

pub(super) fn open_question(id: &str, category: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Describe {id}"),
        category: Some(category.to_string()),
        topic: None,
        question_type: QuestionType::OpenEnded,
        options: Vec::new(),
    }
}

/// Two categories: "Bible" (one right, one wrong MC answer across two
/// topics) and "Prayer" (two open-ended answers).
pub(super) fn mixed_submission() -> Submission {
    let answers = AnswerSet::new()
        .with("mc1", "Moses")
        .with("mc2", "b")
        .with("oe1", "I pray every morning before work with my family")
        .with("oe2", "Short answer");
    Submission {
        answers,
        questions: vec![
            mc_question("mc1", "Bible", "Gospels", "Moses"),
            mc_question("mc2", "Bible", "Law", "Sinai"),
            open_question("oe1", "Prayer"),
            open_question("oe2", "Prayer"),
        ],
        ..Submission::default()
    }
}

use crate::infra::{assessment_service, orchestrator, read_json, ApiService};
use chrono::{Duration, TimeZone, Utc};
use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;
use trooth_scoring::config::{AppConfig, EmailConfig, HistoryConfig, LlmConfig, ScoringConfig};
use trooth_scoring::email::SendScope;
use trooth_scoring::error::AppError;
use trooth_scoring::scoring::{
    AnswerSet, Question, ScoreReport, ScoringError, ScoringStrategy, Submission,
};
use trooth_scoring::{ScoreRequest, ServiceError};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Strategy tag, e.g. spiritual_gifts, ai_category, ai_master, baseline, none
    #[arg(long, default_value = "deterministic")]
    pub(crate) strategy: String,
    /// JSON object mapping question codes to answers
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// JSON array of question definitions
    #[arg(long)]
    pub(crate) questions: Option<PathBuf>,
    /// JSON rubric document for the rubric strategy
    #[arg(long)]
    pub(crate) rubric: Option<PathBuf>,
    /// Score AI strategies with local heuristics even when a key is configured
    #[arg(long)]
    pub(crate) offline: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Email sends allowed per sender and category in the limiter walkthrough
    #[arg(long, default_value_t = 2)]
    pub(crate) email_cap: usize,
    /// Page size for the history walkthrough
    #[arg(long, default_value_t = 2)]
    pub(crate) page_size: usize,
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        strategy,
        answers,
        questions,
        rubric,
        offline,
    } = args;

    let config = AppConfig::load()?;
    let orchestrator = orchestrator(&config.llm, &config.scoring, offline)?;

    let answers: AnswerSet = read_json(&answers)?;
    let questions: Vec<Question> = match questions {
        Some(path) => read_json(&path)?,
        None => Vec::new(),
    };
    let rubric: Option<Value> = rubric.map(|path| read_json(&path)).transpose()?;
    let submission = Submission {
        answers,
        questions,
        rubric,
        ..Submission::default()
    };

    let strategy = ScoringStrategy::from_tag(&strategy);
    let report = orchestrator
        .score(strategy, &submission)
        .await
        .map_err(ServiceError::from)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        email_cap,
        page_size,
    } = args;

    let email = EmailConfig {
        max_per_hour: email_cap,
        ..EmailConfig::default()
    };
    let orchestrator = orchestrator(&LlmConfig::default(), &ScoringConfig::default(), true)?;
    let service = assessment_service(orchestrator, &HistoryConfig::default(), &email);

    println!("Assessment scoring demo");
    demo_gifts(&service)?;
    demo_ai(&service).await?;
    demo_history(&service, page_size).await?;
    demo_email(&service, email_cap);

    Ok(())
}

fn demo_gifts(service: &ApiService) -> Result<(), AppError> {
    let catalog = service.orchestrator().gift_scorer().catalog();
    let mut answers = AnswerSet::new();
    for (index, code) in catalog.codes().enumerate() {
        answers.insert(code, ((index * 7 + 3) % 5) as i64);
    }

    let report = service
        .orchestrator()
        .gift_scorer()
        .score(&answers)
        .map_err(|err| ServiceError::from(ScoringError::from(err)))?;

    println!("\nSpiritual gifts ({} items answered)", answers.len());
    println!(
        "  Third place score: {}",
        report
            .rank_meta
            .third_place_score
            .map_or_else(|| "n/a".to_string(), |score| score.to_string())
    );
    for entry in &report.top_gifts_expanded {
        println!("  - {:<28} {}", entry.gift, entry.score);
    }
    if report.top_gifts_expanded.len() > report.top_gifts_truncated.len() {
        println!(
            "  {} gifts tie into the top three",
            report.top_gifts_expanded.len()
        );
    }

    let mut broken = answers.clone();
    broken.remove("Q01");
    broken.insert("Q02", 9);
    let problems = service.orchestrator().gift_scorer().validate(&broken);
    println!("  Validation of a damaged answer set:");
    for problem in problems {
        println!("    * {problem}");
    }
    Ok(())
}

async fn demo_ai(service: &ApiService) -> Result<(), AppError> {
    let submission: Submission = serde_json::from_value(sample_submission())?;

    let scored = service
        .submit(
            ScoringStrategy::AiCategory,
            ScoreRequest::anonymous(submission),
        )
        .await?;

    println!("\nAI category scoring (offline heuristics)");
    if let ScoreReport::Ai(report) = &scored.report {
        println!("  Overall: {}/10", report.overall_score);
        for (category, score) in &report.category_scores {
            let note = report
                .recommendations
                .get(category)
                .map(String::as_str)
                .unwrap_or("");
            println!("  - {category}: {score} ({note})");
        }
        let blob = &report.mentor_blob_v2;
        println!(
            "  Mentor blob: {:?}, {}% multiple choice, band {}",
            blob.status, blob.snapshot.overall_mc_percent, blob.snapshot.knowledge_band
        );
        for target in &blob.biblical_knowledge.study_targets {
            println!("    study target: {target}");
        }
    }

    let submission: Submission = serde_json::from_value(sample_submission())?;
    let baseline = service
        .submit(ScoringStrategy::Baseline, ScoreRequest::anonymous(submission))
        .await?;
    println!("\nBaseline report");
    println!("{}", serde_json::to_string_pretty(&baseline.report)?);
    Ok(())
}

async fn demo_history(service: &ApiService, page_size: usize) -> Result<(), AppError> {
    let start = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    for day in 0..5i64 {
        let mut submission = Submission::from_answers(
            AnswerSet::new()
                .with("a", 2 + day)
                .with("b", 3)
                .with("c", json!("not a number")),
        );
        submission.context.assessment_id = Some(format!("demo-{day:03}"));
        submission.context.submitted_at = Some(start + Duration::days(day));
        let request = ScoreRequest {
            submission,
            owner_id: Some("apprentice-demo".to_string()),
            scope: Some("weekly-check-in".to_string()),
        };
        service
            .submit(ScoringStrategy::Rubric, request)
            .await?;
    }

    println!("\nHistory pages (newest first, {page_size} per page)");
    let mut cursor: Option<String> = None;
    let mut page_number = 1;
    loop {
        let page = service
            .history(
                "apprentice-demo",
                "weekly-check-in",
                Some(page_size),
                cursor.as_deref(),
            )?;
        let ids: Vec<&str> = page.results.iter().map(|record| record.id.as_str()).collect();
        println!("  Page {page_number}: {}", ids.join(", "));
        match page.next_cursor {
            Some(next) if page.has_more => {
                println!("    next cursor: {next}");
                cursor = Some(next);
                page_number += 1;
            }
            _ => break,
        }
    }

    if let Err(err) = service.history("apprentice-demo", "weekly-check-in", Some(0), None) {
        println!("  Limit 0 rejected: {err}");
    }
    if let Err(err) = service.history(
        "apprentice-demo",
        "weekly-check-in",
        None,
        Some("not-a-cursor!"),
    ) {
        println!("  Tampered cursor rejected: {err}");
    }
    Ok(())
}

fn demo_email(service: &ApiService, email_cap: usize) {
    let scope = SendScope::new("mentor-demo");
    println!("\nEmail rate limit ({email_cap} sends per window)");

    for attempt in 1..=email_cap + 1 {
        match service.authorize_email(&scope, "bible") {
            Ok(window) => {
                println!(
                    "  Attempt {attempt}: allowed ({} already sent since {})",
                    window.count,
                    window.window_start.format("%H:%M:%S")
                );
                if let Err(err) = service.record_email(&scope, "bible") {
                    println!("  Attempt {attempt}: could not record send: {err}");
                }
            }
            Err(err) => println!("  Attempt {attempt}: blocked ({err})"),
        }
    }

    match service.authorize_email(&scope, "prayer") {
        Ok(_) => println!("  Other categories keep their own budget"),
        Err(err) => println!("  Unexpected block for another category: {err}"),
    }
}

fn sample_submission() -> Value {
    json!({
        "answers": {
            "q1": "Abraham",
            "q2": "c",
            "q3": "Moses",
            "q4": "I read a Psalm every evening and pray through it with my small group",
            "q5": "Mostly on Sundays"
        },
        "questions": [
            {
                "id": "q1",
                "text": "Who is called the father of faith?",
                "category": "Bible Knowledge",
                "topic": "Patriarchs",
                "question_type": "multiple_choice",
                "options": [
                    {"id": "a", "text": "Abraham", "is_correct": true},
                    {"id": "b", "text": "Noah", "is_correct": false}
                ]
            },
            {
                "id": "q2",
                "text": "Which book follows Exodus?",
                "category": "Bible Knowledge",
                "topic": "Torah",
                "question_type": "multiple_choice",
                "options": [
                    {"id": "c", "text": "Numbers", "is_correct": false},
                    {"id": "d", "text": "Leviticus", "is_correct": true}
                ]
            },
            {
                "id": "q3",
                "text": "Who received the law at Sinai?",
                "category": "Bible Knowledge",
                "topic": "Torah",
                "question_type": "multiple_choice",
                "options": [
                    {"id": "e", "text": "Moses", "is_correct": true},
                    {"id": "f", "text": "Aaron", "is_correct": false}
                ]
            },
            {
                "id": "q4",
                "text": "Describe your devotional rhythm.",
                "category": "Spiritual Disciplines"
            },
            {
                "id": "q5",
                "text": "When do you pray?",
                "category": "Spiritual Disciplines"
            }
        ]
    })
}

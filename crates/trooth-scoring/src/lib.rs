//! Assessment scoring: spiritual-gift inventories, rubric and AI-assisted
//! scoring, mentor reports, history pagination and report e-mail throttling.

pub mod config;
pub mod email;
pub mod error;
pub mod history;
pub mod llm;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod telemetry;

pub use router::scoring_router;
pub use service::{AssessmentService, ScoreRequest, ScoredAssessment, ServiceError};

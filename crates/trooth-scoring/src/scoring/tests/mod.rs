mod baseline;
mod common;
mod fallback;
mod gifts;
mod orchestrator;

pub mod config;
pub mod context;
pub mod orchestrator;

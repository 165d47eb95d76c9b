// Public API for integration tests and potential library usage

pub mod api;
pub mod chat;
pub mod config;
pub mod guess;
pub mod llm;
pub mod matchmaking;
pub mod registry;
pub mod types;
pub mod ws;

//! Planning oracles for taskweave.
//!
//! `LlmPlanner` asks a chat model for a `{"steps": [...]}` document and
//! keeps the steps that name catalog tools. Backends:
//! - OpenAI and OpenAI-compatible chat-completions servers
//! - Google Gemini
//!
//! `build_client_from_backend` / `build_planner_from_config` assemble them
//! from the `planner.backend` config section.

mod client;
mod factory;
mod gemini;
mod openai;
mod plan_json;
mod planner;
mod prompt;

pub use client::{LlmClient, LlmError, LlmRequest, MockLlmClient, ResponseFormat};
pub use factory::{
    build_client_from_backend, build_planner_from_config, DefaultLlmClientFactory, LlmBuildError,
    LlmClientFactory,
};
pub use gemini::{GeminiClient, GeminiClientConfig};
pub use openai::{OpenAiClient, OpenAiClientConfig};
pub use planner::{LlmPlanner, LlmPlannerConfig};

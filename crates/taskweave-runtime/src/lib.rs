//! # Taskweave Runtime
//!
//! Wires the core engine into a running agent:
//! - `bootstrap`: tracing setup and building an `Agent` from `taskweave.yaml`
//! - `session`: per-conversation blackboard and history
//! - `scratchpad`: JSONL log of goals and replies across conversations
//! - `agent`: goal -> plan -> execute -> user-facing report

pub mod agent;
pub mod bootstrap;
pub mod scratchpad;
pub mod session;

pub use agent::{Agent, AgentReply, WorkflowRun};
pub use scratchpad::{EntryKind, Scratchpad, ScratchpadEntry, ScratchpadError, ScratchpadStats};
pub use bootstrap::{build_agent, build_env, init_tracing_if_needed, RuntimeError};
pub use session::{Session, SessionStore, SessionSummary};

//! Crew Core: agent crews for an AutoML client pipeline.
//!
//! This crate contains the transport-agnostic domain logic:
//! - Agent and step models
//! - Dependency graph resolution (topological order, declaration-order ties)
//! - Sequential and conversation-mode orchestration
//! - Tool collaborators (inbox check, data processing, report commit, email)
//! - Text-completion backends (HTTP and offline)
//!
//! The command line lives in `crew-cli`.

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod tools;
pub mod workflow;

pub use config::{RunConfig, RunMode, SelectorKind, ToolSettings};
pub use error::{CrewError, GraphError, SelectionError, StepError, ToolError};
pub use models::{Agent, AgentRegistry, RunOutcome, RunReport, Step, StepResult};
pub use tools::ToolInvoker;
pub use workflow::{WorkflowDefinition, WorkflowExecutor};

//! Workflow engine: definitions, the step graph and the two orchestrators.

pub mod builtin;
pub mod conversation;
pub mod executor;
pub mod graph;
pub mod output;
pub mod schema;
pub mod template;
pub mod termination;

pub use builtin::{automl_pipeline, AUTOML_PIPELINE_YAML};
pub use conversation::{
    selector_for, ConversationOrchestrator, DeclarationOrderSelector, ManagerSelector,
    RoundRobinSelector, SelectionContext, SpeakerSelector,
};
pub use executor::{effective_input, RunObserver, WorkflowExecutor};
pub use graph::{resolve_order, DependencyGraph};
pub use schema::WorkflowDefinition;
pub use termination::{TerminationPredicate, TerminationRule};

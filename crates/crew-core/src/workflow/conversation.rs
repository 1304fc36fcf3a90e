//! Conversation mode: turn order decided one speaker at a time.
//!
//! A pluggable [`SpeakerSelector`] looks at the shared transcript and picks
//! the next step to answer. The orchestrator only offers steps whose
//! predecessors already have transcript entries, and rejects any answer
//! outside that set, so no policy can break the dependency order.
//!
//! A run ends when
//! - the termination predicate matches the latest entry (clean stop),
//! - every step has spoken (completed),
//! - the transcript reaches `max_round` entries (soft stop), or
//! - no step can be selected (fatal).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use crate::config::{RunMode, SelectorKind};
use crate::error::{CrewError, SelectionError};
use crate::llm::{CompletionBackend, CompletionRequest};
use crate::models::{
    AgentRegistry, ResultsStore, RunOutcome, RunReport, Step, Transcript, TranscriptEntry,
};
use crate::workflow::executor::{effective_input, StepScope, WorkflowExecutor};
use crate::workflow::graph::DependencyGraph;
use crate::workflow::schema::WorkflowDefinition;
use crate::workflow::termination::TerminationPredicate;

/// What a selection policy may look at.
pub struct SelectionContext<'a> {
    /// Entries already in the transcript.
    pub round: usize,
    pub transcript: &'a Transcript,
    /// Steps whose predecessors have all spoken, in declaration order.
    pub eligible: &'a [&'a Step],
    pub registry: &'a AgentRegistry,
}

impl SelectionContext<'_> {
    fn first_eligible(&self) -> Option<String> {
        self.eligible.first().map(|s| s.id.clone())
    }
}

/// Policy choosing the next step to speak.
///
/// Must return the id of a step from `ctx.eligible`; anything else halts the
/// run with `IneligibleSpeaker`. `None` means the policy cannot choose.
#[async_trait]
pub trait SpeakerSelector: Send + Sync {
    fn name(&self) -> &str;

    async fn select(&self, ctx: &SelectionContext<'_>) -> Option<String>;
}

/// Earliest-declared eligible step.
#[derive(Debug, Default)]
pub struct DeclarationOrderSelector;

#[async_trait]
impl SpeakerSelector for DeclarationOrderSelector {
    fn name(&self) -> &str {
        "declaration_order"
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Option<String> {
        ctx.first_eligible()
    }
}

/// Cycles over agents in registration order, starting after the last
/// speaker, and picks the first agent that owns an eligible step.
#[derive(Debug, Default)]
pub struct RoundRobinSelector;

#[async_trait]
impl SpeakerSelector for RoundRobinSelector {
    fn name(&self) -> &str {
        "round_robin"
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Option<String> {
        let agents = ctx.registry.all();
        if agents.is_empty() {
            return ctx.first_eligible();
        }
        let start = ctx
            .transcript
            .last_speaker()
            .and_then(|speaker| ctx.registry.position(speaker))
            .map(|i| i + 1)
            .unwrap_or(0);

        (0..agents.len())
            .map(|offset| &agents[(start + offset) % agents.len()])
            .find_map(|agent| ctx.eligible.iter().find(|s| s.agent == agent.id))
            .map(|s| s.id.clone())
            .or_else(|| ctx.first_eligible())
    }
}

/// Asks the completion backend to name the next step, like a group-chat
/// manager. Falls back to declaration order when the reply names no
/// eligible step or the backend fails.
pub struct ManagerSelector {
    backend: Arc<dyn CompletionBackend>,
    /// Transcript entries shown to the manager.
    history: usize,
}

impl ManagerSelector {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            history: 5,
        }
    }

    fn prompt(&self, ctx: &SelectionContext<'_>) -> String {
        let mut prompt = String::from("Choose who speaks next.\n\n## Candidates\n");
        for step in ctx.eligible {
            let role = ctx
                .registry
                .get(&step.agent)
                .map(|a| a.role.as_str())
                .unwrap_or(step.agent.as_str());
            prompt.push_str(&format!("- {} ({}): {}\n", step.id, role, first_line(&step.description)));
        }
        let entries = ctx.transcript.entries();
        if !entries.is_empty() {
            prompt.push_str("\n## Recent conversation\n");
            let skip = entries.len().saturating_sub(self.history);
            for entry in &entries[skip..] {
                prompt.push_str(&format!("{}: {}\n", entry.speaker, first_line(&entry.content)));
            }
        }
        prompt.push_str("\nReply with the candidate id only.");
        prompt
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

/// The eligible step named in `reply`: an exact id match first, otherwise
/// the candidate whose id appears earliest as a whole word. Ties at the same
/// position go to the longer id.
fn parse_choice(reply: &str, eligible: &[&Step]) -> Option<String> {
    let trimmed = reply.trim().trim_matches(|c: char| c == '`' || c == '"' || c == '\'');
    if let Some(step) = eligible.iter().find(|s| s.id == trimmed) {
        return Some(step.id.clone());
    }
    eligible
        .iter()
        .filter_map(|s| {
            let pattern = format!(r"\b{}\b", regex::escape(&s.id));
            let found = Regex::new(&pattern).ok()?.find(reply)?;
            Some((found.start(), std::cmp::Reverse(s.id.len()), s.id.as_str()))
        })
        .min()
        .map(|(_, _, id)| id.to_string())
}

#[async_trait]
impl SpeakerSelector for ManagerSelector {
    fn name(&self) -> &str {
        "manager"
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Option<String> {
        let request = CompletionRequest {
            step_id: format!("select_speaker_{}", ctx.round),
            agent: "manager".to_string(),
            system: "You are the group chat manager of an AutoML project team.".to_string(),
            prompt: self.prompt(ctx),
            schema: None,
        };
        match self.backend.complete(&request).await {
            Ok(reply) => parse_choice(&reply, ctx.eligible).or_else(|| {
                tracing::debug!(reply = %reply, "Manager named no candidate; using declaration order");
                ctx.first_eligible()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Manager selection failed; using declaration order");
                ctx.first_eligible()
            }
        }
    }
}

/// Selector for a configured policy.
pub fn selector_for(
    kind: SelectorKind,
    backend: Arc<dyn CompletionBackend>,
) -> Box<dyn SpeakerSelector> {
    match kind {
        SelectorKind::DeclarationOrder => Box::new(DeclarationOrderSelector),
        SelectorKind::RoundRobin => Box::new(RoundRobinSelector),
        SelectorKind::Manager => Box::new(ManagerSelector::new(backend)),
    }
}

/// Runs a workflow turn by turn over a shared transcript.
pub struct ConversationOrchestrator<'e> {
    executor: &'e WorkflowExecutor,
    selector: Box<dyn SpeakerSelector>,
}

impl<'e> ConversationOrchestrator<'e> {
    pub fn new(executor: &'e WorkflowExecutor, selector: Box<dyn SpeakerSelector>) -> Self {
        Self { executor, selector }
    }

    pub async fn run(&self, workflow: &WorkflowDefinition) -> Result<RunReport, CrewError> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        // Same fail-fast graph checks as sequential mode.
        DependencyGraph::build(&workflow.steps)?;
        let predicate = workflow
            .run
            .terminate_on
            .as_ref()
            .map(TerminationPredicate::compile)
            .transpose()?;
        let registry = workflow.registry();
        let variables: HashMap<String, String> = workflow.resolved_variables();
        let max_round = workflow.run.max_round;

        tracing::info!(
            run_id = %run_id,
            workflow = %workflow.name,
            selector = self.selector.name(),
            max_round,
            "Starting conversation run"
        );

        let mut transcript = Transcript::new();
        let initial = workflow.run.initial_message.clone().unwrap_or_default();
        if !initial.is_empty() {
            transcript.push(TranscriptEntry {
                speaker: workflow.run.initiator.clone(),
                step_id: None,
                content: initial.clone(),
            });
        }

        let mut results = ResultsStore::new();
        let mut order = Vec::new();
        let total = workflow.steps.len();

        let outcome = loop {
            let pending: Vec<&Step> = workflow
                .steps
                .iter()
                .filter(|s| !transcript.has_spoken(&s.id))
                .collect();
            if pending.is_empty() {
                break RunOutcome::Completed;
            }
            if transcript.len() >= max_round {
                tracing::warn!(max_round, pending = pending.len(), "Round limit reached");
                break RunOutcome::RoundLimitExceeded { max_round };
            }

            let eligible: Vec<&Step> = pending
                .iter()
                .copied()
                .filter(|s| s.context.iter().all(|p| transcript.has_spoken(p)))
                .collect();
            let no_speaker = || RunOutcome::SelectionFailed {
                error: SelectionError::NoEligibleSpeaker {
                    pending: pending.iter().map(|s| s.id.clone()).collect(),
                },
            };
            if eligible.is_empty() {
                break no_speaker();
            }

            let ctx = SelectionContext {
                round: transcript.len(),
                transcript: &transcript,
                eligible: &eligible,
                registry: &registry,
            };
            let Some(choice) = self.selector.select(&ctx).await else {
                break no_speaker();
            };
            let Some(step) = eligible.iter().copied().find(|s| s.id == choice) else {
                tracing::error!(step = %choice, "Selector chose an ineligible step");
                break RunOutcome::SelectionFailed {
                    error: SelectionError::IneligibleSpeaker { step: choice },
                };
            };

            let round = transcript.len();
            if let Some(observer) = self.executor.observer() {
                observer.step_started(step, order.len() + 1, total);
            }
            tracing::info!(round, step = %step.id, agent = %step.agent, "Speaker selected");

            let input = if step.context.is_empty() {
                initial.clone()
            } else {
                effective_input(step, &results)
            };
            let scope = StepScope {
                registry: &registry,
                variables: &variables,
                results: &results,
            };
            let (result, error) = self.executor.run_step(step, &input, &scope).await;

            let content = match &error {
                Some(e) => format!("error: {}", e),
                None => result.text(),
            };
            let matched = error.is_none()
                && predicate.as_ref().is_some_and(|p| p.matches(&content));
            transcript.push(TranscriptEntry {
                speaker: step.agent.clone(),
                step_id: Some(step.id.clone()),
                content,
            });
            order.push(step.id.clone());

            let recorded = results.record(result)?;
            if let Some(observer) = self.executor.observer() {
                observer.step_finished(recorded);
            }

            if let Some(error) = error {
                tracing::error!(step = %step.id, error = %error, "Step failed; halting run");
                break RunOutcome::StepFailed {
                    step_id: step.id.clone(),
                    error,
                };
            }
            if matched {
                tracing::info!(step = %step.id, "Termination predicate matched");
                break RunOutcome::Terminated {
                    step_id: step.id.clone(),
                };
            }
        };

        tracing::info!(run_id = %run_id, outcome = %outcome, rounds = transcript.len(), "Run finished");
        Ok(RunReport {
            run_id,
            workflow: workflow.name.clone(),
            mode: RunMode::Conversation,
            order,
            results,
            transcript,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

//! Workflow executor: runs a definition step by step.
//!
//! The executor:
//! 1. Resolves the step graph into an execution order (fails fast on
//!    cycles and unknown predecessors)
//! 2. Builds each step's effective input from its predecessors' results
//! 3. Dispatches the step to its tool, or to the completion backend
//! 4. Coerces the result into the step's output schema, if declared
//! 5. Records the result and checks the termination predicate
//!
//! Step failures end the run but are not returned as `Err`: the report
//! carries the outcome together with every result recorded so far.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::RunMode;
use crate::error::{CrewError, StepError, ToolError};
use crate::llm::{CompletionBackend, CompletionRequest};
use crate::models::{Agent, AgentRegistry, ResultsStore, RunOutcome, RunReport, Step, StepResult};
use crate::tools::{ToolArgs, ToolInvoker};
use crate::workflow::conversation::{selector_for, ConversationOrchestrator};
use crate::workflow::graph::DependencyGraph;
use crate::workflow::output;
use crate::workflow::schema::WorkflowDefinition;
use crate::workflow::template::{self, TemplateContext};
use crate::workflow::termination::TerminationPredicate;

/// Progress hooks for callers that want live output. All methods default to
/// no-ops.
pub trait RunObserver: Send + Sync {
    /// `position` is 1-based; `total` is the number of declared steps.
    fn step_started(&self, _step: &Step, _position: usize, _total: usize) {}

    fn step_finished(&self, _result: &StepResult) {}
}

/// Build the effective input of `step` from already-recorded results.
///
/// Plain steps get the predecessors' result texts joined by a blank line, in
/// declared order. A step with an output schema gets a JSON object keyed by
/// predecessor id instead, carrying structured records as-is.
pub fn effective_input(step: &Step, results: &ResultsStore) -> String {
    if step.output_schema.is_some() && !step.context.is_empty() {
        let mut merged = Map::new();
        for pred in &step.context {
            if let Some(r) = results.get(pred) {
                let value = r
                    .structured
                    .clone()
                    .unwrap_or_else(|| Value::String(r.output.clone()));
                merged.insert(pred.clone(), value);
            }
        }
        return serde_json::to_string_pretty(&Value::Object(merged)).unwrap_or_default();
    }

    step.context
        .iter()
        .filter_map(|pred| results.get(pred))
        .map(|r| r.text())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User prompt for a backend-answered step.
fn build_prompt(step: &Step, input: &str) -> String {
    let mut prompt = String::new();
    if step.description.is_empty() {
        prompt.push_str(&format!("Complete step '{}'.", step.id));
    } else {
        prompt.push_str(&step.description);
    }
    if !input.is_empty() {
        prompt.push_str("\n\n## Context\n");
        prompt.push_str(input);
    }
    if let Some(expected) = &step.expected_output {
        prompt.push_str("\n\n## Expected Output\n");
        prompt.push_str(expected);
    }
    prompt
}

/// Everything a single step needs besides the step itself.
pub(crate) struct StepScope<'a> {
    pub registry: &'a AgentRegistry,
    pub variables: &'a HashMap<String, String>,
    pub results: &'a ResultsStore,
}

/// The workflow executor engine.
pub struct WorkflowExecutor {
    backend: Arc<dyn CompletionBackend>,
    tools: ToolInvoker,
    observer: Option<Arc<dyn RunObserver>>,
}

impl WorkflowExecutor {
    pub fn new(backend: Arc<dyn CompletionBackend>, tools: ToolInvoker) -> Self {
        Self {
            backend,
            tools,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tools(&self) -> &ToolInvoker {
        &self.tools
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn RunObserver>> {
        self.observer.as_ref()
    }

    /// Run a definition with the control strategy named in its `run:` block.
    pub async fn execute(&self, workflow: &WorkflowDefinition) -> Result<RunReport, CrewError> {
        match workflow.run.mode {
            RunMode::Sequential => self.run_sequential(workflow).await,
            RunMode::Conversation => {
                let selector = selector_for(workflow.run.selector, self.backend.clone());
                ConversationOrchestrator::new(self, selector)
                    .run(workflow)
                    .await
            }
        }
    }

    /// Walk the resolved dependency order.
    pub async fn run_sequential(
        &self,
        workflow: &WorkflowDefinition,
    ) -> Result<RunReport, CrewError> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let graph = DependencyGraph::build(&workflow.steps)?;
        let predicate = workflow
            .run
            .terminate_on
            .as_ref()
            .map(TerminationPredicate::compile)
            .transpose()?;
        let registry = workflow.registry();
        let variables = workflow.resolved_variables();
        let order: Vec<&Step> = graph
            .order_indices()
            .iter()
            .map(|&i| &workflow.steps[i])
            .collect();

        tracing::info!(
            run_id = %run_id,
            workflow = %workflow.name,
            steps = order.len(),
            "Starting sequential run"
        );

        let mut results = ResultsStore::new();
        let mut outcome = RunOutcome::Completed;
        let total = order.len();

        for (i, step) in order.iter().enumerate() {
            if let Some(observer) = &self.observer {
                observer.step_started(step, i + 1, total);
            }

            let input = effective_input(step, &results);
            let scope = StepScope {
                registry: &registry,
                variables: &variables,
                results: &results,
            };
            let (result, error) = self.run_step(step, &input, &scope).await;

            // Same text conversation mode records: the coerced record for
            // schema steps.
            let matched = error.is_none()
                && predicate
                    .as_ref()
                    .is_some_and(|p| p.matches(&result.text()));

            let recorded = results.record(result)?;
            if let Some(observer) = &self.observer {
                observer.step_finished(recorded);
            }

            if let Some(error) = error {
                tracing::error!(step = %step.id, error = %error, "Step failed; halting run");
                outcome = RunOutcome::StepFailed {
                    step_id: step.id.clone(),
                    error,
                };
                break;
            }
            if matched {
                tracing::info!(step = %step.id, "Termination predicate matched");
                outcome = RunOutcome::Terminated {
                    step_id: step.id.clone(),
                };
                break;
            }
        }

        tracing::info!(run_id = %run_id, outcome = %outcome, "Run finished");
        Ok(RunReport {
            run_id,
            workflow: workflow.name.clone(),
            mode: RunMode::Sequential,
            order: order.iter().map(|s| s.id.clone()).collect(),
            results,
            transcript: Default::default(),
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Execute one step. Never returns `Err`: a failed step yields a failed
    /// result plus the error that ends the run.
    pub(crate) async fn run_step(
        &self,
        step: &Step,
        input: &str,
        scope: &StepScope<'_>,
    ) -> (StepResult, Option<StepError>) {
        let fail = |output: String, error: StepError| {
            let result = StepResult::failed(&step.id, &step.agent, output, &error);
            (result, Some(error))
        };

        let Some(agent) = scope.registry.get(&step.agent) else {
            return fail(
                String::new(),
                StepError::UnknownAgent {
                    step: step.id.clone(),
                    agent: step.agent.clone(),
                },
            );
        };

        let tool_id = step.tool.as_deref().or(agent.tool.as_deref());
        tracing::info!(step = %step.id, agent = %agent.id, tool = ?tool_id, "Dispatching step");
        tracing::debug!(step = %step.id, input = %input, "Effective input");

        let raw = match tool_id {
            Some(tool_id) => match self.invoke_tool(step, tool_id, input, scope).await {
                Ok(text) => text,
                Err(error) => return fail(String::new(), error),
            },
            None => match self.complete(step, agent, input).await {
                Ok(text) => text,
                Err(error) => return fail(String::new(), error),
            },
        };

        match &step.output_schema {
            Some(schema) => match output::coerce(&raw, schema) {
                Ok(record) => (
                    StepResult::succeeded(&step.id, &agent.id, raw).with_structured(record),
                    None,
                ),
                Err(reason) => fail(
                    raw,
                    StepError::SchemaViolation {
                        step: step.id.clone(),
                        schema: schema.name.clone(),
                        reason,
                    },
                ),
            },
            None => (StepResult::succeeded(&step.id, &agent.id, raw), None),
        }
    }

    /// Render the step's argument templates and fill the tool's primary
    /// argument when the step leaves it out.
    fn tool_args(
        step: &Step,
        primary_arg: &str,
        input: &str,
        scope: &StepScope<'_>,
    ) -> ToolArgs {
        let ctx = TemplateContext {
            input,
            results: scope.results,
            variables: scope.variables,
        };
        let mut args: ToolArgs = step
            .args
            .iter()
            .map(|(name, tpl)| (name.clone(), template::render(tpl, &ctx)))
            .collect();
        if !args.contains(primary_arg) {
            let fill = if input.is_empty() {
                step.description.as_str()
            } else {
                input
            };
            args.insert(primary_arg, fill);
        }
        args
    }

    async fn invoke_tool(
        &self,
        step: &Step,
        tool_id: &str,
        input: &str,
        scope: &StepScope<'_>,
    ) -> Result<String, StepError> {
        let tool = self.tools.get(tool_id).ok_or_else(|| StepError::UnknownTool {
            step: step.id.clone(),
            tool: tool_id.to_string(),
        })?;
        let args = Self::tool_args(step, tool.primary_arg(), input, scope);

        tool.invoke(&args).await.map_err(|e| match e {
            ToolError::Unavailable(reason) => StepError::ToolUnavailable {
                step: step.id.clone(),
                tool: tool_id.to_string(),
                reason,
            },
            other => StepError::ToolFailed {
                step: step.id.clone(),
                tool: tool_id.to_string(),
                reason: other.to_string(),
            },
        })
    }

    async fn complete(&self, step: &Step, agent: &Agent, input: &str) -> Result<String, StepError> {
        let request = CompletionRequest {
            step_id: step.id.clone(),
            agent: agent.id.clone(),
            system: agent.persona(),
            prompt: build_prompt(step, input),
            schema: step.output_schema.clone(),
        };
        tracing::debug!(step = %step.id, backend = self.backend.name(), "Requesting completion");
        self.backend
            .complete(&request)
            .await
            .map_err(|e| StepError::CompletionFailed {
                step: step.id.clone(),
                reason: e.to_string(),
            })
    }
}

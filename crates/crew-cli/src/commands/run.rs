//! `crew run`: execute a workflow sequentially or as a conversation.

use std::sync::Arc;

use crew_core::config::{LlmProvider, RunMode, SelectorKind, ToolSettings};
use crew_core::llm;
use crew_core::models::{RunOutcome, RunReport, Step, StepResult};
use crew_core::workflow::executor::RunObserver;
use crew_core::workflow::termination::TerminationRule;
use crew_core::{ToolInvoker, WorkflowDefinition, WorkflowExecutor};

use super::{load_workflow, truncate};

/// Command-line overrides of the definition's `run:` and `llm:` blocks.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Option<String>,
    pub max_round: Option<usize>,
    pub terminate_on: Option<String>,
    pub selector: Option<String>,
    pub offline: bool,
    pub verbose: bool,
    pub json: bool,
}

impl RunOptions {
    /// Apply the overrides to a loaded definition.
    pub fn apply(&self, workflow: &mut WorkflowDefinition) -> Result<(), String> {
        if let Some(mode) = &self.mode {
            workflow.run.mode = mode.parse::<RunMode>().map_err(|e| e.to_string())?;
        }
        if let Some(max_round) = self.max_round {
            workflow.run.max_round = max_round;
        }
        if let Some(rule) = &self.terminate_on {
            workflow.run.terminate_on =
                Some(rule.parse::<TerminationRule>().map_err(|e| e.to_string())?);
        }
        if let Some(selector) = &self.selector {
            workflow.run.selector = selector.parse::<SelectorKind>().map_err(|e| e.to_string())?;
        }
        if self.offline {
            workflow.llm.provider = LlmProvider::Offline;
        }
        Ok(())
    }
}

/// Live per-step output.
struct StepPrinter {
    verbose: bool,
}

impl RunObserver for StepPrinter {
    fn step_started(&self, step: &Step, position: usize, total: usize) {
        println!("▶ [{}/{}] {} ({})", position, total, step.id, step.agent);
    }

    fn step_finished(&self, result: &StepResult) {
        match &result.error {
            None => {
                println!("  ✅ {}", truncate(first_line(&result.output), 96));
                if self.verbose {
                    for line in result.text().lines() {
                        println!("     │ {}", line);
                    }
                }
            }
            Some(error) => println!("  ❌ {}", error),
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

/// Validate and execute a loaded definition against the given tools.
///
/// Returns `Err` only when the run cannot start (invalid definition, graph
/// errors, unconfigured backend). Step and selection failures come back in
/// the report.
pub async fn execute(
    workflow: &WorkflowDefinition,
    settings: &ToolSettings,
    observer: Option<Arc<dyn RunObserver>>,
) -> Result<RunReport, String> {
    let tools = ToolInvoker::with_defaults(settings);
    workflow.validate(&tools).map_err(|e| e.to_string())?;

    let backend = llm::from_config(&workflow.llm).map_err(|e| e.to_string())?;
    tracing::info!(backend = backend.name(), "Completion backend ready");

    let mut executor = WorkflowExecutor::new(backend, tools);
    if let Some(observer) = observer {
        executor = executor.with_observer(observer);
    }
    executor.execute(workflow).await.map_err(|e| e.to_string())
}

/// Map a finished run onto the command's exit status.
pub fn check_outcome(report: &RunReport) -> Result<(), String> {
    match &report.outcome {
        RunOutcome::Completed | RunOutcome::Terminated { .. } => Ok(()),
        RunOutcome::RoundLimitExceeded { max_round } => {
            eprintln!(
                "⚠️  Round limit of {} reached before the termination rule matched",
                max_round
            );
            Ok(())
        }
        RunOutcome::StepFailed { step_id, error } => {
            Err(format!("Run halted at step '{}': {}", step_id, error))
        }
        RunOutcome::SelectionFailed { error } => Err(format!("Run halted: {}", error)),
    }
}

/// Run FILE, or the built-in pipeline.
pub async fn run(file: Option<&str>, options: &RunOptions) -> Result<(), String> {
    let (mut workflow, source) = load_workflow(file)?;
    options.apply(&mut workflow)?;
    let settings = ToolSettings::from_env();

    if options.json {
        let report = execute(&workflow, &settings, None).await?;
        let value = serde_json::to_value(&report).map_err(|e| e.to_string())?;
        super::print_json(&value);
        return check_outcome(&report);
    }

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  🤖 {:<53}║", truncate(&workflow.name, 52));
    println!("╚══════════════════════════════════════════════════════════╝");
    println!("   Source:   {}", source);
    println!("   Mode:     {}", workflow.run.mode);
    println!("   Steps:    {}", workflow.steps.len());
    println!("   Backend:  {:?} ({})", workflow.llm.provider, workflow.llm.model);
    if let Some(rule) = &workflow.run.terminate_on {
        println!("   Stop on:  {}", rule);
    }
    if workflow.run.mode == RunMode::Conversation {
        println!("   Rounds:   {}", workflow.run.max_round);
    }
    println!();

    let printer: Arc<dyn RunObserver> = Arc::new(StepPrinter {
        verbose: options.verbose,
    });
    let report = execute(&workflow, &settings, Some(printer)).await?;

    println!();
    println!(
        "Run {} {} ({} step(s) recorded)",
        report.run_id,
        report.outcome,
        report.results.len()
    );
    check_outcome(&report)?;
    if report.is_success() {
        println!("\n🎉 Workflow finished successfully!");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_override_definition() {
        let (mut workflow, _) = load_workflow(None).unwrap();
        let options = RunOptions {
            mode: Some("conversation".into()),
            max_round: Some(5),
            terminate_on: Some("equals:TERMINATE".into()),
            selector: Some("round-robin".into()),
            offline: true,
            ..RunOptions::default()
        };
        options.apply(&mut workflow).unwrap();
        assert_eq!(workflow.run.mode, RunMode::Conversation);
        assert_eq!(workflow.run.max_round, 5);
        assert_eq!(
            workflow.run.terminate_on,
            Some(TerminationRule::Equals("TERMINATE".into()))
        );
        assert_eq!(workflow.run.selector, SelectorKind::RoundRobin);
        assert_eq!(workflow.llm.provider, LlmProvider::Offline);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let (mut workflow, _) = load_workflow(None).unwrap();
        let options = RunOptions {
            mode: Some("parallel".into()),
            ..RunOptions::default()
        };
        assert!(options.apply(&mut workflow).is_err());
    }
}

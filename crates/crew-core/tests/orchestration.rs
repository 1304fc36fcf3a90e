use std::sync::Arc;

use async_trait::async_trait;
use crew_core::config::{RunMode, SelectorKind};
use crew_core::error::{CompletionError, CrewError, GraphError};
use crew_core::llm::{CompletionBackend, CompletionRequest, OfflineBackend};
use crew_core::models::RunOutcome;
use crew_core::tools::FnTool;
use crew_core::workflow::termination::TerminationRule;
use crew_core::{ToolInvoker, WorkflowDefinition, WorkflowExecutor};

const DIAMOND: &str = r#"
name: "Diamond"
agents:
  - id: lead
    role: "Lead"
    tool: upper
  - id: left_hand
    role: "Left"
    tool: tag_left
  - id: right_hand
    role: "Right"
    tool: tag_right
  - id: joiner
    role: "Joiner"
    tool: echo
steps:
  - id: prep
    agent: lead
    args:
      text: "dataset ready"
  - id: left
    agent: left_hand
    context: [prep]
  - id: right
    agent: right_hand
    context: [prep]
  - id: join
    agent: joiner
    context: [right, left]
run:
  initial_message: "Kick off the diamond."
  initiator: lead
llm:
  provider: offline
"#;

fn tools() -> ToolInvoker {
    let mut tools = ToolInvoker::new();
    tools
        .register(FnTool::new("upper", "text", |args| {
            Ok(args.require("text")?.to_uppercase())
        }))
        .register(FnTool::new("tag_left", "text", |args| {
            Ok(format!("L<{}>", args.require("text")?))
        }))
        .register(FnTool::new("tag_right", "text", |args| {
            Ok(format!("R<{}>", args.require("text")?))
        }))
        .register(FnTool::new("echo", "text", |args| {
            Ok(args.require("text")?.to_string())
        }));
    tools
}

/// Manager that always names the last candidate offered.
struct PickLast;

#[async_trait]
impl CompletionBackend for PickLast {
    fn name(&self) -> &str {
        "pick_last"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let candidates: Vec<&str> = request
            .prompt
            .lines()
            .filter_map(|l| l.strip_prefix("- "))
            .filter_map(|l| l.split_whitespace().next())
            .collect();
        candidates
            .last()
            .map(|id| id.to_string())
            .ok_or_else(|| CompletionError::Malformed("no candidates".into()))
    }
}

#[tokio::test]
async fn test_sequential_diamond_joins_in_declared_context_order() {
    let wf = WorkflowDefinition::from_yaml(DIAMOND).unwrap();
    wf.validate(&tools()).unwrap();
    let executor = WorkflowExecutor::new(Arc::new(OfflineBackend::new()), tools());

    let report = executor.execute(&wf).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.order, vec!["prep", "left", "right", "join"]);
    assert_eq!(
        report.output("join").unwrap(),
        "R<DATASET READY>\n\nL<DATASET READY>"
    );
    let ordinals: Vec<usize> = report.results.all().iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_manager_choices_never_break_dependencies() {
    let mut wf = WorkflowDefinition::from_yaml(DIAMOND).unwrap();
    wf.run.mode = RunMode::Conversation;
    wf.run.selector = SelectorKind::Manager;
    let executor = WorkflowExecutor::new(Arc::new(PickLast), tools());

    let report = executor.execute(&wf).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.order, vec!["prep", "right", "left", "join"]);
    let speakers: Vec<&str> = report
        .transcript
        .entries()
        .iter()
        .map(|e| e.speaker.as_str())
        .collect();
    assert_eq!(speakers, vec!["lead", "lead", "right_hand", "left_hand", "joiner"]);
    assert_eq!(
        report.output("join").unwrap(),
        "R<DATASET READY>\n\nL<DATASET READY>"
    );
}

#[tokio::test]
async fn test_regex_termination_in_conversation() {
    let mut wf = WorkflowDefinition::from_yaml(DIAMOND).unwrap();
    wf.run.mode = RunMode::Conversation;
    wf.run.terminate_on = Some(TerminationRule::Matches(r"^L<".into()));
    let executor = WorkflowExecutor::new(Arc::new(OfflineBackend::new()), tools());

    let report = executor.execute(&wf).await.unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Terminated {
            step_id: "left".into()
        }
    );
    assert!(report.results.get("right").is_none());
    assert_eq!(report.transcript.len(), 3);
}

#[tokio::test]
async fn test_unknown_predecessor_fails_before_any_step() {
    let yaml = DIAMOND.replace("context: [right, left]", "context: [right, middle]");
    let wf = WorkflowDefinition::from_yaml(&yaml).unwrap();

    for mode in [RunMode::Sequential, RunMode::Conversation] {
        let mut wf = wf.clone();
        wf.run.mode = mode;
        let executor = WorkflowExecutor::new(Arc::new(OfflineBackend::new()), tools());
        match executor.execute(&wf).await {
            Err(CrewError::Graph(GraphError::UnknownPredecessor { step, predecessor })) => {
                assert_eq!(step, "join");
                assert_eq!(predecessor, "middle");
            }
            other => panic!("expected UnknownPredecessor, got {:?}", other.map(|r| r.outcome)),
        }
    }
}

//! The built-in AutoML client pipeline.

use crate::error::CrewError;
use crate::workflow::schema::WorkflowDefinition;

/// YAML source of the built-in pipeline, as written by `crew init`.
pub const AUTOML_PIPELINE_YAML: &str = include_str!("../../workflows/automl_pipeline.yaml");

/// Parse the built-in pipeline.
pub fn automl_pipeline() -> Result<WorkflowDefinition, CrewError> {
    WorkflowDefinition::from_yaml(AUTOML_PIPELINE_YAML)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{RunMode, ToolSettings};
    use crate::llm::OfflineBackend;
    use crate::models::{FieldType, RunOutcome};
    use crate::tools::ToolInvoker;
    use crate::workflow::executor::WorkflowExecutor;
    use crate::workflow::graph::resolve_order;
    use crate::workflow::termination::TerminationRule;

    fn settings(root: &std::path::Path) -> ToolSettings {
        let spool = root.join("inbox");
        std::fs::create_dir_all(&spool).unwrap();
        std::fs::write(
            spool.join("001.eml"),
            "From: monitor@example.com\nSubject: Weekly digest\n\nAll quiet.\n",
        )
        .unwrap();
        let knowledge = root.join("knowledge");
        std::fs::create_dir_all(&knowledge).unwrap();
        std::fs::write(
            knowledge.join("client_domain.txt"),
            "Energy retailer. Critical metrics: churn, gross margin, forecast error.\n",
        )
        .unwrap();
        ToolSettings {
            inbox_spool_dir: Some(spool),
            knowledge_dir: Some(knowledge),
            client_email: Some("client@example.com".to_string()),
            email_log: root.join("logs").join("email_log.txt"),
            report_root: root.join("repo"),
            data_seed: Some(7),
            ..ToolSettings::default()
        }
    }

    #[test]
    fn test_pipeline_parses_and_validates() {
        let wf = automl_pipeline().unwrap();
        assert_eq!(wf.agents.len(), 27);
        assert_eq!(wf.steps.len(), 18);
        assert_eq!(wf.run.max_round, 50);
        assert_eq!(wf.run.initiator, "project_manager");
        assert_eq!(
            wf.run.terminate_on,
            Some(TerminationRule::Contains("SUCCESS: Email".into()))
        );

        let tools = ToolInvoker::with_defaults(&ToolSettings::default());
        assert!(wf.validate(&tools).is_ok(), "{:?}", wf.problems(&tools));

        let schema = wf
            .step("validate_model")
            .and_then(|s| s.output_schema.as_ref())
            .unwrap();
        assert_eq!(schema.name, "FinalModelEvaluation");
        assert_eq!(schema.fields[1].kind, FieldType::Float);
    }

    #[test]
    fn test_pipeline_resolves_in_declared_order() {
        let wf = automl_pipeline().unwrap();
        let order = resolve_order(&wf.steps).unwrap();
        assert_eq!(
            order,
            vec![
                "check_alerts",
                "ingest_domain",
                "define_scope",
                "ingest_and_analyze",
                "clean_and_feature",
                "audit_data",
                "train_all_models",
                "select_model",
                "tune_model",
                "validate_model",
                "translate_metrics",
                "plan_monitoring",
                "plan_cicd",
                "audit_deployment",
                "quantify_impact",
                "draft_report",
                "commit_report",
                "send_email",
            ]
        );
    }

    #[tokio::test]
    async fn test_offline_sequential_run_reaches_the_email() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = ToolInvoker::with_defaults(&settings(tmp.path()));
        let executor = WorkflowExecutor::new(Arc::new(OfflineBackend::new()), tools);

        let report = executor.execute(&automl_pipeline().unwrap()).await.unwrap();

        assert_eq!(
            report.outcome,
            RunOutcome::Terminated {
                step_id: "send_email".into()
            }
        );
        assert_eq!(report.results.len(), 18);
        assert_eq!(report.output("check_alerts").unwrap(), "no alert found");
        assert!(report
            .output("ingest_domain")
            .unwrap()
            .starts_with("Energy retailer."));
        assert!(report
            .output("ingest_and_analyze")
            .unwrap()
            .starts_with("SUCCESS: Dataset downloaded"));

        let evaluation = report.results.get("validate_model").unwrap();
        assert_eq!(
            evaluation.structured.as_ref().unwrap()["model_name"],
            "offline model_name from model_validator"
        );

        let committed = tmp
            .path()
            .join("repo/client_reports/final_volatility_forecast_report.md");
        let content = std::fs::read_to_string(committed).unwrap();
        assert_eq!(content, report.output("draft_report").unwrap());

        let log = std::fs::read_to_string(tmp.path().join("logs/email_log.txt")).unwrap();
        assert!(log.contains("SENT EMAIL (client@example.com)"));
        assert!(log.contains("Your AutoML project results"));
    }

    #[tokio::test]
    async fn test_offline_conversation_run_matches_sequential_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = ToolInvoker::with_defaults(&settings(tmp.path()));
        let executor = WorkflowExecutor::new(Arc::new(OfflineBackend::new()), tools);

        let mut wf = automl_pipeline().unwrap();
        wf.run.mode = RunMode::Conversation;
        let report = executor.execute(&wf).await.unwrap();

        assert!(report.is_success(), "{}", report.outcome);
        assert_eq!(report.transcript.len(), 19);
        assert_eq!(
            report.transcript.entries()[0].speaker,
            "project_manager"
        );
        assert_eq!(report.order, resolve_order(&wf.steps).unwrap());
    }
}

//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! crew-core domain logic. Commands return `Err(String)` with a message for
//! the user; `main` prints it and exits with status 1.

pub mod agents;
pub mod init;
pub mod run;
pub mod validate;

use crew_core::workflow::builtin;
use crew_core::WorkflowDefinition;

/// Load FILE, or the built-in AutoML pipeline when no file is given.
pub fn load_workflow(file: Option<&str>) -> Result<(WorkflowDefinition, String), String> {
    match file {
        Some(path) => {
            let workflow = WorkflowDefinition::from_file(path).map_err(|e| e.to_string())?;
            Ok((workflow, path.to_string()))
        }
        None => {
            let workflow = builtin::automl_pipeline().map_err(|e| e.to_string())?;
            Ok((workflow, "built-in".to_string()))
        }
    }
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("much longer text", 6), "much …");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }

    #[test]
    fn test_load_builtin_when_no_file() {
        let (workflow, source) = load_workflow(None).unwrap();
        assert_eq!(source, "built-in");
        assert_eq!(workflow.steps.len(), 18);
        assert!(load_workflow(Some("/nonexistent/crew.yaml")).is_err());
    }
}

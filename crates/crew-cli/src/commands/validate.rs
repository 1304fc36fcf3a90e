//! `crew validate`: check a definition without running it.

use crew_core::config::ToolSettings;
use crew_core::workflow::graph::resolve_order;
use crew_core::ToolInvoker;

use super::load_workflow;

/// Parse, validate and print the resolved execution order.
pub fn validate(file: Option<&str>) -> Result<(), String> {
    let (workflow, source) = load_workflow(file)?;
    let tools = ToolInvoker::with_defaults(&ToolSettings::from_env());

    let problems = workflow.problems(&tools);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("   ✗ {}", problem);
        }
        return Err(format!(
            "Workflow '{}' has {} problem(s)",
            workflow.name,
            problems.len()
        ));
    }
    let order = resolve_order(&workflow.steps).map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid ({})", workflow.name, source);
    println!("   Version: {}", workflow.version);
    println!("   Agents:  {}", workflow.agents.len());
    println!("   Steps:   {}", workflow.steps.len());
    println!("   Mode:    {}", workflow.run.mode);
    println!();
    println!("   Execution order:");
    for (i, id) in order.iter().enumerate() {
        let step = workflow.step(id);
        let agent = step.map(|s| s.agent.as_str()).unwrap_or("?");
        let after = step
            .filter(|s| !s.context.is_empty())
            .map(|s| format!(" after {}", s.context.join(", ")))
            .unwrap_or_default();
        println!("   {:>2}. {} ({}){}", i + 1, id, agent, after);
    }
    Ok(())
}

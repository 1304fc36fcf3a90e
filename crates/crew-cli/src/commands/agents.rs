//! `crew agents`: list the agent registry of a definition.

use super::{load_workflow, truncate};

pub fn list(file: Option<&str>) -> Result<(), String> {
    let (workflow, source) = load_workflow(file)?;

    println!("{} agent(s) in '{}' ({})", workflow.agents.len(), workflow.name, source);
    println!();
    println!("┌────────────────────────────┬──────────────────────────────────┬────────────────┬───────┐");
    println!("│ ID                         │ Role                             │ Tool           │ Steps │");
    println!("├────────────────────────────┼──────────────────────────────────┼────────────────┼───────┤");

    for agent in &workflow.agents {
        let steps = workflow
            .steps
            .iter()
            .filter(|s| s.agent == agent.id)
            .count();
        println!(
            "│ {:<26} │ {:<32} │ {:<14} │ {:>5} │",
            truncate(&agent.id, 26),
            truncate(&agent.role, 32),
            truncate(agent.tool.as_deref().unwrap_or("-"), 14),
            steps
        );
    }

    println!("└────────────────────────────┴──────────────────────────────────┴────────────────┴───────┘");
    Ok(())
}

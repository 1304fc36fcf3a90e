//! Agent descriptors and the per-run agent registry.
//!
//! ```yaml
//! agents:
//!   - id: inbox_monitor
//!     role: "Critical System Alert Monitor"
//!     goal: "Check the monitoring inbox for high-priority data science alerts."
//!     backstory: "The first line of defense, proactively detecting critical failures."
//!     tool: check_inbox
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A role-playing agent. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique role identifier, referenced by steps.
    pub id: String,

    /// Display role name.
    pub role: String,

    /// What the agent is trying to achieve.
    #[serde(default)]
    pub goal: String,

    /// Free-text capability description. Never machine-parsed.
    #[serde(default)]
    pub backstory: String,

    /// Tool this agent invokes by default.
    #[serde(default)]
    pub tool: Option<String>,

    /// Whether the agent may hand work off to others.
    #[serde(default)]
    pub allow_delegation: bool,
}

impl Agent {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            tool: None,
            allow_delegation: false,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    /// Persona text handed to the completion backend as the system prompt.
    pub fn persona(&self) -> String {
        let mut prompt = format!("You are the {}.", self.role);
        if !self.goal.is_empty() {
            prompt.push_str(&format!("\nGoal: {}", self.goal));
        }
        if !self.backstory.is_empty() {
            prompt.push_str(&format!("\nBackground: {}", self.backstory));
        }
        if !self.allow_delegation {
            prompt.push_str("\nComplete the task yourself; do not delegate.");
        }
        prompt
    }
}

/// Read-only lookup table from agent id to descriptor.
///
/// Registration order is preserved; round-robin speaker selection relies on it.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Returns `false` (and keeps the existing entry)
    /// when the id is already taken.
    pub fn register(&mut self, agent: Agent) -> bool {
        if self.index.contains_key(&agent.id) {
            return false;
        }
        self.index.insert(agent.id.clone(), self.agents.len());
        self.agents.push(agent);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.index.get(id).map(|&i| &self.agents[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Agents in registration order.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Position of an agent in registration order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }
}

impl FromIterator<Agent> for AgentRegistry {
    fn from_iter<I: IntoIterator<Item = Agent>>(iter: I) -> Self {
        let mut registry = AgentRegistry::new();
        for agent in iter {
            registry.register(agent);
        }
        registry
    }
}

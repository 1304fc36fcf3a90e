//! Termination predicates: text-match rules that end a run early.
//!
//! ```yaml
//! run:
//!   terminate_on:
//!     contains: "SUCCESS: Email"
//! ```
//!
//! On the command line the same rule is written `contains:SUCCESS: Email`.

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CrewError;

/// Declarative form of a termination rule, as written in YAML or on the CLI.
///
/// In YAML a rule is a single-key map (`contains: "..."`) or a bare string,
/// which means `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr", into = "RuleRepr")]
pub enum TerminationRule {
    Contains(String),
    Equals(String),
    StartsWith(String),
    /// Regular expression searched anywhere in the text.
    Matches(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Text(String),
    Map(RuleMap),
}

#[derive(Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    matches: Option<String>,
}

impl TryFrom<RuleRepr> for TerminationRule {
    type Error = String;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        let map = match repr {
            RuleRepr::Text(text) => return Ok(TerminationRule::Contains(text)),
            RuleRepr::Map(map) => map,
        };
        let mut rules = Vec::new();
        if let Some(t) = map.contains {
            rules.push(TerminationRule::Contains(t));
        }
        if let Some(t) = map.equals {
            rules.push(TerminationRule::Equals(t));
        }
        if let Some(t) = map.starts_with {
            rules.push(TerminationRule::StartsWith(t));
        }
        if let Some(t) = map.matches {
            rules.push(TerminationRule::Matches(t));
        }
        match rules.len() {
            1 => Ok(rules.remove(0)),
            0 => Err("termination rule needs one of contains, equals, starts_with, matches".into()),
            _ => Err("termination rule must name exactly one kind".into()),
        }
    }
}

impl From<TerminationRule> for RuleRepr {
    fn from(rule: TerminationRule) -> Self {
        let mut map = RuleMap::default();
        match rule {
            TerminationRule::Contains(t) => map.contains = Some(t),
            TerminationRule::Equals(t) => map.equals = Some(t),
            TerminationRule::StartsWith(t) => map.starts_with = Some(t),
            TerminationRule::Matches(t) => map.matches = Some(t),
        }
        RuleRepr::Map(map)
    }
}

impl FromStr for TerminationRule {
    type Err = CrewError;

    /// Parse `kind:text`. A bare string without a known prefix means `contains`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CrewError::Config("empty termination rule".to_string()));
        }
        let rule = match s.split_once(':') {
            Some(("contains", text)) => TerminationRule::Contains(text.to_string()),
            Some(("equals", text)) => TerminationRule::Equals(text.to_string()),
            Some(("starts_with", text)) => TerminationRule::StartsWith(text.to_string()),
            Some(("matches", text)) => TerminationRule::Matches(text.to_string()),
            _ => TerminationRule::Contains(s.to_string()),
        };
        Ok(rule)
    }
}

impl std::fmt::Display for TerminationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationRule::Contains(t) => write!(f, "contains '{}'", t),
            TerminationRule::Equals(t) => write!(f, "equals '{}'", t),
            TerminationRule::StartsWith(t) => write!(f, "starts with '{}'", t),
            TerminationRule::Matches(t) => write!(f, "matches /{}/", t),
        }
    }
}

/// A compiled termination rule.
#[derive(Debug, Clone)]
pub struct TerminationPredicate {
    rule: TerminationRule,
    regex: Option<Regex>,
}

impl TerminationPredicate {
    pub fn compile(rule: &TerminationRule) -> Result<Self, CrewError> {
        let regex = match rule {
            TerminationRule::Matches(pattern) => Some(Regex::new(pattern)?),
            _ => None,
        };
        Ok(Self {
            rule: rule.clone(),
            regex,
        })
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            rule: TerminationRule::Contains(text.into()),
            regex: None,
        }
    }

    pub fn rule(&self) -> &TerminationRule {
        &self.rule
    }

    pub fn matches(&self, text: &str) -> bool {
        match (&self.rule, &self.regex) {
            (TerminationRule::Contains(needle), _) => text.contains(needle.as_str()),
            (TerminationRule::Equals(expected), _) => text.trim() == expected.trim(),
            (TerminationRule::StartsWith(prefix), _) => {
                text.trim_start().starts_with(prefix.as_str())
            }
            (TerminationRule::Matches(_), Some(re)) => re.is_match(text),
            (TerminationRule::Matches(_), None) => false,
        }
    }
}

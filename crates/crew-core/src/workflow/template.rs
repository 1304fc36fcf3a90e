//! Template substitution for tool arguments.
//!
//! Supported patterns:
//! - `${input}`: the step's effective input
//! - `${steps.<id>.output}`: result text of a context step
//! - `${variables.<key>}` or `${<key>}`: from the workflow's variables block
//! - `${ENV_VAR}` / `${ENV_VAR:-default}`: from the environment
//!
//! Unresolvable references are left in place.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::ResultsStore;

/// Values visible to a template while rendering one step's arguments.
pub struct TemplateContext<'a> {
    pub input: &'a str,
    pub results: &'a ResultsStore,
    pub variables: &'a HashMap<String, String>,
}

fn step_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{steps\.([^.}]+)\.output\}").expect("static regex"))
}

fn var_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{variables\.([^}]+)\}").expect("static regex"))
}

fn generic_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

/// Step ids referenced through `${steps.<id>.output}`.
pub fn referenced_steps(template: &str) -> Vec<String> {
    step_ref_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Render a template against the given context.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    // Step outputs may themselves contain `${...}`; substitute them last so
    // their content is never re-expanded.
    let mut step_values: Vec<String> = Vec::new();
    let placeholder = |i: usize| format!("\u{0}STEP{}\u{0}", i);

    let result = step_ref_regex()
        .replace_all(template, |caps: &Captures| {
            let step_id = &caps[1];
            match ctx.results.get(step_id) {
                Some(r) => {
                    step_values.push(r.text());
                    placeholder(step_values.len() - 1)
                }
                None => caps[0].to_string(),
            }
        })
        .to_string();

    let result = result.replace("${input}", &placeholder_input());

    let result = var_ref_regex()
        .replace_all(&result, |caps: &Captures| {
            let key = &caps[1];
            ctx.variables
                .get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    let result = generic_ref_regex()
        .replace_all(&result, |caps: &Captures| {
            let expr = &caps[1];
            let (key, default) = match expr.find(":-") {
                Some(idx) => (&expr[..idx], Some(&expr[idx + 2..])),
                None => (expr, None),
            };
            ctx.variables
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
                .or_else(|| default.map(str::to_string))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    let mut result = result.replace(&placeholder_input(), ctx.input);
    for (i, value) in step_values.iter().enumerate() {
        result = result.replace(&placeholder(i), value);
    }
    result
}

fn placeholder_input() -> String {
    "\u{0}INPUT\u{0}".to_string()
}

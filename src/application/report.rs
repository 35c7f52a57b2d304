//! Run report: one outcome per function of the closure.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Generated { artifacts: Vec<PathBuf> },
    Skipped { reason: String },
    Failed { category: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionOutcome {
    pub function: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub top: String,
    /// Closure in processing (dependency-first) order.
    pub closure: Vec<String>,
    /// Call edges that closed a cycle and were not followed.
    pub back_edges: Vec<(String, String)>,
    pub functions: Vec<FunctionOutcome>,
}

impl RunReport {
    pub fn new(top: &str) -> Self {
        Self {
            top: top.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, function: &str, outcome: Outcome) {
        self.functions.push(FunctionOutcome {
            function: function.to_string(),
            outcome,
        });
    }

    pub fn outcome_of(&self, function: &str) -> Option<&Outcome> {
        self.functions
            .iter()
            .find(|f| f.function == function)
            .map(|f| &f.outcome)
    }

    /// (generated, skipped, failed)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.functions.iter().fold((0, 0, 0), |(g, s, f), o| match o.outcome {
            Outcome::Generated { .. } => (g + 1, s, f),
            Outcome::Skipped { .. } => (g, s + 1, f),
            Outcome::Failed { .. } => (g, s, f + 1),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Top function: {}", self.top);
        let _ = writeln!(out, "Closure: {}", self.closure.join(" -> "));
        for (caller, callee) in &self.back_edges {
            let _ = writeln!(out, "Cycle edge not followed: {} -> {}", caller, callee);
        }
        for entry in &self.functions {
            match &entry.outcome {
                Outcome::Generated { artifacts } => {
                    let paths: Vec<String> = artifacts.iter().map(|p| p.display().to_string()).collect();
                    let _ = writeln!(out, "  [generated] {}: {}", entry.function, paths.join(", "));
                }
                Outcome::Skipped { reason } => {
                    let _ = writeln!(out, "  [skipped]   {}: {}", entry.function, reason);
                }
                Outcome::Failed { category, message } => {
                    let _ = writeln!(out, "  [failed]    {} ({}): {}", entry.function, category, message);
                }
            }
        }
        let (generated, skipped, failed) = self.counts();
        let _ = writeln!(out, "{} generated, {} skipped, {} failed", generated, skipped, failed);
        out
    }
}

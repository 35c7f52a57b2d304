// Use cases: run the capture-and-synthesis pipeline over a closure.

pub mod capture;
pub mod report;

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::domain::callgraph::{CallGraph, FunctionNode};
use crate::domain::closure::{self, ClosureOrder};
use crate::domain::error::{SynthError, SynthResult};
use crate::domain::synth;
use crate::infrastructure::WorkArea;
use crate::ports::{ArtifactExporter, Toolchain};

pub use capture::CaptureDriver;
pub use report::{FunctionOutcome, Outcome, RunReport};

/// Name of the program entry point, which is never given a driver.
pub const ENTRY_POINT: &str = "main";

pub struct GenerateUsecase<'a> {
    pub toolchain: &'a dyn Toolchain,
    pub exporter: &'a dyn ArtifactExporter,
    pub work_area: &'a WorkArea,
    pub word_size: u64,
}

impl<'a> GenerateUsecase<'a> {
    /// Process every function reachable from `top`, callees first.
    ///
    /// Only an unknown `top` is an error; per-function failures land in the
    /// report.
    pub fn run(&self, graph: &CallGraph, top: &str) -> Result<RunReport> {
        let closure = closure::resolve(graph, top)
            .ok_or_else(|| anyhow!("top function `{}` is not defined in the source", top))?;

        let mut report = RunReport::new(top);
        report.closure = closure.as_slice().to_vec();
        report.back_edges = closure.back_edges().to_vec();
        tracing::info!(top, functions = closure.len(), "[Closure] resolved");

        for name in closure.iter() {
            let Some(node) = graph.get(name) else {
                continue;
            };
            let outcome = self.process(graph, node);
            report.record(name, outcome);
        }
        Ok(report)
    }

    fn process(&self, graph: &CallGraph, node: &FunctionNode) -> Outcome {
        if node.name == ENTRY_POINT {
            return Outcome::Skipped {
                reason: "program entry point is not synthesized".to_string(),
            };
        }
        if let Some(reason) = &node.unsupported {
            tracing::warn!(function = %node.name, %reason, "[Synth] skipping unsupported function");
            return Outcome::Skipped { reason: reason.clone() };
        }

        tracing::info!(function = %node.name, "[Synth] generating test");
        match self.generate(graph, node) {
            Ok(artifacts) => Outcome::Generated { artifacts },
            Err(SynthError::Unsupported { reason, .. }) => Outcome::Skipped { reason },
            Err(e) => {
                tracing::error!(function = %node.name, category = e.category(), "[Synth] {}", e);
                Outcome::Failed {
                    category: e.category().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    fn generate(&self, graph: &CallGraph, node: &FunctionNode) -> SynthResult<Vec<PathBuf>> {
        let work_dir = self.work_area.function_dir(&node.name)?;
        // Closure unit holds only what this function reaches.
        let own_closure: ClosureOrder = closure::resolve(graph, &node.name).unwrap_or_default();
        // Units from an earlier run must not outlive a failed capture.
        self.exporter.discard(&node.name, &work_dir)?;

        let capture = CaptureDriver::new(self.toolchain, self.word_size).capture(node, &work_dir)?;
        let test = synth::synthesize(graph, &own_closure, node, &capture, self.word_size)?;
        self.exporter.export(&test, &work_dir)
    }
}

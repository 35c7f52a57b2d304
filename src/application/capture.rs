/// Capture session driver.
///
/// Per function: debug build, then the layout pass (only when the function
/// has pointer or array parameters), then the value pass. Each pass must
/// show the breakpoint being hit before its output is trusted.
use std::collections::HashMap;
use std::path::Path;

use crate::domain::callgraph::FunctionNode;
use crate::domain::debugger_text::{breakpoint_hit, parse_layouts, parse_values};
use crate::domain::error::{CaptureFailure, SynthError, SynthResult};
use crate::domain::layout::PointerLayout;
use crate::domain::script::DebugScript;
use crate::domain::synth::Capture;
use crate::ports::Toolchain;

pub struct CaptureDriver<'a> {
    toolchain: &'a dyn Toolchain,
    word_size: u64,
}

impl<'a> CaptureDriver<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, word_size: u64) -> Self {
        Self { toolchain, word_size }
    }

    pub fn capture(&self, node: &FunctionNode, work_dir: &Path) -> SynthResult<Capture> {
        let binary = self.toolchain.build_debug(&node.name, work_dir)?;

        let mut layouts = HashMap::new();
        if node.has_pointer_params() {
            let script = DebugScript::layout_pass(&binary, node);
            let transcript = self.session(node, &script, work_dir)?;
            layouts = parse_layouts(&transcript, &node.name, &node.params)?;
            for (name, layout) in &layouts {
                tracing::debug!(
                    function = %node.name,
                    param = %name,
                    region = ?layout.region,
                    base = format_args!("{:#x}", layout.base_address),
                    byte_offset = layout.byte_offset,
                    byte_size = layout.byte_size,
                    "[Capture] resolved pointer layout"
                );
            }
        }

        let script = DebugScript::value_pass(&binary, node, &layouts, self.word_size)?;
        let transcript = self.session(node, &script, work_dir)?;
        let values = parse_values(&transcript, &node.name, &node.params)?;

        for (param, value) in node.params.iter().zip(&values) {
            if let Some(layout) = layouts.get_mut(&param.name) {
                layout.element_count = Some(value.element_count());
                self.check_element_count(&node.name, &param.name, layout);
            }
        }

        Ok(Capture { values, layouts })
    }

    fn session(&self, node: &FunctionNode, script: &DebugScript, work_dir: &Path) -> SynthResult<String> {
        let transcript = self.toolchain.run_debugger(&node.name, script, work_dir)?;
        if !breakpoint_hit(&transcript, &node.name) {
            tracing::warn!(function = %node.name, pass = %script.pass, "[Capture] breakpoint never reached");
            return Err(SynthError::capture(&node.name, CaptureFailure::BreakpointNotHit));
        }
        Ok(transcript)
    }

    /// Dumps are taken in words, so element types of another width come
    /// back regrouped. Reported, not rejected.
    fn check_element_count(&self, function: &str, param: &str, layout: &PointerLayout) {
        if layout.element_type_size != self.word_size {
            tracing::warn!(
                function,
                param,
                element_size = layout.element_type_size,
                word_size = self.word_size,
                "[Capture] element size differs from dump word size; driver replays raw words"
            );
        } else if let (Some(expected), Some(actual)) = (layout.expected_element_count(), layout.element_count) {
            if expected != actual as u64 {
                tracing::warn!(function, param, expected, actual, "[Capture] element count mismatch");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::fixtures::node;
    use crate::domain::ctype::{ParamShape, ParameterDescriptor};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Replays canned transcripts, one per debugger run.
    struct Replay {
        transcripts: RefCell<Vec<String>>,
        passes: RefCell<Vec<String>>,
    }

    impl Replay {
        fn new(transcripts: &[&str]) -> Self {
            Self {
                transcripts: RefCell::new(transcripts.iter().rev().map(|s| s.to_string()).collect()),
                passes: RefCell::new(Vec::new()),
            }
        }
    }

    impl Toolchain for Replay {
        fn build_debug(&self, _function: &str, work_dir: &Path) -> SynthResult<PathBuf> {
            Ok(work_dir.join("to_debug"))
        }

        fn run_debugger(&self, _function: &str, script: &DebugScript, _work_dir: &Path) -> SynthResult<String> {
            self.passes.borrow_mut().push(script.pass.to_string());
            Ok(self.transcripts.borrow_mut().pop().unwrap_or_default())
        }
    }

    fn param(name: &str, shape: ParamShape) -> ParameterDescriptor {
        let type_prefix = if shape.is_pointer_like() { "int *" } else { "int" };
        ParameterDescriptor {
            name: name.to_string(),
            type_prefix: type_prefix.to_string(),
            type_suffix: String::new(),
            shape,
        }
    }

    #[test]
    fn test_scalar_function_skips_layout_pass() {
        let mut add = node("add", &[]);
        add.params = vec![param("a", ParamShape::Scalar), param("b", ParamShape::Scalar)];
        let replay = Replay::new(&["Breakpoint 1, add (a=2, b=3) at t.c:2\n$1 = 0x2\n$2 = 0x3\n"]);

        let capture = CaptureDriver::new(&replay, 4).capture(&add, Path::new("w")).unwrap();
        assert_eq!(*replay.passes.borrow(), ["values"]);
        assert_eq!(capture.values.len(), 2);
        assert!(capture.layouts.is_empty());
    }

    #[test]
    fn test_pointer_layout_then_values() {
        let mut sum = node("sum", &[]);
        sum.params = vec![
            param(
                "arr",
                ParamShape::Pointer {
                    pointee: "int".to_string(),
                },
            ),
            param("n", ParamShape::Scalar),
        ];
        let replay = Replay::new(&[
            "Breakpoint 1, sum (arr=0x602000000010, n=7) at t.c:2\n\
             0x602000000010 is located 0 bytes inside of 28-byte region [0x602000000010,0x60200000002c)\n\
             sizeof arr 4\n",
            "Breakpoint 1, sum (arr=0x602000000010, n=7) at t.c:2\n\
             $1 = {0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7}\n$2 = 0x7\n",
        ]);

        let capture = CaptureDriver::new(&replay, 4).capture(&sum, Path::new("w")).unwrap();
        assert_eq!(*replay.passes.borrow(), ["layout", "values"]);
        assert_eq!(capture.layouts["arr"].element_count, Some(7));
        assert_eq!(capture.values[0].element_count(), 7);
    }

    #[test]
    fn test_breakpoint_not_hit() {
        let mut f = node("unreached", &[]);
        f.params = vec![param("a", ParamShape::Scalar)];
        let replay = Replay::new(&["[Inferior 1 (process 7) exited normally]\n"]);
        let err = CaptureDriver::new(&replay, 4).capture(&f, Path::new("w")).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Capture {
                kind: CaptureFailure::BreakpointNotHit,
                ..
            }
        ));
    }
}

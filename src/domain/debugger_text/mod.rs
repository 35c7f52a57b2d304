//! Debugger Text Protocol
//!
//! The debugger and the sanitizer runtime only speak unstructured text. All
//! knowledge of that text lives here:
//! - `address`: sanitizer address descriptions and `sizeof` lines (layout pass)
//! - `results`: `$N = ...` results and value decomposition (value pass)
//! - `repeats`: `<repeats N times>` run-length notation
//!
//! The functions below bind that text to a function's parameters.

pub mod address;
pub mod repeats;
pub mod results;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::ctype::{ParamShape, ParameterDescriptor};
use crate::domain::error::{CaptureFailure, SynthError, SynthResult};
use crate::domain::layout::PointerLayout;
use crate::domain::value::CapturedValue;

static BREAKPOINT_HIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Breakpoint \d+, (?:0x[0-9a-fA-F]+ in )?([A-Za-z_][A-Za-z0-9_]*) \(")
        .unwrap_or_else(|e| panic!("regex: {e}"))
});

/// Whether the transcript shows the program stopped at `function`'s entry.
pub fn breakpoint_hit(transcript: &str, function: &str) -> bool {
    transcript.lines().any(|line| {
        BREAKPOINT_HIT
            .captures(line.trim())
            .map_or(false, |c| &c[1] == function)
    })
}

/// Resolve the layout of every pointer/array parameter of `function`.
///
/// The n-th address description belongs to the n-th pointer parameter.
pub fn parse_layouts(
    transcript: &str,
    function: &str,
    params: &[ParameterDescriptor],
) -> SynthResult<HashMap<String, PointerLayout>> {
    let report = address::parse_layout_report(transcript)
        .map_err(|kind| SynthError::capture(function, kind))?;

    let mut regions = report.regions.into_iter();
    let mut layouts = HashMap::new();
    for param in params.iter().filter(|p| p.shape.is_pointer_like()) {
        let region = regions.next().ok_or_else(|| {
            SynthError::capture(function, CaptureFailure::MissingLayout(param.name.clone()))
        })?;
        let element_size = *report.element_sizes.get(&param.name).ok_or_else(|| {
            SynthError::capture(function, CaptureFailure::MissingElementSize(param.name.clone()))
        })?;
        layouts.insert(param.name.clone(), PointerLayout::new(region, element_size));
    }
    Ok(layouts)
}

/// Decompose the value pass results, one value per parameter.
///
/// Parameter `i` is result `$i+1`. Pointer and array parameters must come
/// back as sequences; a struct or scalar parameter keeps whatever shape its
/// text has.
pub fn parse_values(
    transcript: &str,
    function: &str,
    params: &[ParameterDescriptor],
) -> SynthResult<Vec<CapturedValue>> {
    let results = results::collect_results(transcript);

    params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let text = results.get(&(i + 1)).ok_or_else(|| {
                SynthError::capture(
                    function,
                    CaptureFailure::MissingResult {
                        index: i + 1,
                        param: param.name.clone(),
                    },
                )
            })?;
            let parse_error = || SynthError::Parse {
                param: param.name.clone(),
                text: text.clone(),
            };
            let value = results::parse_value(text).map_err(|reason| {
                tracing::debug!(param = %param.name, %reason, "[Parse] rejected value");
                parse_error()
            })?;

            match (&param.shape, &value) {
                (ParamShape::Pointer { .. } | ParamShape::Array { .. }, CapturedValue::Sequence(_)) => Ok(value),
                (ParamShape::Pointer { .. } | ParamShape::Array { .. }, _) => Err(parse_error()),
                (ParamShape::Scalar | ParamShape::Struct { .. }, _) => Ok(value),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(name: &str) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            type_prefix: "int".to_string(),
            type_suffix: String::new(),
            shape: ParamShape::Scalar,
        }
    }

    fn pointer(name: &str) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            type_prefix: "int *".to_string(),
            type_suffix: String::new(),
            shape: ParamShape::Pointer {
                pointee: "int".to_string(),
            },
        }
    }

    #[test]
    fn test_breakpoint_detection() {
        let hit = "Breakpoint 1 at 0x1149: file add.c, line 3.\n\nBreakpoint 1, add (a=2, b=3) at add.c:3\n";
        assert!(breakpoint_hit(hit, "add"));
        assert!(!breakpoint_hit(hit, "ad"));
        let missed = "Breakpoint 1 at 0x1149: file add.c, line 3.\n[Inferior 1 (process 42) exited normally]\n";
        assert!(!breakpoint_hit(missed, "add"));
    }

    #[test]
    fn test_layouts_bound_in_pointer_order() {
        let params = vec![pointer("arr"), scalar("key"), pointer("arr2")];
        let text = "sizeof arr 4\nsizeof arr2 4\n\
            0x74bb80 is located 0 bytes inside of global variable 'array' defined in 'g.c:4' (0x74bb80) of size 80\n\
            0x5070000000a4 is located 20 bytes inside of 80-byte region [0x507000000090,0x5070000000e0)\n";
        let layouts = parse_layouts(text, "linearSearch", &params).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts["arr"].base_address, 0x74bb80);
        assert_eq!(layouts["arr2"].byte_offset, 20);
        assert_eq!(layouts["arr2"].element_offset, 5);
    }

    #[test]
    fn test_missing_description_is_capture_failure() {
        let params = vec![pointer("arr")];
        let err = parse_layouts("sizeof arr 4\n", "f", &params).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Capture {
                kind: CaptureFailure::MissingLayout(_),
                ..
            }
        ));
    }

    #[test]
    fn test_values_by_result_number() {
        let params = vec![pointer("arr"), scalar("n")];
        let text = "$1 = {0x1, 0x2, 0x3 <repeats 5 times>}\n$2 = 0x7\n";
        let values = parse_values(text, "sum", &params).unwrap();
        assert_eq!(values[0].element_count(), 7);
        assert_eq!(values[1], CapturedValue::scalar("0x7"));
    }

    #[test]
    fn test_pointer_must_be_sequence() {
        let params = vec![pointer("arr")];
        let err = parse_values("$1 = 0x7\n", "f", &params).unwrap_err();
        assert!(matches!(err, SynthError::Parse { .. }));
    }

    #[test]
    fn test_missing_result() {
        let params = vec![scalar("a"), scalar("b")];
        let err = parse_values("$1 = 0x2\n", "add", &params).unwrap_err();
        assert_eq!(err.category(), "capture");
    }
}

//! Test Synthesis
//!
//! Turns a function's captured argument values into two C compilation units:
//! - the closure unit: every function the target reaches, callees first
//! - the driver unit: a `main` that rebuilds the arguments as literals, calls
//!   the target and prints the return value and the post-call arguments

use std::collections::HashMap;

use crate::domain::callgraph::{CallGraph, FunctionNode, PreambleKind};
use crate::domain::closure::ClosureOrder;
use crate::domain::ctype::{ParamShape, ParameterDescriptor, ReturnKind};
use crate::domain::error::{SynthError, SynthResult};
use crate::domain::layout::PointerLayout;
use crate::domain::script::word_type;
use crate::domain::value::CapturedValue;

const INDENT: &str = "    ";
const STDIO: &str = "#include <stdio.h>";

/// The two generated sources for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedTest {
    pub function: String,
    pub closure_unit: String,
    pub driver_unit: String,
}

/// Everything captured for one invocation of a function.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub values: Vec<CapturedValue>,
    pub layouts: HashMap<String, PointerLayout>,
}

/// Driver-local identifier from `base` that names neither the target nor
/// one of its parameters.
fn fresh_name(base: &str, node: &FunctionNode) -> String {
    let mut name = base.to_string();
    while name == node.name || node.params.iter().any(|p| p.name == name) {
        name.push('_');
    }
    name
}

fn is_stdio_include(text: &str) -> bool {
    text.split_whitespace().collect::<String>() == STDIO.split_whitespace().collect::<String>()
}

/// Whether the declaration of record `type_name` has a `float` or `double`
/// member. Those members are dumped and replayed as raw hex.
fn record_has_floating_fields(graph: &CallGraph, type_name: &str) -> bool {
    let Some(tag) = type_name.split_whitespace().last() else {
        return false;
    };
    graph.preamble_of(&[PreambleKind::TypeDecl]).any(|item| {
        let words: Vec<&str> = item
            .text
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();
        words.contains(&tag) && words.iter().any(|w| *w == "float" || *w == "double")
    })
}

/// `int *` + `p` → `int *p`, `int` + `a` + `[4]` → `int a[4]`.
fn declarator(prefix: &str, name: &str, suffix: &str) -> String {
    if prefix.ends_with('*') {
        format!("{}{}{}", prefix, name, suffix)
    } else {
        format!("{} {}{}", prefix, name, suffix)
    }
}

/// Closure function definitions in dependency-first order.
///
/// Directives and types come first, then a prototype of every closure
/// function so calls inside a cycle are declared, then the remaining
/// prototypes and globals. Source prototypes of defined functions are left
/// out.
pub fn closure_unit(graph: &CallGraph, closure: &ClosureOrder) -> String {
    let members: Vec<&FunctionNode> = closure.iter().filter_map(|name| graph.get(name)).collect();
    let mut out = String::new();
    for item in graph.preamble_of(&[PreambleKind::Directive, PreambleKind::TypeDecl]) {
        out.push_str(&item.text);
        out.push('\n');
    }
    if !members.is_empty() {
        out.push('\n');
    }
    for node in &members {
        out.push_str(&node.prototype());
        out.push('\n');
    }
    for item in graph.preamble_of(&[PreambleKind::Prototype, PreambleKind::Global]) {
        if item.declares.as_deref().is_some_and(|name| graph.contains(name)) {
            continue;
        }
        out.push_str(&item.text);
        out.push('\n');
    }
    for node in members {
        out.push('\n');
        out.push_str(&node.definition());
        out.push('\n');
    }
    out
}

/// Driver unit for `node` from its captured values.
pub fn driver_unit(graph: &CallGraph, node: &FunctionNode, capture: &Capture, word_size: u64) -> SynthResult<String> {
    if capture.values.len() != node.params.len() {
        return Err(SynthError::Parse {
            param: node.name.clone(),
            text: format!(
                "{} values captured for {} parameters",
                capture.values.len(),
                node.params.len()
            ),
        });
    }

    let mut body: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    let ret_name = fresh_name("ret", node);
    let index = fresh_name("i", node);

    for (param, value) in node.params.iter().zip(&capture.values) {
        if let ParamShape::Struct { type_name } = &param.shape {
            if record_has_floating_fields(graph, type_name) {
                tracing::warn!(
                    function = %node.name,
                    param = %param.name,
                    "[Synth] floating members of `{}` are replayed and printed as integers",
                    type_name
                );
            }
        }
        body.push(declaration(param, value, word_size)?);
        args.push(argument(param, value, capture.layouts.get(&param.name)));
    }

    let call = format!("{}({})", node.name, args.join(", "));
    let ret = &node.return_type;
    match ret.kind {
        ReturnKind::Void => body.push(format!("{};", call)),
        kind => {
            body.push(format!("{};", declarator(&ret.spelled, &ret_name, "")));
            body.push(format!("{} = {};", ret_name, call));
            match kind {
                ReturnKind::Floating => body.push(format!("printf(\"%f\\n\", {});", ret_name)),
                ReturnKind::Pointer => body.push(format!("printf(\"%p\\n\", (void *) {});", ret_name)),
                ReturnKind::Struct => byte_dump(&ret_name, &index, &mut body),
                _ => body.push(format!("printf(\"%d\\n\", {});", ret_name)),
            }
        }
    }

    for (param, value) in node.params.iter().zip(&capture.values) {
        printer(&param.name, None, value, param.is_floating(), &index, &mut body);
    }
    body.push("return 0;".to_string());

    let mut out = format!("{}\n", STDIO);
    for item in graph.preamble_of(&[PreambleKind::Directive, PreambleKind::TypeDecl]) {
        if item.kind == PreambleKind::Directive && is_stdio_include(&item.text) {
            continue;
        }
        out.push_str(&item.text);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&node.prototype());
    out.push_str("\n\nint main(void) {\n");
    for line in body {
        for physical in line.lines() {
            out.push_str(INDENT);
            out.push_str(physical);
            out.push('\n');
        }
    }
    out.push_str("}\n");
    Ok(out)
}

/// Both units for `node`. Unsupported functions are rejected.
pub fn synthesize(
    graph: &CallGraph,
    closure: &ClosureOrder,
    node: &FunctionNode,
    capture: &Capture,
    word_size: u64,
) -> SynthResult<SynthesizedTest> {
    if let Some(reason) = &node.unsupported {
        return Err(SynthError::Unsupported {
            function: node.name.clone(),
            reason: reason.clone(),
        });
    }
    Ok(SynthesizedTest {
        function: node.name.clone(),
        closure_unit: closure_unit(graph, closure),
        driver_unit: driver_unit(graph, node, capture, word_size)?,
    })
}

fn declaration(param: &ParameterDescriptor, value: &CapturedValue, word_size: u64) -> SynthResult<String> {
    match (&param.shape, value) {
        (ParamShape::Pointer { .. } | ParamShape::Array { .. }, CapturedValue::Sequence(items)) => Ok(format!(
            "{} {}[{}] = {};",
            word_type(word_size),
            param.name,
            items.len(),
            value.to_initializer()
        )),
        (ParamShape::Pointer { .. } | ParamShape::Array { .. }, other) => Err(SynthError::Parse {
            param: param.name.clone(),
            text: other.to_initializer(),
        }),
        (ParamShape::Scalar | ParamShape::Struct { .. }, _) => Ok(format!(
            "{} = {};",
            declarator(&param.type_prefix, &param.name, &param.type_suffix),
            value.to_initializer()
        )),
    }
}

fn argument(param: &ParameterDescriptor, value: &CapturedValue, layout: Option<&PointerLayout>) -> String {
    match (&param.shape, param.call_cast()) {
        (ParamShape::Pointer { .. } | ParamShape::Array { .. }, Some(cast)) => {
            match layout.map(|l| l.byte_offset).filter(|&off| off > 0) {
                Some(offset) => format!("({}) ((unsigned char *) {} + {})", cast, param.name, offset),
                None => format!("({}) {}", cast, param.name),
            }
        }
        (ParamShape::Scalar, Some(cast)) if matches!(value, CapturedValue::Scalar(_)) => {
            format!("({}) {}", cast, param.name)
        }
        _ => param.name.clone(),
    }
}

/// Post-call dump of one value reachable through the C expression `expr`.
/// `index` is the loop variable for flat arrays.
fn printer(expr: &str, label: Option<&str>, value: &CapturedValue, floating: bool, index: &str, body: &mut Vec<String>) {
    match value {
        CapturedValue::Scalar(_) => {
            let format = if floating { "%f" } else { "%d" };
            match label {
                Some(label) => body.push(format!("printf(\"{} {}\\n\", {});", label, format, expr)),
                None => body.push(format!("printf(\"{}\\n\", {});", format, expr)),
            }
        }
        CapturedValue::Sequence(items) if items.iter().all(|i| matches!(i, CapturedValue::Scalar(_))) => {
            if let Some(label) = label {
                body.push(format!("printf(\"{} \");", label));
            }
            body.push(format!(
                "for (int {index} = 0; {index} < {}; {index}++) {{\n{}printf(\"%x \", {}[{index}]);\n}}",
                items.len(),
                INDENT,
                expr
            ));
            body.push("printf(\"\\n\");".to_string());
        }
        CapturedValue::Sequence(items) => {
            for (k, item) in items.iter().enumerate() {
                let child_label = format!("{}[{}]", label.unwrap_or(""), k);
                printer(&format!("{}[{}]", expr, k), Some(&child_label), item, floating, index, body);
            }
        }
        CapturedValue::Struct(fields) => {
            for (field, item) in fields {
                let child_label = match label {
                    Some(parent) => format!("{}.{}", parent, field),
                    None => field.clone(),
                };
                printer(&format!("{}.{}", expr, field), Some(&child_label), item, false, index, body);
            }
        }
    }
}

fn byte_dump(expr: &str, index: &str, body: &mut Vec<String>) {
    body.push(format!(
        "for (unsigned long {index} = 0; {index} < sizeof({expr}); {index}++) {{\n{INDENT}printf(\"%x \", ((unsigned char *) &{expr})[{index}]);\n}}"
    ));
    body.push("printf(\"\\n\");".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{PreambleItem, PreambleKind};
    use crate::domain::ctype::ReturnType;
    use crate::domain::layout::{RegionKind, ResolvedRegion};

    fn param(prefix: &str, name: &str, shape: ParamShape) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            type_prefix: prefix.to_string(),
            type_suffix: String::new(),
            shape,
        }
    }

    fn node(name: &str, ret: ReturnType, params: Vec<ParameterDescriptor>) -> FunctionNode {
        let list: Vec<String> = params
            .iter()
            .map(|p| declarator(&p.type_prefix, &p.name, &p.type_suffix))
            .collect();
        FunctionNode {
            name: name.to_string(),
            signature: format!("{} {}({})", ret.spelled, name, list.join(", ")),
            params,
            return_type: ret,
            body: "{ }".to_string(),
            callees: vec![],
            unsupported: None,
            line: 1,
        }
    }

    #[test]
    fn test_struct_initializer_and_printer_follow_field_order() {
        let rgb = node(
            "shade",
            ReturnType::void(),
            vec![param(
                "rgb",
                "color",
                ParamShape::Struct {
                    type_name: "rgb".to_string(),
                },
            )],
        );
        let graph = CallGraph::new(
            vec![rgb.clone()],
            vec![PreambleItem::new(
                PreambleKind::TypeDecl,
                "typedef struct { int red; int green; } rgb;",
            )],
        );
        let capture = Capture {
            values: vec![CapturedValue::Struct(vec![
                ("red".to_string(), CapturedValue::scalar("0xff")),
                ("green".to_string(), CapturedValue::scalar("0x0")),
            ])],
            layouts: HashMap::new(),
        };
        let driver = driver_unit(&graph, &rgb, &capture, 4).unwrap();
        assert!(driver.contains("typedef struct { int red; int green; } rgb;"));
        assert!(driver.contains("    rgb color = {0xff, 0x0};\n"));
        assert!(driver.contains("    shade(color);\n"));
        let red = driver.find("printf(\"red %d\\n\", color.red);").unwrap();
        let green = driver.find("printf(\"green %d\\n\", color.green);").unwrap();
        assert!(red < green);
    }

    #[test]
    fn test_interior_pointer_rebuilt_from_base() {
        let f = node(
            "scan",
            ReturnType::void(),
            vec![param(
                "int *",
                "p",
                ParamShape::Pointer {
                    pointee: "int".to_string(),
                },
            )],
        );
        let mut layouts = HashMap::new();
        let region = ResolvedRegion {
            kind: RegionKind::Heap,
            byte_offset: 20,
            byte_size: 12,
            base_address: 0x1000,
        };
        layouts.insert("p".to_string(), PointerLayout::new(region, 4));
        let capture = Capture {
            values: vec![CapturedValue::Sequence(vec![
                CapturedValue::scalar("0x1"),
                CapturedValue::scalar("0x2"),
                CapturedValue::scalar("0x3"),
            ])],
            layouts,
        };
        let graph = CallGraph::new(vec![f.clone()], vec![]);
        let driver = driver_unit(&graph, &f, &capture, 4).unwrap();
        assert!(driver.contains("unsigned int p[3] = {0x1, 0x2, 0x3};"));
        assert!(driver.contains("scan((int *) ((unsigned char *) p + 20));"));
    }

    #[test]
    fn test_struct_return_dumped_bytewise() {
        let f = node(
            "mk",
            ReturnType::new("rgb", ReturnKind::Struct),
            vec![],
        );
        let graph = CallGraph::new(vec![f.clone()], vec![]);
        let driver = driver_unit(&graph, &f, &Capture::default(), 4).unwrap();
        assert!(driver.contains("rgb ret;"));
        assert!(driver.contains("ret = mk();"));
        assert!(driver.contains("sizeof(ret)"));
    }

    #[test]
    fn test_unsupported_function_rejected() {
        let mut f = node("vlog", ReturnType::void(), vec![]);
        f.unsupported = Some("variadic parameter list".to_string());
        let graph = CallGraph::new(vec![f.clone()], vec![]);
        let closure = crate::domain::closure::resolve(&graph, "vlog").unwrap();
        let err = synthesize(&graph, &closure, &f, &Capture::default(), 4).unwrap_err();
        assert_eq!(err.category(), "unsupported");
    }

    #[test]
    fn test_driver_locals_avoid_parameter_names() {
        let f = node(
            "bump",
            ReturnType::new("int", ReturnKind::Integer),
            vec![
                param("int", "ret", ParamShape::Scalar),
                param(
                    "int *",
                    "i",
                    ParamShape::Pointer {
                        pointee: "int".to_string(),
                    },
                ),
            ],
        );
        let capture = Capture {
            values: vec![
                CapturedValue::scalar("0x2"),
                CapturedValue::Sequence(vec![CapturedValue::scalar("0x1"), CapturedValue::scalar("0x5")]),
            ],
            layouts: HashMap::new(),
        };
        let graph = CallGraph::new(vec![f.clone()], vec![]);
        let driver = driver_unit(&graph, &f, &capture, 4).unwrap();
        assert!(driver.contains("    int ret = 0x2;\n"));
        assert!(driver.contains("    int ret_;\n    ret_ = bump((int) ret, (int *) i);\n"));
        assert!(driver.contains("printf(\"%d\\n\", ret_);"));
        assert!(driver.contains("for (int i_ = 0; i_ < 2; i_++) {\n        printf(\"%x \", i[i_]);"));
        assert_eq!(driver.matches("int ret;").count(), 0);
    }

    #[test]
    fn test_driver_includes_stdio_once() {
        let f = node("noop", ReturnType::void(), vec![]);
        let graph = CallGraph::new(
            vec![f.clone()],
            vec![
                PreambleItem::new(PreambleKind::Directive, "#include  <stdio.h>"),
                PreambleItem::new(PreambleKind::Directive, "#include <stdlib.h>"),
            ],
        );
        let driver = driver_unit(&graph, &f, &Capture::default(), 4).unwrap();
        assert_eq!(driver.matches("stdio.h").count(), 1);
        assert!(driver.contains("#include <stdlib.h>"));
    }

    #[test]
    fn test_closure_unit_declares_every_member_first() {
        let mut even = node("is_even", ReturnType::new("int", ReturnKind::Integer), vec![]);
        even.callees = vec!["is_odd".to_string()];
        let mut odd = node("is_odd", ReturnType::new("int", ReturnKind::Integer), vec![]);
        odd.callees = vec!["is_even".to_string()];
        let mut declared = PreambleItem::new(PreambleKind::Prototype, "static int is_odd();");
        declared.declares = Some("is_odd".to_string());
        let graph = CallGraph::new(
            vec![even, odd],
            vec![
                declared,
                PreambleItem::new(PreambleKind::Global, "static int calls = 0;"),
            ],
        );
        let closure = crate::domain::closure::resolve(&graph, "is_even").unwrap();
        let unit = closure_unit(&graph, &closure);

        assert!(!unit.contains("static int is_odd"));
        let protos = unit.find("int is_odd();").unwrap().max(unit.find("int is_even();").unwrap());
        let first_def = unit.find("int is_odd() {").unwrap().min(unit.find("int is_even() {").unwrap());
        assert!(protos < first_def);
        assert!(unit.contains("static int calls = 0;"));
    }

    #[test]
    fn test_floating_record_members_detected() {
        let graph = CallGraph::new(
            vec![],
            vec![
                PreambleItem::new(PreambleKind::TypeDecl, "typedef struct { float w; int h; } box;"),
                PreambleItem::new(PreambleKind::TypeDecl, "struct px { int x; };"),
            ],
        );
        assert!(record_has_floating_fields(&graph, "box"));
        assert!(!record_has_floating_fields(&graph, "struct px"));
    }

    #[test]
    fn test_value_count_mismatch_rejected() {
        let f = node("add", ReturnType::new("int", ReturnKind::Integer), vec![param("int", "a", ParamShape::Scalar)]);
        let graph = CallGraph::new(vec![f.clone()], vec![]);
        assert!(driver_unit(&graph, &f, &Capture::default(), 4).is_err());
    }
}

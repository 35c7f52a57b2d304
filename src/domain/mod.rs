// Domain model: call graph, closure, captured values and synthesis.

pub mod callgraph;
pub mod closure;
pub mod ctype;
pub mod debugger_text;
pub mod error;
pub mod layout;
pub mod script;
pub mod synth;
pub mod value;

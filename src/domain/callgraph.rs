// Call graph structures for the test synthesizer.
// One `CallGraph` is built per invocation and then only borrowed.

use std::collections::HashMap;

use crate::domain::ctype::{ParameterDescriptor, ReturnType};

/// A function definition found in the translation unit.
#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<ParameterDescriptor>,
    pub return_type: ReturnType,
    /// Header up to the closing parenthesis, storage-class keywords removed.
    pub signature: String,
    /// Body from `{` to `}` as written in the source.
    pub body: String,
    /// Direct callees in order of first appearance, without duplicates.
    pub callees: Vec<String>,
    /// Why this function cannot be synthesized, if it cannot.
    pub unsupported: Option<String>,
    pub line: usize,
}

impl FunctionNode {
    /// Definition as emitted into a closure unit.
    pub fn definition(&self) -> String {
        format!("{} {}", self.signature, self.body)
    }

    pub fn prototype(&self) -> String {
        format!("{};", self.signature)
    }

    pub fn has_pointer_params(&self) -> bool {
        self.params.iter().any(|p| p.shape.is_pointer_like())
    }
}

/// Top-level source items that are not function definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreambleKind {
    /// `#include`, `#define`, `#undef`.
    Directive,
    /// `typedef ...;`, `struct X {...};`, `enum E {...};`.
    TypeDecl,
    /// A function declaration without body.
    Prototype,
    /// A global object definition or `extern` declaration.
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreambleItem {
    pub kind: PreambleKind,
    pub text: String,
    /// Function named by a `Prototype` item.
    pub declares: Option<String>,
}

impl PreambleItem {
    pub fn new(kind: PreambleKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            declares: None,
        }
    }
}

/// The call graph itself, with everything synthesis needs from the source.
#[derive(Debug, Default)]
pub struct CallGraph {
    pub nodes: Vec<FunctionNode>,
    pub preamble: Vec<PreambleItem>,
    index: HashMap<String, usize>,
}

impl CallGraph {
    /// Later definitions of an already-seen name are ignored.
    pub fn new(nodes: Vec<FunctionNode>, preamble: Vec<PreambleItem>) -> Self {
        let mut index = HashMap::new();
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if index.contains_key(&node.name) {
                continue;
            }
            index.insert(node.name.clone(), kept.len());
            kept.push(node);
        }
        Self {
            nodes: kept,
            preamble,
            index,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FunctionNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn preamble_of(&self, kinds: &[PreambleKind]) -> impl Iterator<Item = &PreambleItem> + '_ {
        let kinds = kinds.to_vec();
        self.preamble.iter().filter(move |p| kinds.contains(&p.kind))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::ctype::ReturnType;

    /// A parameterless `void` node calling `callees`.
    pub fn node(name: &str, callees: &[&str]) -> FunctionNode {
        FunctionNode {
            name: name.to_string(),
            params: vec![],
            return_type: ReturnType::void(),
            signature: format!("void {}(void)", name),
            body: "{ }".to_string(),
            callees: callees.iter().map(|c| c.to_string()).collect(),
            unsupported: None,
            line: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::node;
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let cg = CallGraph::new(vec![node("main", &["foo"]), node("foo", &[])], vec![]);
        assert!(cg.contains("foo"));
        assert!(!cg.contains("printf"));
        assert_eq!(cg.get("main").map(|n| n.callees.clone()), Some(vec!["foo".to_string()]));
    }

    #[test]
    fn test_duplicate_definition_keeps_first() {
        let mut second = node("foo", &["bar"]);
        second.line = 10;
        let cg = CallGraph::new(vec![node("foo", &[]), second], vec![]);
        assert_eq!(cg.nodes.len(), 1);
        assert!(cg.get("foo").map(|n| n.callees.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_definition_and_prototype() {
        let n = node("foo", &[]);
        assert_eq!(n.definition(), "void foo(void) { }");
        assert_eq!(n.prototype(), "void foo(void);");
    }
}

//! Call-graph builder for C translation units
//!
//! Works on the token stream of [`super::c_lexer`] and only understands as
//! much C as test synthesis needs:
//!
//! ```text
//! unit        ::= (directive | declaration | function_def)*
//! function_def::= specifiers declarator "(" params ")" "{" body "}"
//! declaration ::= tokens ";"       (typedef, struct/enum, prototype, global)
//! param       ::= type-prefix name dims?
//! ```
//!
//! Bodies are never parsed; only `ident (` sequences are collected as call
//! targets. Function text is sliced from the original source by token spans.
//!
//! Preprocessor output is read through its line markers (`# 12 "prog.c" 2`):
//! only items from the main file become nodes or preamble items, while
//! header typedefs still teach the parser which names are records.

use std::collections::HashSet;

use super::c_lexer::{tokenize, Token, TokenKind};
use crate::domain::callgraph::{CallGraph, FunctionNode, PreambleItem, PreambleKind};
use crate::domain::ctype::{ParamShape, ParameterDescriptor, ReturnKind, ReturnType};
use crate::domain::error::SourceError;
use crate::ports::CallGraphBuilder;

const STORAGE_WORDS: [&str; 8] = [
    "static",
    "extern",
    "inline",
    "__inline",
    "__inline__",
    "register",
    "_Noreturn",
    "__extension__",
];

const TYPE_WORDS: [&str; 22] = [
    "void",
    "char",
    "short",
    "int",
    "long",
    "float",
    "double",
    "signed",
    "unsigned",
    "_Bool",
    "bool",
    "_Complex",
    "const",
    "volatile",
    "restrict",
    "__restrict",
    "__restrict__",
    "__const",
    "__volatile__",
    "struct",
    "union",
    "enum",
];

/// Words followed by `(` that are not calls.
const NON_CALL_WORDS: [&str; 21] = [
    "if",
    "while",
    "for",
    "switch",
    "return",
    "sizeof",
    "_Alignof",
    "alignof",
    "typeof",
    "__typeof__",
    "__attribute__",
    "__asm__",
    "__asm",
    "asm",
    "_Generic",
    "_Static_assert",
    "do",
    "else",
    "case",
    "defined",
    "__builtin_offsetof",
];

const QUALIFIERS: [&str; 7] = [
    "const",
    "volatile",
    "restrict",
    "__restrict",
    "__restrict__",
    "__const",
    "__volatile__",
];

fn is_type_word(t: &Token) -> bool {
    t.is_ident() && TYPE_WORDS.contains(&t.text.as_str())
}

fn is_storage_word(t: &Token) -> bool {
    t.is_ident() && STORAGE_WORDS.contains(&t.text.as_str())
}

/// Join type tokens: `const int *`, `int **`, `struct point`.
fn spell(tokens: &[Token]) -> String {
    let mut out = String::new();
    for t in tokens {
        if t.is_punct("*") {
            if !out.is_empty() && !out.ends_with('*') {
                out.push(' ');
            }
            out.push('*');
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&t.text);
        }
    }
    out
}

/// Join declarator suffix tokens tightly: `[][20]`, `[N+1]`.
fn spell_tight(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for t in tokens {
        let word = matches!(t.kind, TokenKind::Ident | TokenKind::Number);
        if word && prev_word {
            out.push(' ');
        }
        out.push_str(&t.text);
        prev_word = word;
    }
    out
}

/// Keyword of a directive line: `# include <x>` → `include`.
fn directive_keyword(text: &str) -> &str {
    text.trim_start_matches('#')
        .trim_start()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or("")
}

/// A preprocessor line marker: `# 12 "prog.c" 2` or `#line 12 "prog.c"`.
#[derive(Debug, PartialEq, Eq)]
struct LineMarker {
    line: usize,
    file: String,
    flags: Vec<u8>,
}

fn line_marker(text: &str) -> Option<LineMarker> {
    let rest = text.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("line").map(str::trim_start).unwrap_or(rest);
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let line = rest[..digits].parse().ok()?;
    let rest = rest[digits..].trim_start().strip_prefix('"')?;
    let close = rest.find('"')?;
    let flags = rest[close + 1..]
        .split_whitespace()
        .filter_map(|f| f.parse().ok())
        .collect();
    Some(LineMarker {
        line,
        file: rest[..close].to_string(),
        flags,
    })
}

/// Split at top-level commas, ignoring commas inside parentheses/brackets.
fn split_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
            depth += 1;
        } else if t.is_punct(")") || t.is_punct("]") || t.is_punct("}") {
            depth -= 1;
        } else if t.is_punct(",") && depth == 0 {
            groups.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    groups.push(&tokens[start..]);
    groups
}

/// Parser state for one translation unit.
struct UnitParser<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    /// Typedef names that alias a struct or union.
    record_types: HashSet<String>,
    nodes: Vec<FunctionNode>,
    preamble: Vec<PreambleItem>,
    /// File named by the first line marker, if the input has markers.
    main_file: Option<String>,
    in_main: bool,
    /// Main-file lines whose `#include` was expanded.
    expanded_includes: HashSet<usize>,
    /// Token line of the last main-file marker and the source line it names.
    line_origin: Option<(usize, usize)>,
}

impl<'s> UnitParser<'s> {
    fn new(src: &'s str) -> Result<Self, SourceError> {
        Ok(Self {
            src,
            tokens: tokenize(src)?,
            record_types: HashSet::new(),
            nodes: Vec::new(),
            preamble: Vec::new(),
            main_file: None,
            in_main: true,
            expanded_includes: HashSet::new(),
            line_origin: None,
        })
    }

    /// Build the graph. With `original`, the input is its preprocessor output
    /// and the `#include` lines it expanded are taken back from `original`.
    fn parse(mut self, original: Option<&str>) -> Result<CallGraph, SourceError> {
        self.scan()?;
        let mut preamble = match original {
            Some(original) => self.original_includes(original)?,
            None => Vec::new(),
        };
        preamble.append(&mut self.preamble);
        Ok(CallGraph::new(self.nodes, preamble))
    }

    fn scan(&mut self) -> Result<(), SourceError> {
        let mut i = 0;
        while i < self.tokens.len() {
            let tok = &self.tokens[i];
            if tok.kind == TokenKind::Directive {
                let (text, line) = (tok.text.clone(), tok.line);
                self.directive(text, line);
                i += 1;
                continue;
            }
            if tok.is_punct(";") {
                i += 1;
                continue;
            }
            i = self.top_level_item(i)?;
        }
        Ok(())
    }

    fn directive(&mut self, text: String, line: usize) {
        if let Some(marker) = line_marker(&text) {
            let main = self.main_file.get_or_insert_with(|| marker.file.clone());
            self.in_main = marker.file == *main;
            if self.in_main {
                // Flag 2: back in this file after the `#include` on the previous line.
                if marker.flags.contains(&2) {
                    self.expanded_includes.insert(marker.line.saturating_sub(1));
                }
                self.line_origin = Some((line, marker.line));
            }
            return;
        }
        if self.in_main && matches!(directive_keyword(&text), "include" | "define" | "undef") {
            self.preamble.push(PreambleItem::new(PreambleKind::Directive, text));
        }
    }

    /// `#include` lines of `original` that the preprocessor actually expanded.
    /// Without line markers every include is kept.
    fn original_includes(&self, original: &str) -> Result<Vec<PreambleItem>, SourceError> {
        let items = tokenize(original)?
            .into_iter()
            .filter(|t| t.kind == TokenKind::Directive && directive_keyword(&t.text) == "include")
            .filter(|t| self.main_file.is_none() || self.expanded_includes.contains(&t.line))
            .map(|t| PreambleItem::new(PreambleKind::Directive, t.text))
            .collect();
        Ok(items)
    }

    /// Line in the file the tokens came from.
    fn source_line(&self, line: usize) -> usize {
        match self.line_origin {
            Some((at, origin)) => origin + line.saturating_sub(at + 1),
            None => line,
        }
    }

    /// Consume one declaration or function definition starting at `start`.
    /// Returns the index after it.
    fn top_level_item(&mut self, start: usize) -> Result<usize, SourceError> {
        let mut depth = 0i32;
        let mut saw_assign = false;
        let mut j = start;

        loop {
            let Some(t) = self.tokens.get(j) else {
                return Err(SourceError::Parse {
                    line: self.tokens[start].line,
                    message: "declaration is not terminated".to_string(),
                });
            };
            if t.kind != TokenKind::Punct {
                j += 1;
                continue;
            }
            let punct = t.text.clone();
            match punct.as_str() {
                "(" | "[" => depth += 1,
                ")" | "]" => depth -= 1,
                "=" if depth == 0 => saw_assign = true,
                ";" if depth == 0 => {
                    self.declaration(start, j);
                    return Ok(j + 1);
                }
                "{" if depth == 0 => {
                    let close = self.matching_brace(j)?;
                    if !saw_assign && j > start && self.tokens[j - 1].is_punct(")") {
                        self.function(start, j, close);
                        return Ok(close + 1);
                    }
                    j = close;
                }
                _ => {}
            }
            j += 1;
        }
    }

    fn matching_brace(&self, open: usize) -> Result<usize, SourceError> {
        let mut depth = 0usize;
        for (k, t) in self.tokens.iter().enumerate().skip(open) {
            if t.is_punct("{") {
                depth += 1;
            } else if t.is_punct("}") {
                depth -= 1;
                if depth == 0 {
                    return Ok(k);
                }
            }
        }
        Err(SourceError::Parse {
            line: self.tokens[open].line,
            message: "unbalanced braces".to_string(),
        })
    }

    /// Source text of tokens `first..=last`, line markers left out.
    fn slice(&self, first: usize, last: usize) -> String {
        let mut out = String::new();
        let mut at = self.tokens[first].start;
        for t in &self.tokens[first..=last] {
            if t.kind == TokenKind::Directive && line_marker(&t.text).is_some() {
                out.push_str(&self.src[at..t.start]);
                at = t.end;
            }
        }
        out.push_str(&self.src[at..self.tokens[last].end]);
        out
    }

    /// Non-function declaration ending with the `;` at `end`.
    fn declaration(&mut self, start: usize, end: usize) {
        let toks: Vec<&Token> = self.tokens[start..=end]
            .iter()
            .filter(|t| t.kind != TokenKind::Directive && !t.is_word("__extension__"))
            .collect();
        let Some(first) = toks.first() else {
            return;
        };
        let declares = Self::prototype_name(&toks);

        let kind = if first.is_word("typedef") {
            let aliases = Self::record_typedef_names(&toks);
            self.record_types.extend(aliases);
            PreambleKind::TypeDecl
        } else if matches!(first.text.as_str(), "struct" | "union" | "enum")
            && toks.len() >= 2
            && (toks[toks.len() - 2].is_punct("}") || toks.len() == 3)
        {
            PreambleKind::TypeDecl
        } else if declares.is_some() {
            PreambleKind::Prototype
        } else {
            PreambleKind::Global
        };
        if !self.in_main {
            return;
        }

        let mut item = PreambleItem::new(kind, self.slice(start, end));
        item.declares = declares.filter(|_| kind == PreambleKind::Prototype);
        self.preamble.push(item);
    }

    /// Names declared by `typedef struct ... Name;` (pointer typedefs excluded).
    fn record_typedef_names(toks: &[&Token]) -> Vec<String> {
        let mut names = Vec::new();
        let mut brace_depth = 0i32;
        let mut paren_depth = 0i32;
        let mut is_record = false;
        for (k, t) in toks.iter().enumerate() {
            if brace_depth == 0 && (t.is_word("struct") || t.is_word("union")) {
                is_record = true;
            }
            match t.text.as_str() {
                "{" if t.kind == TokenKind::Punct => brace_depth += 1,
                "}" if t.kind == TokenKind::Punct => brace_depth -= 1,
                "(" if t.kind == TokenKind::Punct => paren_depth += 1,
                ")" if t.kind == TokenKind::Punct => paren_depth -= 1,
                "," | ";" if t.kind == TokenKind::Punct && brace_depth == 0 && paren_depth == 0 && is_record => {
                    if k >= 2 && toks[k - 1].is_ident() && !toks[k - 2].is_punct("*") {
                        names.push(toks[k - 1].text.clone());
                    }
                }
                _ => {}
            }
        }
        names
    }

    /// Name of the function a body-less declaration declares, if it is one.
    fn prototype_name(toks: &[&Token]) -> Option<String> {
        for (k, t) in toks.iter().enumerate() {
            if t.is_punct("=") {
                return None;
            }
            if t.is_punct("(") {
                return (k > 0 && toks[k - 1].is_ident() && !is_type_word(toks[k - 1]))
                    .then(|| toks[k - 1].text.clone());
            }
        }
        None
    }

    /// Function definition: header `start..lbrace`, body `lbrace..=rbrace`.
    fn function(&mut self, start: usize, lbrace: usize, rbrace: usize) {
        if !self.in_main {
            return;
        }
        let header = &self.tokens[start..lbrace];
        let mut depth = 0i32;
        let mut open = None;
        for (k, t) in header.iter().enumerate() {
            if t.is_punct("(") {
                if depth == 0
                    && k > 0
                    && header[k - 1].is_ident()
                    && !NON_CALL_WORDS.contains(&header[k - 1].text.as_str())
                {
                    open = Some(k);
                    break;
                }
                depth += 1;
            } else if t.is_punct(")") {
                depth -= 1;
            }
        }
        let Some(open) = open else {
            tracing::debug!(line = header[0].line, "[Parse] braced item without declarator, ignored");
            return;
        };
        let Some(close) = Self::matching_paren(header, open) else {
            return;
        };

        let name = header[open - 1].text.clone();
        let ret_tokens: Vec<Token> = header[..open - 1]
            .iter()
            .filter(|t| !is_storage_word(t))
            .cloned()
            .collect();
        let return_type = self.return_type(&ret_tokens);
        let (params, unsupported) = self.parameters(&name, &header[open + 1..close]);

        let sig_first = (0..open - 1)
            .find(|&k| !is_storage_word(&header[k]))
            .unwrap_or(open - 1);

        let node = FunctionNode {
            signature: self.slice(start + sig_first, start + close),
            body: self.slice(lbrace, rbrace),
            callees: self.callees(lbrace + 1, rbrace),
            line: self.source_line(header[0].line),
            name,
            params,
            return_type,
            unsupported,
        };
        self.nodes.push(node);
    }

    fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
        let mut depth = 0i32;
        for (k, t) in tokens.iter().enumerate().skip(open) {
            if t.is_punct("(") {
                depth += 1;
            } else if t.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
            }
        }
        None
    }

    fn return_type(&self, tokens: &[Token]) -> ReturnType {
        let spelled = spell(tokens);
        let words: Vec<&str> = tokens
            .iter()
            .filter(|t| !(t.is_ident() && QUALIFIERS.contains(&t.text.as_str())))
            .map(|t| t.text.as_str())
            .collect();

        let kind = if tokens.iter().any(|t| t.is_punct("*")) {
            ReturnKind::Pointer
        } else if words == ["void"] {
            ReturnKind::Void
        } else if words.iter().any(|w| *w == "float" || *w == "double") {
            ReturnKind::Floating
        } else if self.is_record(tokens) {
            ReturnKind::Struct
        } else {
            ReturnKind::Integer
        };
        ReturnType::new(spelled, kind)
    }

    fn is_record(&self, tokens: &[Token]) -> bool {
        tokens.iter().any(|t| {
            t.is_word("struct") || t.is_word("union") || (t.is_ident() && self.record_types.contains(&t.text))
        })
    }

    /// Parameter descriptors plus the first reason the list is unsupported.
    fn parameters(&self, function: &str, tokens: &[Token]) -> (Vec<ParameterDescriptor>, Option<String>) {
        let mut params = Vec::new();
        let mut unsupported = None;
        let groups = split_commas(tokens);

        if groups.len() == 1 && (groups[0].is_empty() || (groups[0].len() == 1 && groups[0][0].is_word("void"))) {
            return (params, None);
        }

        for group in groups {
            match self.parameter(group) {
                Ok(param) => params.push(param),
                Err(reason) => {
                    tracing::debug!(function, %reason, "[Parse] unsupported parameter");
                    unsupported.get_or_insert(reason);
                }
            }
        }
        (params, unsupported)
    }

    fn parameter(&self, group: &[Token]) -> Result<ParameterDescriptor, String> {
        if group.len() == 1 && group[0].is_punct("...") {
            return Err("variadic parameter list".to_string());
        }
        if group.iter().any(|t| t.is_punct("(")) {
            return Err(format!("function pointer parameter `{}`", spell(group)));
        }

        let first_bracket = group.iter().position(|t| t.is_punct("["));
        let name_idx = match first_bracket {
            Some(b) => b.checked_sub(1),
            None => group.len().checked_sub(1),
        }
        .filter(|&k| k >= 1 && group[k].is_ident() && !is_type_word(&group[k]))
        .ok_or_else(|| format!("unnamed parameter `{}`", spell(group)))?;

        let prefix = &group[..name_idx];
        let suffix = &group[name_idx + 1..];

        let shape = if !suffix.is_empty() {
            let first_close = suffix
                .iter()
                .position(|t| t.is_punct("]"))
                .ok_or_else(|| format!("malformed array declarator `{}`", spell(group)))?;
            ParamShape::Array {
                element: spell(prefix),
                inner_dims: spell_tight(&suffix[first_close + 1..]),
            }
        } else if let Some(star) = prefix.iter().rposition(|t| t.is_punct("*")) {
            ParamShape::Pointer {
                pointee: spell(&prefix[..star]),
            }
        } else if self.is_record(prefix) {
            let unqualified: Vec<Token> = prefix
                .iter()
                .filter(|t| !QUALIFIERS.contains(&t.text.as_str()))
                .cloned()
                .collect();
            ParamShape::Struct {
                type_name: spell(&unqualified),
            }
        } else {
            ParamShape::Scalar
        };

        Ok(ParameterDescriptor {
            name: group[name_idx].text.clone(),
            type_prefix: spell(prefix),
            type_suffix: spell_tight(suffix),
            shape,
        })
    }

    /// Distinct `ident (` call targets inside a body, in order of appearance.
    fn callees(&self, from: usize, to: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for k in from..to.saturating_sub(1) {
            let t = &self.tokens[k];
            if !t.is_ident() || !self.tokens[k + 1].is_punct("(") {
                continue;
            }
            if is_type_word(t) || NON_CALL_WORDS.contains(&t.text.as_str()) {
                continue;
            }
            if k > 0 && (self.tokens[k - 1].is_punct(".") || self.tokens[k - 1].is_punct("->")) {
                continue;
            }
            if seen.insert(t.text.clone()) {
                out.push(t.text.clone());
            }
        }
        out
    }
}

/// Parse a C translation unit into a call graph.
pub fn parse_translation_unit(src: &str) -> Result<CallGraph, SourceError> {
    UnitParser::new(src)?.parse(None)
}

/// Parse the preprocessor output `expanded` of `original`.
///
/// Macros and conditionals are already resolved in `expanded`; the headers it
/// pulled in are represented by the `#include` lines of `original`.
pub fn parse_preprocessed(expanded: &str, original: &str) -> Result<CallGraph, SourceError> {
    UnitParser::new(expanded)?.parse(Some(original))
}

/// Call-graph builder backed by the built-in C front end.
#[derive(Debug, Default, Clone)]
pub struct CSourceParser {
    original: Option<String>,
}

impl CSourceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for the preprocessor output of `original`.
    pub fn for_expansion_of(original: impl Into<String>) -> Self {
        Self {
            original: Some(original.into()),
        }
    }
}

impl CallGraphBuilder for CSourceParser {
    fn build_call_graph(&self, source: &str) -> Result<CallGraph, SourceError> {
        match &self.original {
            Some(original) => parse_preprocessed(source, original),
            None => parse_translation_unit(source),
        }
    }
}

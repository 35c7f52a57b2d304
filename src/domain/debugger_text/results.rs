//! Value-pass transcript parsing.
//!
//! Every `print` issued by the value pass produces a `$N = <value>` result,
//! numbered sequentially from 1 in query order. A value with unbalanced braces
//! continues on the following physical lines.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::repeats::{expand_elements, split_elements};
use crate::domain::value::CapturedValue;

static RESULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(\d+) = (.*)$").unwrap_or_else(|e| panic!("regex: {e}")));

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*) = (.*)$").unwrap_or_else(|e| panic!("regex: {e}"))
});

fn brace_balance(text: &str) -> i64 {
    text.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Collect `$N` results keyed by `N`, joining continuation lines.
pub fn collect_results(transcript: &str) -> BTreeMap<usize, String> {
    let lines: Vec<&str> = transcript.lines().collect();
    let mut results = BTreeMap::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = RESULT.captures(lines[i].trim_end()) else {
            i += 1;
            continue;
        };
        let Ok(index) = caps[1].parse::<usize>() else {
            i += 1;
            continue;
        };

        let mut value = caps[2].trim().to_string();
        i += 1;
        while brace_balance(&value) > 0 && i < lines.len() && !RESULT.is_match(lines[i]) {
            let next = lines[i].trim();
            if !next.is_empty() {
                if !value.ends_with(['{', ' ']) {
                    value.push(' ');
                }
                value.push_str(next);
            }
            i += 1;
        }
        results.insert(index, value);
    }
    results
}

/// Decompose one printed value into scalar, sequence or struct.
///
/// A braced group whose elements are all `field = value` is a struct; any
/// other braced group is a sequence with its run-length notation expanded.
/// Everything else is a scalar literal kept verbatim.
pub fn parse_value(text: &str) -> Result<CapturedValue, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty value".to_string());
    }
    if brace_balance(text) != 0 {
        return Err("unbalanced braces".to_string());
    }

    let Some(inner) = text.strip_prefix('{') else {
        if text.contains('{') {
            return Err("braced group inside scalar".to_string());
        }
        return Ok(CapturedValue::Scalar(text.to_string()));
    };
    let inner = inner
        .strip_suffix('}')
        .ok_or_else(|| "trailing text after braced group".to_string())?;

    let elements = split_elements(inner);
    let fields: Vec<Option<(String, &str)>> = elements
        .iter()
        .map(|e| {
            FIELD
                .captures(e)
                .and_then(|c| Some((c.get(1)?.as_str().to_string(), c.get(2)?.as_str())))
        })
        .collect();

    if !fields.is_empty() && fields.iter().all(Option::is_some) {
        let mut out = Vec::with_capacity(fields.len());
        for (name, value) in fields.into_iter().flatten() {
            out.push((name, parse_value(value)?));
        }
        return Ok(CapturedValue::Struct(out));
    }
    if fields.iter().any(Option::is_some) {
        return Err("mixed named and positional elements".to_string());
    }

    let mut items = Vec::new();
    for element in expand_elements(&elements) {
        if element.is_empty() {
            return Err("empty list element".to_string());
        }
        items.push(parse_value(element)?);
    }
    Ok(CapturedValue::Sequence(items))
}

//! Run-length notation used by the debugger for repeated array elements.
//!
//! `{0x0, 0x1 <repeats 4 times>, 0x2}` stands for
//! `{0x0, 0x1, 0x1, 0x1, 0x1, 0x2}`. The compressed element may be the only,
//! first, middle or last element of a list, and may itself be a braced group.

use once_cell::sync::Lazy;
use regex::Regex;

static REPEAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.*?)\s*<repeats (\d+) times>$").unwrap_or_else(|e| panic!("regex: {e}"))
});

/// Split the inside of a braced list at top-level commas.
///
/// Commas nested in braces, brackets, parentheses or quotes do not split.
/// Elements are trimmed; an all-blank input yields no elements.
pub fn split_elements(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in inner.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = inner[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// If `element` is `<value> <repeats N times>`, return `(value, N)`.
pub fn parse_repeat(element: &str) -> Option<(&str, usize)> {
    let caps = REPEAT.captures(element.trim())?;
    let value = caps.get(1)?.as_str().trim();
    if value.is_empty() {
        return None;
    }
    let times = caps.get(2)?.as_str().parse().ok()?;
    Some((value, times))
}

/// Expand every compressed element in place.
pub fn expand_elements<'a>(elements: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(elements.len());
    for &element in elements {
        match parse_repeat(element) {
            Some((value, times)) => out.extend(std::iter::repeat(value).take(times)),
            None => out.push(element),
        }
    }
    out
}

/// Expand the run-length notation in a braced list literal, recursing into
/// nested groups. Text without the notation is returned unchanged.
pub fn expand_repeats(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.contains("<repeats") {
        return text.to_string();
    }
    let Some(inner) = trimmed.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return text.to_string();
    };

    let expanded: Vec<String> = expand_elements(&split_elements(inner))
        .into_iter()
        .map(|e| if e.starts_with('{') { expand_repeats(e) } else { e.to_string() })
        .collect();
    format!("{{{}}}", expanded.join(", "))
}

/// Compress runs of at least `threshold` identical top-level elements.
/// Inverse of [`expand_repeats`] for lists produced with the same threshold.
pub fn collapse_repeats(text: &str, threshold: usize) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return text.to_string();
    };
    let elements = split_elements(inner);
    let threshold = threshold.max(2);

    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < elements.len() {
        let mut run = 1;
        while i + run < elements.len() && elements[i + run] == elements[i] {
            run += 1;
        }
        if run >= threshold {
            out.push(format!("{} <repeats {} times>", elements[i], run));
        } else {
            out.extend(elements[i..i + run].iter().map(|e| e.to_string()));
        }
        i += run;
    }
    format!("{{{}}}", out.join(", "))
}

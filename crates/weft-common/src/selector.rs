//! Rewrites the jQuery-flavoured pseudo-selectors found in flow files into
//! the dialect the page driver understands.
//!
//! Handled forms:
//! - `prefix:contains('text')` becomes `prefix:has-text('text')`
//! - `:contains('text')` with no prefix becomes the pure text match `text=text`
//! - `:eq(n)` becomes 1-based `:nth-child(n+1)`
//! - `:first` becomes `:nth-child(1)`, `:last` becomes `:last-child`
//!
//! Anything else passes through untouched. The function is total: it always
//! returns a selector string and never fails.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static CONTAINS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(.*?):contains\(\s*['"]?(.*?)['"]?\s*\)$"#).unwrap());

static EQ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":eq\((\d+)\)").unwrap());

static FIRST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":first(-child|-of-type)?").unwrap());

static LAST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":last(-child|-of-type)?").unwrap());

pub fn normalize_selector(selector: &str) -> String {
    let mut result = selector.trim().to_string();

    if let Some(caps) = CONTAINS_RE.captures(&result) {
        let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        result = if prefix.is_empty() {
            format!("text={}", text)
        } else {
            format!("{}:has-text('{}')", prefix, text)
        };
    }

    result = EQ_RE
        .replace_all(&result, |caps: &Captures| {
            let n: usize = caps[1].parse().unwrap_or(0);
            format!(":nth-child({})", n + 1)
        })
        .into_owned();

    // `:first-child` and `:first-of-type` are already valid CSS; only the
    // bare jQuery forms get rewritten.
    result = FIRST_RE
        .replace_all(&result, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                ":nth-child(1)".to_string()
            }
        })
        .into_owned();

    result = LAST_RE
        .replace_all(&result, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                ":last-child".to_string()
            }
        })
        .into_owned();

    result
}

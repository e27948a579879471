//! `{key}` and `${key}` token substitution for step targets and values.
//!
//! Unresolved tokens stay verbatim so a partially-substituted selector is
//! still recognizable in logs and failure messages.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

pub type ParamMap = HashMap<String, String>;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}|\{([A-Za-z0-9_.-]+)\}").unwrap());

/// Replace each `{key}` or `${key}` token with its value from `params`.
/// Tokens with no matching key are left as-is. Idempotent once no token
/// syntax remains in the output.
pub fn substitute(input: &str, params: &ParamMap) -> String {
    TOKEN_RE
        .replace_all(input, |caps: &Captures| {
            let key = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            match params.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

const SENSITIVE_KEYS: [&str; 6] = ["password", "secret", "token", "key", "credential", "passwd"];

/// Value as it may appear in logs: masked when the parameter name looks
/// like a credential.
pub fn mask_value(key: &str, value: &str) -> String {
    let lower = key.to_lowercase();
    if SENSITIVE_KEYS.iter().any(|k| lower.contains(k)) {
        "********".to_string()
    } else {
        value.to_string()
    }
}

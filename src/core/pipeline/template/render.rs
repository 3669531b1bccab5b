//! `{{ name }}` placeholder substitution over stage template bodies.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.:]+)\s*\}\}").expect("placeholder regex")
    })
}

fn standalone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\s*)\{\{\s*([A-Za-z0-9_.:]+)\s*\}\}\s*$").expect("standalone regex")
    })
}

/// Why a body could not be substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionError {
    pub placeholder: String,
    pub reason: String,
}

impl fmt::Display for SubstitutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.placeholder, self.reason)
    }
}

/// Every distinct placeholder name referenced by `body`.
pub fn placeholders(body: &str) -> BTreeSet<String> {
    placeholder_pattern()
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Reject `{{` / `}}` fragments that do not form a valid placeholder.
pub fn check_markers(body: &str) -> Result<(), SubstitutionError> {
    for (index, line) in body.lines().enumerate() {
        let stripped = placeholder_pattern().replace_all(line, "");
        if stripped.contains("{{") || stripped.contains("}}") {
            return Err(SubstitutionError {
                placeholder: line.trim().to_string(),
                reason: format!("malformed placeholder on line {}", index + 1),
            });
        }
    }
    Ok(())
}

/// Substitute every placeholder in `body` from `values`.
///
/// A placeholder that is alone on its line expands line by line, each line
/// carrying the placeholder's indentation; an empty value drops the line.
/// Substituted values are never rescanned.
pub fn substitute(
    body: &str,
    values: &BTreeMap<String, String>,
) -> Result<String, SubstitutionError> {
    check_markers(body)?;

    let missing = |name: &str| SubstitutionError {
        placeholder: name.to_string(),
        reason: "placeholder has no binding".to_string(),
    };

    let mut lines: Vec<String> = Vec::new();
    for line in body.split('\n') {
        if let Some(caps) = standalone_pattern().captures(line) {
            let indent = &caps[1];
            let name = &caps[2];
            let value = values.get(name).ok_or_else(|| missing(name))?;
            for expanded in value.lines() {
                if expanded.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{}{}", indent, expanded));
                }
            }
            continue;
        }

        let mut unbound: Option<String> = None;
        let replaced = placeholder_pattern().replace_all(line, |caps: &regex::Captures<'_>| {
            match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    unbound.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });
        if let Some(name) = unbound {
            return Err(missing(&name));
        }
        lines.push(replaced.into_owned());
    }
    Ok(lines.join("\n"))
}

//! Placeholder substitution for subject and body templates.
//!
//! A template references recipient fields by one of the nine canonical keys,
//! wrapped in curly braces, square brackets, parentheses, or standing bare at
//! word boundaries, in lower- or upper-case spelling: `{yyy}`, `[ZZZ]`,
//! `(mail)`, `WWW`. One case-insensitive pattern over the closed key set
//! feeds a single normalized lookup; anything outside the set stays verbatim.

use crate::models::recipient::{RecipientFields, FIELD_KEYS};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    let names = FIELD_KEYS.join("|");
    // Bracketed alternatives come first so "{yyy}" consumes its braces
    // instead of matching the bare-word form inside them.
    let pattern = format!(
        r"(?i)\{{({n})\}}|\[({n})\]|\(({n})\)|\b({n})\b",
        n = names
    );
    Regex::new(&pattern).expect("placeholder pattern is valid")
});

/// Substitute every recognized placeholder with the recipient's field value.
/// Missing values render as empty string. Pure; input without placeholders
/// comes back unchanged.
pub fn render(template: &str, fields: &RecipientFields) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            fields
                .get(&name.to_ascii_lowercase())
                .unwrap_or_default()
                .to_string()
        })
        .into_owned()
}

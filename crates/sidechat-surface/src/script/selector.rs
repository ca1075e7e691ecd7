//! Selector allowlist.

use thiserror::Error;

pub const DEFAULT_MAX_SELECTOR_LEN: usize = 500;

/// Selector validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Selector is empty")]
    Empty,

    #[error("Selector exceeds {max} characters")]
    TooLong { max: usize },

    #[error("Selector contains disallowed character {0:?}")]
    InvalidCharacters(char),
}

impl SelectorError {
    pub fn code(&self) -> &'static str {
        match self {
            SelectorError::Empty => "selector_empty",
            SelectorError::TooLong { .. } => "selector_too_long",
            SelectorError::InvalidCharacters(_) => "selector_invalid_characters",
        }
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | '-' | '_' | '#' | '.' | '[' | ']' | '=' | ':' | '(' | ')' | '>' | '+' | '~'
                | '*' | ',' | '"' | '\'' | '^' | '|'
        )
}

/// Check a CSS selector against the allowlist.
///
/// Backticks, backslashes, `$`, braces, semicolons, angle-bracket openers and
/// control characters are never accepted. Attribute quotes are permitted.
pub fn validate_selector(selector: &str, max_len: usize) -> Result<&str, SelectorError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(SelectorError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(SelectorError::TooLong { max: max_len });
    }
    if let Some(bad) = trimmed.chars().find(|c| !is_allowed(*c)) {
        return Err(SelectorError::InvalidCharacters(bad));
    }
    Ok(trimmed)
}

//! Identifier validation and statement cleanup.
//!
//! Catalog, schema and table names are interpolated into `USE`, `SHOW` and
//! `DESCRIBE` statements, so they are restricted to plain SQL identifiers.

use crate::error::{SecurityError, SecurityResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Invalid regex: identifier pattern")
});

/// Identifier checks for names supplied by tool callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierValidator;

impl IdentifierValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid(&self, value: &str) -> bool {
        IDENTIFIER_REGEX.is_match(value)
    }

    /// Validates `value`; `kind` names it in the error (`catalog`, `schema`, ...).
    pub fn validate(&self, kind: &'static str, value: &str) -> SecurityResult<()> {
        if self.is_valid(value) {
            return Ok(());
        }
        warn!("Rejected {} name: {:?}", kind, value);
        Err(SecurityError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }

    /// Validates an optional name; `None` passes.
    pub fn validate_optional(&self, kind: &'static str, value: Option<&str>) -> SecurityResult<()> {
        match value {
            Some(v) => self.validate(kind, v),
            None => Ok(()),
        }
    }
}

/// Trims whitespace and trailing semicolons, which the statement endpoint rejects.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

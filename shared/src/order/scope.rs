//! Scope identifiers and display scoping
//!
//! A scope id routes broadcasts so that concurrent cashiers and tables never
//! cross-talk. A display surface picks its scope from a URL-style query:
//! `table=<n>`, `cashier=<id>`, or nothing (auto-detect). Values are
//! percent-decoded (`+` is a space).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const TAKEOUT_PREFIX: &str = "takeout_";

/// Broadcast routing key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn table(table_number: impl Into<String>) -> Self {
        Self(table_number.into())
    }

    pub fn takeout(cashier_id: &str) -> Self {
        Self(format!("{}{}", TAKEOUT_PREFIX, cashier_id))
    }

    /// Board-style views that follow everything a cashier does
    pub fn cashier(cashier_id: impl Into<String>) -> Self {
        Self(cashier_id.into())
    }

    /// Table if present, else takeout scope of the cashier
    pub fn for_order(table_number: Option<&str>, cashier_id: &str) -> Self {
        match table_number {
            Some(table) => Self::table(table),
            None => Self::takeout(cashier_id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_takeout(&self) -> bool {
        self.0.starts_with(TAKEOUT_PREFIX)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeParseError {
    #[error("display scope accepts at most one of table/cashier")]
    Conflicting,

    #[error("invalid percent-encoding in '{0}' value")]
    InvalidEncoding(String),
}

fn decode_value(key: &str, raw: &str) -> Result<String, ScopeParseError> {
    let plus_as_space = raw.replace('+', " ");
    urlencoding::decode(&plus_as_space)
        .map(|v| v.trim().to_string())
        .map_err(|_| ScopeParseError::InvalidEncoding(key.to_string()))
}

/// Which order a display surface projects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayScope {
    /// `table=<tableNumber>`
    Table(String),
    /// `cashier=<cashierId>`
    Cashier(String),
    /// No parameter: most recent active draft
    #[default]
    Auto,
}

impl DisplayScope {
    /// Parse a URL-style query (`?table=5`, `cashier=c1`, empty)
    ///
    /// Empty values count as absent; unknown keys are ignored.
    pub fn from_query(query: &str) -> Result<Self, ScopeParseError> {
        let query = query.trim().trim_start_matches('?');
        let mut table = None;
        let mut cashier = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim();
            let slot = match key {
                "table" => &mut table,
                "cashier" => &mut cashier,
                _ => continue,
            };
            let value = decode_value(key, raw)?;
            if !value.is_empty() {
                *slot = Some(value);
            }
        }

        match (table, cashier) {
            (Some(_), Some(_)) => Err(ScopeParseError::Conflicting),
            (Some(t), None) => Ok(DisplayScope::Table(t)),
            (None, Some(c)) => Ok(DisplayScope::Cashier(c)),
            (None, None) => Ok(DisplayScope::Auto),
        }
    }
}

impl fmt::Display for DisplayScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayScope::Table(t) => write!(f, "table={}", t),
            DisplayScope::Cashier(c) => write!(f, "cashier={}", c),
            DisplayScope::Auto => write!(f, "auto"),
        }
    }
}

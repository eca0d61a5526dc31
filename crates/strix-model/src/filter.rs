//! Input filter expressions
//!
//! A filter is a list of terms joined with ` or `. A term prefixed with `!`
//! is negated. How a term is compared against an entity (keyword, numeric
//! equality, substring) is decided by the entity kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One alternative of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    /// Whether the term is negated
    pub negated: bool,
    /// Term text, trimmed
    pub value: String,
}

/// Parsed filter expression. The empty expression accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FilterExpr {
    terms: Vec<FilterTerm>,
}

impl FilterExpr {
    /// Parse a filter string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let terms = raw
            .split(" or ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| match t.strip_prefix('!') {
                Some(rest) => FilterTerm {
                    negated: true,
                    value: rest.trim().to_string(),
                },
                None => FilterTerm {
                    negated: false,
                    value: t.to_string(),
                },
            })
            .collect();
        Self { terms }
    }

    /// Whether the filter accepts everything
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms of the expression
    #[inline]
    #[must_use]
    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// Evaluate the filter with a per-kind term matcher.
    ///
    /// Accepts when any term holds; a negated term holds when the matcher
    /// rejects its value.
    pub fn accepts<F>(&self, mut matches: F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        self.terms.is_empty() || self.terms.iter().any(|t| matches(&t.value) != t.negated)
    }
}

impl From<String> for FilterExpr {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for FilterExpr {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<FilterExpr> for String {
    fn from(expr: FilterExpr) -> Self {
        expr.to_string()
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" or ")?;
            }
            if term.negated {
                f.write_str("!")?;
            }
            f.write_str(&term.value)?;
        }
        Ok(())
    }
}

/// Numeric equality between a term and a value
#[must_use]
pub fn numeric_eq(term: &str, value: u64) -> bool {
    term.parse::<u64>().is_ok_and(|t| t == value)
}

/// Case-insensitive substring containment of a term in a value
#[must_use]
pub fn contains_ci(value: &str, term: &str) -> bool {
    value.to_lowercase().contains(&term.to_lowercase())
}

/// Case-insensitive equality
#[must_use]
pub fn eq_ci(value: &str, term: &str) -> bool {
    value.eq_ignore_ascii_case(term)
}

//! Error taxonomy for the reconciliation engine.
//!
//! Four distinct families, so callers can tell a bad form field from a
//! lifecycle violation from corrupt data from a network problem:
//!
//! - [`CuadreError::Validation`] — a line item was rejected before creation;
//!   carries **every** violation found, not just the first.
//! - [`CuadreError::State`] — a named state-machine conflict (duplicate open
//!   shift, edit after close, ...).
//! - [`CuadreError::AggregationIntegrity`] — a non-finite amount was found
//!   while summing; the whole aggregate is aborted rather than silently
//!   substituting zero.
//! - [`CuadreError::Upstream`] — the remote reconciliation service failed or
//!   is unreachable.  This layer never retries.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::entries::Category;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Named state-machine conflicts.  Each condition is its own variant so the
/// caller can branch on it (e.g. redirect to the already-open shift).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateConflict {
    #[error("a day record already exists for {0}")]
    DayAlreadyExists(NaiveDate),
    #[error("no open day record for {0} — a supervisor must open the day first")]
    NoOpenDay(NaiveDate),
    #[error("day record for {0} is already closed")]
    DayAlreadyClosed(NaiveDate),
    #[error("no day record found for {0}")]
    DayNotFound(NaiveDate),
    #[error("employee {employee_id} already has an open shift ({shift_id})")]
    ShiftAlreadyOpen { employee_id: i64, shift_id: String },
    #[error("no shift found with id {0}")]
    ShiftNotFound(String),
    #[error("shift {0} is already closed — its entries are read-only")]
    ShiftClosed(String),
    #[error("no entry {entry_id} in shift {shift_id}")]
    EntryNotFound { shift_id: String, entry_id: String },
}

/// Top-level error type for every fallible engine and client operation.
#[derive(Debug, Error)]
pub enum CuadreError {
    #[error("invalid {category} entry: {}", join_violations(.violations))]
    Validation {
        category: Category,
        violations: Vec<Violation>,
    },

    #[error(transparent)]
    State(#[from] StateConflict),

    #[error("invalid close: {0}")]
    InvalidClose(Violation),

    #[error("non-finite amount found while summing {category} entries")]
    AggregationIntegrity { category: Category },

    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl CuadreError {
    /// Build a validation error, or `Ok(())` when no violations were found.
    pub fn check(category: Category, violations: Vec<Violation>) -> Result<(), CuadreError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CuadreError::Validation {
                category,
                violations,
            })
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_reports_all_violations() {
        let err = CuadreError::Validation {
            category: Category::Meters,
            violations: vec![
                Violation::new("reading_end", "must be >= reading_start"),
                Violation::new("unit_price", "must be a positive number"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("reading_end"), "missing first violation: {msg}");
        assert!(msg.contains("unit_price"), "missing second violation: {msg}");
    }

    #[test]
    fn test_state_conflict_names_the_condition() {
        let err: CuadreError = StateConflict::ShiftAlreadyOpen {
            employee_id: 7,
            shift_id: "tg-123".into(),
        }
        .into();
        assert!(err.to_string().contains("already has an open shift"));
        assert!(err.to_string().contains("tg-123"));
    }

    #[test]
    fn test_check_empty_is_ok() {
        assert!(CuadreError::check(Category::Deposits, Vec::new()).is_ok());
        assert!(CuadreError::check(
            Category::Deposits,
            vec![Violation::new("amount", "must be > 0")]
        )
        .is_err());
    }
}

//! Attendant shift lifecycle: open, capture entries, close with variance.
//!
//! A shift is the unit of accountability for one attendant ("grifero") on
//! one operational day.  While open it accumulates [`LineItem`]s; closing it
//! freezes the entry list and records declared cash against the derived
//! expected cash.  A closed shift is terminal and rejects any mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entries::LineItem;
use crate::error::{CuadreError, StateConflict, Violation};
use crate::money::{format_pen, round2};
use crate::totals::{shift_totals, ShiftTotals};

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftState {
    Open,
    Closed,
}

/// Outcome of the declared-vs-expected comparison at close time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashResult {
    /// difference == 0
    Balanced,
    /// declared < expected
    Shortage,
    /// declared > expected
    Surplus,
}

impl CashResult {
    pub fn classify(difference: f64) -> Self {
        if difference == 0.0 {
            CashResult::Balanced
        } else if difference < 0.0 {
            CashResult::Shortage
        } else {
            CashResult::Surplus
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CashResult::Balanced => "Cuadrado",
            CashResult::Shortage => "Faltante",
            CashResult::Surplus => "Sobrante",
        }
    }
}

impl std::fmt::Display for CashResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The closing record, written once when the shift closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftClose {
    pub cash_expected: f64,
    pub cash_declared: f64,
    /// declared - expected
    pub difference: f64,
    pub result: CashResult,
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Shift record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub id: String,
    /// Short human code, e.g. `TG-2024-03-01-4F2A`.
    pub code: String,
    pub employee_id: i64,
    pub employee_name: String,
    pub date: NaiveDate,
    pub opened_at: DateTime<Utc>,
    pub state: ShiftState,
    pub entries: Vec<LineItem>,
    pub close: Option<ShiftClose>,
}

impl ShiftRecord {
    pub fn open(employee_id: i64, employee_name: &str, date: NaiveDate) -> Self {
        let id = Uuid::new_v4().to_string();
        let short = id[..4].to_uppercase();
        let shift = Self {
            code: format!("TG-{date}-{short}"),
            id,
            employee_id,
            employee_name: employee_name.to_string(),
            date,
            opened_at: Utc::now(),
            state: ShiftState::Open,
            entries: Vec::new(),
            close: None,
        };
        info!(
            shift_id = %shift.id,
            code = %shift.code,
            employee_id = shift.employee_id,
            employee = %shift.employee_name,
            "Shift opened"
        );
        shift
    }

    pub fn is_open(&self) -> bool {
        self.state == ShiftState::Open
    }

    fn ensure_open(&self) -> Result<(), CuadreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StateConflict::ShiftClosed(self.id.clone()).into())
        }
    }

    /// Record one line item.  Rejected once the shift is closed.
    pub fn add_entry(&mut self, entry: LineItem) -> Result<(), CuadreError> {
        self.ensure_open()?;
        info!(
            shift_id = %self.id,
            entry_id = %entry.id(),
            category = %entry.category(),
            amount = format_pen(entry.amount()),
            "Entry added"
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Remove a line item by id.  Rejected once the shift is closed.
    pub fn remove_entry(&mut self, entry_id: &str) -> Result<LineItem, CuadreError> {
        self.ensure_open()?;
        let pos = self
            .entries
            .iter()
            .position(|e| e.id() == entry_id)
            .ok_or_else(|| StateConflict::EntryNotFound {
                shift_id: self.id.clone(),
                entry_id: entry_id.to_string(),
            })?;
        let removed = self.entries.remove(pos);
        info!(
            shift_id = %self.id,
            entry_id = %entry_id,
            category = %removed.category(),
            "Entry removed"
        );
        Ok(removed)
    }

    /// Current subtotals and expected cash, recomputed from the entry list
    /// every time so they can never go stale.
    pub fn totals(&self) -> Result<ShiftTotals, CuadreError> {
        shift_totals(&self.entries)
    }

    /// Close the shift against a declared cash count.
    ///
    /// The declared amount must be a real number and not negative; an empty
    /// shift closes cleanly at 0.00 declared.  After this the record is
    /// read-only.
    pub fn close_with(
        &mut self,
        cash_declared: f64,
        notes: Option<String>,
    ) -> Result<ShiftClose, CuadreError> {
        self.ensure_open()?;
        if !cash_declared.is_finite() || cash_declared < 0.0 {
            return Err(CuadreError::InvalidClose(Violation::new(
                "cash_declared",
                "must be a non-negative number",
            )));
        }

        let totals = self.totals()?;
        let difference = round2(cash_declared - totals.cash_expected);
        let result = CashResult::classify(difference);

        if result == CashResult::Balanced {
            info!(
                shift_id = %self.id,
                expected = format_pen(totals.cash_expected),
                "Shift closed balanced"
            );
        } else {
            warn!(
                shift_id = %self.id,
                expected = format_pen(totals.cash_expected),
                declared = format_pen(cash_declared),
                difference = format_pen(difference),
                result = %result,
                "Shift closed with cash variance"
            );
        }

        let close = ShiftClose {
            cash_expected: totals.cash_expected,
            cash_declared: round2(cash_declared),
            difference,
            result,
            closed_at: Utc::now(),
            notes,
        };
        self.state = ShiftState::Closed;
        self.close = Some(close.clone());
        Ok(close)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{
        CardSettlement, Category, DepositEntry, MeterReading, PaymentType, ProductSale,
        VoucherEntry,
    };

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("test date")
    }

    fn open_scenario_shift() -> ShiftRecord {
        let mut shift = ShiftRecord::open(7, "Rosa Quispe", date("2024-03-01"));
        shift
            .add_entry(LineItem::MeterReading(
                MeterReading::new(1, 0.0, 70.0, 10.0).unwrap(),
            ))
            .unwrap();
        shift
            .add_entry(LineItem::ProductSale(
                ProductSale::new(1, 10.0, 10.0, PaymentType::Cash).unwrap(),
            ))
            .unwrap();
        shift
            .add_entry(LineItem::Deposit(
                DepositEntry::new(200.0, None, None, None).unwrap(),
            ))
            .unwrap();
        shift
            .add_entry(LineItem::CardSettlement(
                CardSettlement::new(1, None, None, None, 300.0).unwrap(),
            ))
            .unwrap();
        shift
            .add_entry(LineItem::Voucher(
                VoucherEntry::new(1, None, None, 50.0).unwrap(),
            ))
            .unwrap();
        shift
    }

    #[test]
    fn test_close_balanced_at_expected() {
        let mut shift = open_scenario_shift();
        assert_eq!(shift.totals().unwrap().cash_expected, 450.00);

        let close = shift.close_with(450.00, None).unwrap();
        assert_eq!(close.difference, 0.00);
        assert_eq!(close.result, CashResult::Balanced);
        assert_eq!(shift.state, ShiftState::Closed);
    }

    #[test]
    fn test_close_shortage_and_surplus() {
        let mut short = open_scenario_shift();
        let close = short.close_with(430.00, None).unwrap();
        assert_eq!(close.difference, -20.00);
        assert_eq!(close.result, CashResult::Shortage);

        let mut over = open_scenario_shift();
        let close = over
            .close_with(460.00, Some("billete extra en caja".into()))
            .unwrap();
        assert_eq!(close.difference, 10.00);
        assert_eq!(close.result, CashResult::Surplus);
    }

    #[test]
    fn test_closed_shift_rejects_mutation() {
        let mut shift = open_scenario_shift();
        shift.close_with(450.00, None).unwrap();

        let entry = LineItem::Deposit(DepositEntry::new(10.0, None, None, None).unwrap());
        assert!(matches!(
            shift.add_entry(entry),
            Err(CuadreError::State(StateConflict::ShiftClosed(_)))
        ));
        assert!(shift.close_with(450.00, None).is_err());
    }

    #[test]
    fn test_remove_entry_recomputes_totals() {
        let mut shift = open_scenario_shift();
        let card_id = shift
            .entries
            .iter()
            .find(|e| e.category() == Category::Cards)
            .map(|e| e.id().to_string())
            .unwrap();

        shift.remove_entry(&card_id).unwrap();
        // expected climbs by the removed POS settlement
        assert_eq!(shift.totals().unwrap().cash_expected, 750.00);

        assert!(matches!(
            shift.remove_entry("no-such-id"),
            Err(CuadreError::State(StateConflict::EntryNotFound { .. }))
        ));
    }

    #[test]
    fn test_empty_shift_closes_balanced_at_zero() {
        let mut shift = ShiftRecord::open(7, "Rosa Quispe", date("2024-03-01"));
        let close = shift.close_with(0.0, None).unwrap();
        assert_eq!(close.cash_expected, 0.00);
        assert_eq!(close.result, CashResult::Balanced);
    }

    #[test]
    fn test_declared_must_be_a_real_number() {
        let mut shift = open_scenario_shift();
        assert!(shift.close_with(f64::NAN, None).is_err());
        assert!(shift.close_with(-1.0, None).is_err());
        assert_eq!(shift.state, ShiftState::Open);
    }

    #[test]
    fn test_shift_code_carries_date() {
        let shift = ShiftRecord::open(7, "Rosa Quispe", date("2024-03-01"));
        assert!(shift.code.starts_with("TG-2024-03-01-"));
    }
}

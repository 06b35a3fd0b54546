//! Operational day lifecycle and the in-memory station registry.
//!
//! A [`DayRecord`] owns every attendant shift opened under one calendar
//! date.  [`Station`] is the single mutable root: one mutex around the
//! day map, so every state transition is serialized and the invariants
//! (one day per date, one open shift per employee, no edits after close)
//! are enforced in one place.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::consolidation::{consolidate, ConsolidatedLedger};
use crate::entries::LineItem;
use crate::error::{CuadreError, StateConflict, Violation};
use crate::money::{format_pen, round2};
use crate::shifts::{CashResult, ShiftClose, ShiftRecord};
use crate::totals::{day_totals, DayTotals};

// ---------------------------------------------------------------------------
// Day record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    Open,
    Closed,
}

/// Written once when the day closes: the rolled-up balance across every
/// shift of the day, compared against the supervisor's declared cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayClose {
    pub totals: DayTotals,
    pub cash_declared: f64,
    /// declared - final_balance
    pub difference: f64,
    pub result: CashResult,
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub id: String,
    pub date: NaiveDate,
    pub opened_by: String,
    pub opened_at: DateTime<Utc>,
    pub state: DayState,
    pub shifts: Vec<ShiftRecord>,
    pub close: Option<DayClose>,
}

impl DayRecord {
    fn open(date: NaiveDate, opened_by: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            opened_by: opened_by.to_string(),
            opened_at: Utc::now(),
            state: DayState::Open,
            shifts: Vec::new(),
            close: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == DayState::Open
    }

    /// Every line item captured under this day, across all shifts, open or
    /// closed.
    pub fn all_entries(&self) -> Vec<LineItem> {
        self.shifts
            .iter()
            .flat_map(|s| s.entries.iter().cloned())
            .collect()
    }

    /// Day-level balance over everything captured so far.
    pub fn totals(&self) -> Result<DayTotals, CuadreError> {
        day_totals(&self.all_entries())
    }

    /// Sum of expected cash across shifts (closed shifts keep the figure
    /// frozen at close time).
    pub fn expected_cash(&self) -> Result<f64, CuadreError> {
        let mut total = 0.0;
        for shift in &self.shifts {
            total += match &shift.close {
                Some(close) => close.cash_expected,
                None => shift.totals()?.cash_expected,
            };
        }
        Ok(round2(total))
    }

    fn shift_mut(&mut self, shift_id: &str) -> Result<&mut ShiftRecord, CuadreError> {
        self.shifts
            .iter_mut()
            .find(|s| s.id == shift_id)
            .ok_or_else(|| StateConflict::ShiftNotFound(shift_id.to_string()).into())
    }
}

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

/// In-memory registry of day records, keyed by calendar date.
#[derive(Debug, Default)]
pub struct Station {
    days: Mutex<HashMap<NaiveDate, DayRecord>>,
}

impl Station {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NaiveDate, DayRecord>> {
        self.days.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the operational day.  There is at most one day record per date,
    /// ever; a closed day cannot be reopened.
    pub fn open_day(&self, date: NaiveDate, opened_by: &str) -> Result<DayRecord, CuadreError> {
        let mut days = self.lock();
        if days.contains_key(&date) {
            return Err(StateConflict::DayAlreadyExists(date).into());
        }
        let day = DayRecord::open(date, opened_by);
        info!(day_id = %day.id, date = %date, opened_by = %opened_by, "Day opened");
        days.insert(date, day.clone());
        Ok(day)
    }

    /// Snapshot of the day record, if one exists for the date.
    pub fn day_record(&self, date: NaiveDate) -> Option<DayRecord> {
        self.lock().get(&date).cloned()
    }

    /// Open a shift for an attendant under an open day.  An employee can
    /// hold only one open shift at a time, station-wide.
    pub fn open_shift(
        &self,
        date: NaiveDate,
        employee_id: i64,
        employee_name: &str,
    ) -> Result<ShiftRecord, CuadreError> {
        let mut days = self.lock();
        match days.get(&date) {
            None => return Err(StateConflict::NoOpenDay(date).into()),
            Some(day) if !day.is_open() => {
                return Err(StateConflict::DayAlreadyClosed(date).into())
            }
            Some(_) => {}
        }
        // Two days can be open at once (the night handover), so the
        // duplicate check has to look across every day, not just this one.
        if let Some(existing) = days
            .values()
            .flat_map(|day| day.shifts.iter())
            .find(|s| s.employee_id == employee_id && s.is_open())
        {
            return Err(StateConflict::ShiftAlreadyOpen {
                employee_id,
                shift_id: existing.id.clone(),
            }
            .into());
        }
        let shift = ShiftRecord::open(employee_id, employee_name, date);
        if let Some(day) = days.get_mut(&date) {
            day.shifts.push(shift.clone());
        }
        Ok(shift)
    }

    /// The attendant's open shift for the date, if any.
    pub fn current_shift(&self, date: NaiveDate, employee_id: i64) -> Option<ShiftRecord> {
        self.lock().get(&date).and_then(|day| {
            day.shifts
                .iter()
                .find(|s| s.employee_id == employee_id && s.is_open())
                .cloned()
        })
    }

    pub fn shifts_for(&self, date: NaiveDate) -> Vec<ShiftRecord> {
        self.lock()
            .get(&date)
            .map(|day| day.shifts.clone())
            .unwrap_or_default()
    }

    pub fn add_entry(
        &self,
        date: NaiveDate,
        shift_id: &str,
        entry: LineItem,
    ) -> Result<(), CuadreError> {
        let mut days = self.lock();
        let day = days
            .get_mut(&date)
            .ok_or(StateConflict::DayNotFound(date))?;
        day.shift_mut(shift_id)?.add_entry(entry)
    }

    pub fn remove_entry(
        &self,
        date: NaiveDate,
        shift_id: &str,
        entry_id: &str,
    ) -> Result<LineItem, CuadreError> {
        let mut days = self.lock();
        let day = days
            .get_mut(&date)
            .ok_or(StateConflict::DayNotFound(date))?;
        day.shift_mut(shift_id)?.remove_entry(entry_id)
    }

    /// Close an attendant shift against the declared cash count.
    pub fn close_shift(
        &self,
        date: NaiveDate,
        shift_id: &str,
        cash_declared: f64,
        notes: Option<String>,
    ) -> Result<ShiftClose, CuadreError> {
        let mut days = self.lock();
        let day = days
            .get_mut(&date)
            .ok_or(StateConflict::DayNotFound(date))?;
        day.shift_mut(shift_id)?.close_with(cash_declared, notes)
    }

    /// Close the day: roll up the balance across every shift and compare it
    /// with the supervisor's declared cash.  Shifts still open at this point
    /// stay open; supervisors sometimes close the day before the night
    /// attendant hands over.
    pub fn close_day(
        &self,
        date: NaiveDate,
        closed_by: &str,
        cash_declared: f64,
        notes: Option<String>,
    ) -> Result<DayClose, CuadreError> {
        let mut days = self.lock();
        let day = days
            .get_mut(&date)
            .ok_or(StateConflict::DayNotFound(date))?;
        if !day.is_open() {
            return Err(StateConflict::DayAlreadyClosed(date).into());
        }
        if !cash_declared.is_finite() || cash_declared < 0.0 {
            return Err(CuadreError::InvalidClose(Violation::new(
                "cash_declared",
                "must be a non-negative number",
            )));
        }

        let open_shifts = day.shifts.iter().filter(|s| s.is_open()).count();
        if open_shifts > 0 {
            warn!(
                date = %date,
                open_shifts,
                "Day closing with shifts still open"
            );
        }

        let totals = day.totals()?;
        let difference = round2(cash_declared - totals.final_balance);
        let close = DayClose {
            totals,
            cash_declared: round2(cash_declared),
            difference,
            result: CashResult::classify(difference),
            closed_by: closed_by.to_string(),
            closed_at: Utc::now(),
            notes,
        };
        day.state = DayState::Closed;
        day.close = Some(close.clone());
        info!(
            date = %date,
            total_income = format_pen(totals.total_income),
            total_expenses = format_pen(totals.total_expenses),
            final_balance = format_pen(totals.final_balance),
            difference = format_pen(difference),
            result = %close.result,
            closed_by = %closed_by,
            "Day closed"
        );
        Ok(close)
    }

    /// Cross-employee consolidated view for the date.
    pub fn consolidated_ledger(&self, date: NaiveDate) -> Result<ConsolidatedLedger, CuadreError> {
        let shifts = self.shifts_for(date);
        consolidate(date, &shifts)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

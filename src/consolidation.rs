//! Cross-employee consolidation: the "cuadre consolidado" view.
//!
//! Takes every shift of a date and flattens the line items into rows keyed
//! by employee + category, each tagged as income or expense.  Rows with the
//! same key merge by summing their amounts, so ten card settlements by one
//! attendant show as a single POS row.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entries::Category;
use crate::error::CuadreError;
use crate::money::round2;
use crate::shifts::ShiftRecord;

// ---------------------------------------------------------------------------
// Row classification
// ---------------------------------------------------------------------------

/// Whether a category counts as money coming in or going out on the
/// consolidated day view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn label(self) -> &'static str {
        match self {
            EntryType::Income => "Ingreso",
            EntryType::Expense => "Egreso",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Category {
    /// Side of the ledger this category lands on in the consolidated view.
    pub fn ledger_type(self) -> EntryType {
        match self {
            Category::Meters | Category::Products | Category::Deposits => EntryType::Income,
            Category::Cards
            | Category::Vouchers
            | Category::Credits
            | Category::Discounts
            | Category::Expenses => EntryType::Expense,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One merged row: everything one employee reported under one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub employee_id: i64,
    pub employee: String,
    pub category: Category,
    pub entry_type: EntryType,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedLedger {
    pub date: NaiveDate,
    pub rows: Vec<LedgerRow>,
    pub employees_reporting: usize,
    pub total_income: f64,
    pub total_expenses: f64,
    /// total_income - total_expenses
    pub final_balance: f64,
}

/// Build the consolidated ledger for a date from its shifts.  Pure function
/// of the input; the same shifts always produce the same ledger.
pub fn consolidate(
    date: NaiveDate,
    shifts: &[ShiftRecord],
) -> Result<ConsolidatedLedger, CuadreError> {
    let mut merged: HashMap<(i64, Category), (String, f64)> = HashMap::new();

    for shift in shifts {
        for entry in &shift.entries {
            let amount = entry.amount();
            if !amount.is_finite() {
                return Err(CuadreError::AggregationIntegrity {
                    category: entry.category(),
                });
            }
            let slot = merged
                .entry((shift.employee_id, entry.category()))
                .or_insert_with(|| (shift.employee_name.clone(), 0.0));
            slot.1 += amount;
        }
    }

    let mut rows: Vec<LedgerRow> = merged
        .into_iter()
        .map(|((employee_id, category), (employee, amount))| LedgerRow {
            employee_id,
            employee,
            entry_type: category.ledger_type(),
            category,
            amount: round2(amount),
        })
        .collect();
    // deterministic order: employee, then income before expense, then category
    rows.sort_by(|a, b| {
        (a.employee_id, a.entry_type, a.category).cmp(&(b.employee_id, b.entry_type, b.category))
    });

    // every amount was checked finite above, so plain sums are safe here
    let total_income = round2(
        rows.iter()
            .filter(|r| r.entry_type == EntryType::Income)
            .map(|r| r.amount)
            .sum::<f64>(),
    );
    let total_expenses = round2(
        rows.iter()
            .filter(|r| r.entry_type == EntryType::Expense)
            .map(|r| r.amount)
            .sum::<f64>(),
    );

    let employees_reporting = {
        let mut ids: Vec<i64> = rows.iter().map(|r| r.employee_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    };

    Ok(ConsolidatedLedger {
        date,
        rows,
        employees_reporting,
        total_income,
        total_expenses,
        final_balance: round2(total_income - total_expenses),
    })
}

impl ConsolidatedLedger {
    /// Filter rows by free text (matched against the employee name and the
    /// category label, case-insensitive) and optionally by ledger side.
    /// Filtering never changes the ledger totals.
    pub fn filter(&self, text: &str, entry_type: Option<EntryType>) -> Vec<&LedgerRow> {
        let needle = text.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|r| entry_type.map_or(true, |t| r.entry_type == t))
            .filter(|r| {
                needle.is_empty()
                    || r.employee.to_lowercase().contains(&needle)
                    || r.category.label().to_lowercase().contains(&needle)
            })
            .collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{
        CardSettlement, DepositEntry, LineItem, MeterReading, VoucherEntry,
    };

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("test date")
    }

    fn shift_with(employee_id: i64, name: &str, entries: Vec<LineItem>) -> ShiftRecord {
        let mut shift = ShiftRecord::open(employee_id, name, date("2024-03-01"));
        for entry in entries {
            shift.add_entry(entry).unwrap();
        }
        shift
    }

    fn card(amount: f64) -> LineItem {
        LineItem::CardSettlement(CardSettlement::new(1, None, None, None, amount).unwrap())
    }

    #[test]
    fn test_same_key_rows_merge() {
        let shifts = vec![shift_with(7, "Rosa Quispe", vec![card(100.0), card(50.0)])];
        let ledger = consolidate(date("2024-03-01"), &shifts).unwrap();

        assert_eq!(ledger.rows.len(), 1);
        assert_eq!(ledger.rows[0].category, Category::Cards);
        assert_eq!(ledger.rows[0].entry_type, EntryType::Expense);
        assert_eq!(ledger.rows[0].amount, 150.00);
    }

    #[test]
    fn test_different_employees_stay_separate() {
        let shifts = vec![
            shift_with(7, "Rosa Quispe", vec![card(100.0)]),
            shift_with(8, "Luis Mamani", vec![card(40.0)]),
        ];
        let ledger = consolidate(date("2024-03-01"), &shifts).unwrap();

        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(ledger.employees_reporting, 2);
        assert_eq!(ledger.total_expenses, 140.00);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = vec![
            shift_with(7, "Rosa Quispe", vec![card(100.0)]),
            shift_with(8, "Luis Mamani", vec![card(40.0), card(10.0)]),
        ];
        let b = vec![
            shift_with(8, "Luis Mamani", vec![card(10.0), card(40.0)]),
            shift_with(7, "Rosa Quispe", vec![card(100.0)]),
        ];
        let d = date("2024-03-01");
        assert_eq!(
            consolidate(d, &a).unwrap().rows,
            consolidate(d, &b).unwrap().rows
        );
    }

    #[test]
    fn test_balance_identity() {
        let shifts = vec![shift_with(
            7,
            "Rosa Quispe",
            vec![
                LineItem::MeterReading(MeterReading::new(1, 0.0, 50.0, 10.0).unwrap()),
                LineItem::Deposit(DepositEntry::new(200.0, None, None, None).unwrap()),
                card(120.0),
                LineItem::Voucher(VoucherEntry::new(1, None, None, 30.0).unwrap()),
            ],
        )];
        let ledger = consolidate(date("2024-03-01"), &shifts).unwrap();

        assert_eq!(ledger.total_income, 700.00);
        assert_eq!(ledger.total_expenses, 150.00);
        assert_eq!(
            ledger.final_balance,
            round2(ledger.total_income - ledger.total_expenses)
        );
    }

    #[test]
    fn test_filters_leave_totals_alone() {
        let shifts = vec![
            shift_with(7, "Rosa Quispe", vec![card(100.0)]),
            shift_with(
                8,
                "Luis Mamani",
                vec![LineItem::Deposit(
                    DepositEntry::new(200.0, None, None, None).unwrap(),
                )],
            ),
        ];
        let ledger = consolidate(date("2024-03-01"), &shifts).unwrap();

        let by_name = ledger.filter("rosa", None);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].employee, "Rosa Quispe");

        let by_type = ledger.filter("", Some(EntryType::Income));
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].category, Category::Deposits);

        let by_category = ledger.filter("pos", None);
        assert_eq!(by_category.len(), 1);

        // totals computed before filtering, unchanged by it
        assert_eq!(ledger.total_income, 200.00);
        assert_eq!(ledger.total_expenses, 100.00);
    }

    #[test]
    fn test_empty_day_consolidates_to_zero() {
        let ledger = consolidate(date("2024-03-01"), &[]).unwrap();
        assert!(ledger.rows.is_empty());
        assert_eq!(ledger.employees_reporting, 0);
        assert_eq!(ledger.final_balance, 0.00);
    }
}

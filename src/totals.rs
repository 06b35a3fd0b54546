//! Aggregation: category subtotals, shift-level expected cash and the
//! day-level income/expense balance.
//!
//! Two different questions are answered here and they deliberately use
//! different formulas:
//!
//! - [`ShiftTotals`]: "how much cash should this attendant hand over?"
//!   Income counts fuel, **cash** product sales and deposits; card
//!   settlements, vouchers and the deposits themselves are then deducted
//!   because that money never sits in the drawer at close time.
//! - [`DayTotals`]: "did the whole day balance?"  Income counts deposits,
//!   meters and **all** product sales; expenses count credits, discounts,
//!   authorized expenses, vouchers and card settlements.
//!
//! All sums run through [`checked_sum`], which fails loudly instead of
//! letting a NaN poison the report.

use serde::{Deserialize, Serialize};

use crate::entries::{Category, LineItem, PaymentType};
use crate::error::CuadreError;
use crate::money::round2;

/// Sum a stream of amounts, rejecting the whole aggregation if any value or
/// the running total stops being a real number.
pub fn checked_sum<I>(category: Category, amounts: I) -> Result<f64, CuadreError>
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0.0;
    for amount in amounts {
        if !amount.is_finite() {
            return Err(CuadreError::AggregationIntegrity { category });
        }
        total += amount;
    }
    if !total.is_finite() {
        return Err(CuadreError::AggregationIntegrity { category });
    }
    Ok(round2(total))
}

fn category_sum(entries: &[LineItem], category: Category) -> Result<f64, CuadreError> {
    checked_sum(
        category,
        entries
            .iter()
            .filter(|e| e.category() == category)
            .map(|e| e.amount()),
    )
}

// ---------------------------------------------------------------------------
// Shift totals
// ---------------------------------------------------------------------------

/// Subtotals and the derived expected cash for one attendant shift.
/// Pure function of the entry list; recomputing never changes the result.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShiftTotals {
    pub total_fuel: f64,
    pub total_products_cash: f64,
    pub total_deposits: f64,
    pub total_card: f64,
    pub total_vouchers: f64,
    /// fuel + cash products + deposits
    pub total_income: f64,
    /// card + vouchers + deposits
    pub total_deductions: f64,
    /// total_income - total_deductions
    pub cash_expected: f64,
}

pub fn shift_totals(entries: &[LineItem]) -> Result<ShiftTotals, CuadreError> {
    let total_fuel = category_sum(entries, Category::Meters)?;
    let total_products_cash = checked_sum(
        Category::Products,
        entries.iter().filter_map(|e| match e {
            LineItem::ProductSale(p) if p.payment_type == PaymentType::Cash => Some(p.amount),
            _ => None,
        }),
    )?;
    let total_deposits = category_sum(entries, Category::Deposits)?;
    let total_card = category_sum(entries, Category::Cards)?;
    let total_vouchers = category_sum(entries, Category::Vouchers)?;

    let total_income = round2(total_fuel + total_products_cash + total_deposits);
    let total_deductions = round2(total_card + total_vouchers + total_deposits);

    Ok(ShiftTotals {
        total_fuel,
        total_products_cash,
        total_deposits,
        total_card,
        total_vouchers,
        total_income,
        total_deductions,
        cash_expected: round2(total_income - total_deductions),
    })
}

// ---------------------------------------------------------------------------
// Day totals
// ---------------------------------------------------------------------------

/// The consolidated income/expense balance across every shift of a day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DayTotals {
    pub deposits: f64,
    pub meters: f64,
    pub products: f64,
    pub credits: f64,
    pub discounts: f64,
    pub expenses: f64,
    pub vouchers: f64,
    pub cards: f64,
    pub total_income: f64,
    pub total_expenses: f64,
    /// total_income - total_expenses
    pub final_balance: f64,
}

pub fn day_totals(entries: &[LineItem]) -> Result<DayTotals, CuadreError> {
    let deposits = category_sum(entries, Category::Deposits)?;
    let meters = category_sum(entries, Category::Meters)?;
    let products = category_sum(entries, Category::Products)?;
    let credits = category_sum(entries, Category::Credits)?;
    let discounts = category_sum(entries, Category::Discounts)?;
    let expenses = category_sum(entries, Category::Expenses)?;
    let vouchers = category_sum(entries, Category::Vouchers)?;
    let cards = category_sum(entries, Category::Cards)?;

    let total_income = round2(deposits + meters + products);
    let total_expenses = round2(credits + discounts + expenses + vouchers + cards);

    Ok(DayTotals {
        deposits,
        meters,
        products,
        credits,
        discounts,
        expenses,
        vouchers,
        cards,
        total_income,
        total_expenses,
        final_balance: round2(total_income - total_expenses),
    })
}

// ===========================================================================
// Tests
// ===========================================================================

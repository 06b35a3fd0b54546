//! Line items: one typed variant per reconciliation category.
//!
//! Every category gets its own struct with a validating constructor; the
//! constructor either derives/accepts the entry amount or rejects the entry
//! with the **full** list of field violations.  Amounts are fixed at
//! construction — an entry is never recomputed retroactively except through
//! an explicit edit (`Discount::edit`).
//!
//! Derivation rules (mirroring the station's paper forms):
//! - meter reading: `amount = (reading_end - reading_start) * unit_price`
//! - product sale:  `amount = quantity * unit_price`
//! - discount:      bidirectional `percentage <-> discount_amount`, driven by
//!   whichever field was edited last
//! - everything else: amount entered directly, must be `> 0`

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Meter;
use crate::error::{CuadreError, Violation};
use crate::money::{is_payable, round2};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// The eight reconciliation categories ("módulos" on the consolidated view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Meters,
    Products,
    Cards,
    Vouchers,
    Credits,
    Discounts,
    Deposits,
    Expenses,
}

impl Category {
    /// Human label, as shown on the día/consolidado screens.
    pub fn label(self) -> &'static str {
        match self {
            Category::Meters => "Contómetros",
            Category::Products => "Venta Productos",
            Category::Cards => "POS",
            Category::Vouchers => "Vales",
            Category::Credits => "Créditos",
            Category::Discounts => "Descuentos",
            Category::Deposits => "Depósito Caja",
            Category::Expenses => "Gasto Autorizado",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How a product sale was paid.  Only cash sales count toward the
/// attendant's expected hand-over; credit sales are collected later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Credit,
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Meter readings (contómetros)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub id: String,
    pub meter_id: i64,
    pub reading_start: f64,
    pub reading_end: f64,
    pub unit_price: f64,
    pub amount: f64,
}

impl MeterReading {
    pub fn new(
        meter_id: i64,
        reading_start: f64,
        reading_end: f64,
        unit_price: f64,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !reading_start.is_finite() || reading_start < 0.0 {
            violations.push(Violation::new(
                "reading_start",
                "must be a non-negative number",
            ));
        }
        if !reading_end.is_finite() || reading_end < 0.0 {
            violations.push(Violation::new(
                "reading_end",
                "must be a non-negative number",
            ));
        }
        if reading_start.is_finite() && reading_end.is_finite() && reading_end < reading_start {
            violations.push(Violation::new(
                "reading_end",
                "must be greater than or equal to reading_start",
            ));
        }
        if !is_payable(unit_price) {
            violations.push(Violation::new("unit_price", "must be a positive number"));
        }
        CuadreError::check(Category::Meters, violations)?;

        Ok(Self {
            id: new_entry_id(),
            meter_id,
            reading_start,
            reading_end,
            unit_price,
            amount: round2((reading_end - reading_start) * unit_price),
        })
    }

    /// Draft a reading from the catalog meter, pre-filling `reading_start`
    /// with the meter's current reading and the price with its sale price.
    pub fn from_meter(meter: &Meter, reading_end: f64) -> Result<Self, CuadreError> {
        Self::new(meter.id, meter.current_reading, reading_end, meter.sale_price)
    }

    /// Volume sold, in gallons.
    pub fn gallons(&self) -> f64 {
        round2(self.reading_end - self.reading_start)
    }
}

// ---------------------------------------------------------------------------
// Product sales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSale {
    pub id: String,
    pub product_id: i64,
    pub quantity: f64,
    pub unit_price: f64,
    pub payment_type: PaymentType,
    pub amount: f64,
}

impl ProductSale {
    pub fn new(
        product_id: i64,
        quantity: f64,
        unit_price: f64,
        payment_type: PaymentType,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(quantity) {
            violations.push(Violation::new("quantity", "must be a positive number"));
        }
        if !is_payable(unit_price) {
            violations.push(Violation::new("unit_price", "must be a positive number"));
        }
        CuadreError::check(Category::Products, violations)?;

        Ok(Self {
            id: new_entry_id(),
            product_id,
            quantity,
            unit_price,
            payment_type,
            amount: round2(quantity * unit_price),
        })
    }
}

// ---------------------------------------------------------------------------
// Card settlements (POS)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSettlement {
    pub id: String,
    pub terminal_id: i64,
    pub card_type: String,
    pub operation_number: String,
    pub batch_number: String,
    pub amount: f64,
}

impl CardSettlement {
    pub fn new(
        terminal_id: i64,
        card_type: Option<&str>,
        operation_number: Option<&str>,
        batch_number: Option<&str>,
        amount: f64,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(amount) {
            violations.push(Violation::new("amount", "must be a positive number"));
        }
        CuadreError::check(Category::Cards, violations)?;

        Ok(Self {
            id: new_entry_id(),
            terminal_id,
            card_type: non_blank(card_type, "debito").to_lowercase(),
            operation_number: non_blank(operation_number, "S/N"),
            batch_number: non_blank(batch_number, "S/L"),
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Vouchers (vales)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub id: String,
    pub voucher_type_id: i64,
    pub voucher_number: String,
    pub beneficiary: String,
    pub amount: f64,
}

impl VoucherEntry {
    pub fn new(
        voucher_type_id: i64,
        voucher_number: Option<&str>,
        beneficiary: Option<&str>,
        amount: f64,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(amount) {
            violations.push(Violation::new("amount", "must be a positive number"));
        }
        CuadreError::check(Category::Vouchers, violations)?;

        Ok(Self {
            id: new_entry_id(),
            voucher_type_id,
            voucher_number: non_blank(voucher_number, "S/N"),
            beneficiary: non_blank(beneficiary, "N/A"),
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

/// Days of grace granted when the form leaves the due date empty.
const DEFAULT_CREDIT_TERM_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: String,
    pub customer_id: i64,
    pub document_number: Option<String>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub amount: f64,
}

impl CreditEntry {
    pub fn new(
        customer_id: i64,
        amount: f64,
        shift_date: NaiveDate,
        due_date: Option<NaiveDate>,
        document_number: Option<String>,
        notes: Option<String>,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(amount) {
            violations.push(Violation::new("amount", "must be a positive number"));
        }
        CuadreError::check(Category::Credits, violations)?;

        Ok(Self {
            id: new_entry_id(),
            customer_id,
            document_number,
            due_date: due_date
                .unwrap_or_else(|| shift_date + Duration::days(DEFAULT_CREDIT_TERM_DAYS)),
            notes,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Discounts
// ---------------------------------------------------------------------------

/// Which of the two dependent discount fields the user edited last.
/// Recomputation always flows *from* this field to the other one, never in
/// both directions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountField {
    Percentage,
    Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountEntry {
    pub id: String,
    pub customer_id: i64,
    pub sale_amount: f64,
    pub percentage: f64,
    pub discount_amount: f64,
    pub last_edited: DiscountField,
}

/// Pure counterpart derivation.  Given the sale amount and the value of the
/// field that was just edited, returns `(percentage, discount_amount)`.
/// Returns `None` when `sale_amount` is zero or not a usable number — in
/// that case no derivation occurs (the form keeps the raw value).
pub fn derive_discount(
    sale_amount: f64,
    edited: DiscountField,
    value: f64,
) -> Option<(f64, f64)> {
    if !sale_amount.is_finite() || sale_amount == 0.0 || !value.is_finite() {
        return None;
    }
    match edited {
        DiscountField::Percentage => Some((value, round2(sale_amount * value / 100.0))),
        DiscountField::Amount => Some((round2(value / sale_amount * 100.0), value)),
    }
}

impl DiscountEntry {
    fn build(
        customer_id: i64,
        sale_amount: f64,
        edited: DiscountField,
        value: f64,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(sale_amount) {
            violations.push(Violation::new("sale_amount", "must be a positive number"));
        }
        if !is_payable(value) {
            let field = match edited {
                DiscountField::Percentage => "percentage",
                DiscountField::Amount => "discount_amount",
            };
            violations.push(Violation::new(field, "must be a positive number"));
        }
        CuadreError::check(Category::Discounts, violations)?;

        // Both inputs validated above, so derivation cannot fail here.
        let (percentage, discount_amount) =
            derive_discount(sale_amount, edited, value).unwrap_or((0.0, 0.0));

        Ok(Self {
            id: new_entry_id(),
            customer_id,
            sale_amount,
            percentage,
            discount_amount,
            last_edited: edited,
        })
    }

    pub fn from_percentage(
        customer_id: i64,
        sale_amount: f64,
        percentage: f64,
    ) -> Result<Self, CuadreError> {
        Self::build(customer_id, sale_amount, DiscountField::Percentage, percentage)
    }

    pub fn from_amount(
        customer_id: i64,
        sale_amount: f64,
        discount_amount: f64,
    ) -> Result<Self, CuadreError> {
        Self::build(customer_id, sale_amount, DiscountField::Amount, discount_amount)
    }

    /// Apply a user edit to one of the dependent fields and recompute the
    /// other.  Last write wins: only the edited field drives the derivation.
    pub fn edit(&mut self, field: DiscountField, value: f64) -> Result<(), CuadreError> {
        if !is_payable(value) {
            let name = match field {
                DiscountField::Percentage => "percentage",
                DiscountField::Amount => "discount_amount",
            };
            return Err(CuadreError::Validation {
                category: Category::Discounts,
                violations: vec![Violation::new(name, "must be a positive number")],
            });
        }
        if let Some((percentage, discount_amount)) =
            derive_discount(self.sale_amount, field, value)
        {
            self.percentage = percentage;
            self.discount_amount = discount_amount;
            self.last_edited = field;
        }
        Ok(())
    }

    /// What the customer actually pays after the discount.
    pub fn final_amount(&self) -> f64 {
        round2(self.sale_amount - self.discount_amount)
    }
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEntry {
    pub id: String,
    pub voucher_number: Option<String>,
    pub received_by: Option<i64>,
    pub notes: Option<String>,
    pub amount: f64,
}

impl DepositEntry {
    pub fn new(
        amount: f64,
        received_by: Option<i64>,
        voucher_number: Option<String>,
        notes: Option<String>,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if !is_payable(amount) {
            violations.push(Violation::new("amount", "must be a positive number"));
        }
        CuadreError::check(Category::Deposits, violations)?;

        Ok(Self {
            id: new_entry_id(),
            voucher_number,
            received_by,
            notes,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Authorized expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub id: String,
    pub expense_type_id: i64,
    pub document_number: Option<String>,
    pub supplier: String,
    pub notes: Option<String>,
    pub amount: f64,
}

impl ExpenseEntry {
    pub fn new(
        expense_type_id: i64,
        supplier: &str,
        amount: f64,
        document_number: Option<String>,
        notes: Option<String>,
    ) -> Result<Self, CuadreError> {
        let mut violations = Vec::new();
        if supplier.trim().is_empty() {
            violations.push(Violation::new("supplier", "must not be empty"));
        }
        if !is_payable(amount) {
            violations.push(Violation::new("amount", "must be a positive number"));
        }
        CuadreError::check(Category::Expenses, violations)?;

        Ok(Self {
            id: new_entry_id(),
            expense_type_id,
            document_number,
            supplier: supplier.trim().to_string(),
            notes,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// The tagged union
// ---------------------------------------------------------------------------

/// One reconciliation line item.  Aggregation and consolidation match on
/// this exhaustively — adding a category is a compile error everywhere it
/// matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum LineItem {
    MeterReading(MeterReading),
    ProductSale(ProductSale),
    CardSettlement(CardSettlement),
    Voucher(VoucherEntry),
    Credit(CreditEntry),
    Discount(DiscountEntry),
    Deposit(DepositEntry),
    Expense(ExpenseEntry),
}

impl LineItem {
    pub fn id(&self) -> &str {
        match self {
            LineItem::MeterReading(e) => &e.id,
            LineItem::ProductSale(e) => &e.id,
            LineItem::CardSettlement(e) => &e.id,
            LineItem::Voucher(e) => &e.id,
            LineItem::Credit(e) => &e.id,
            LineItem::Discount(e) => &e.id,
            LineItem::Deposit(e) => &e.id,
            LineItem::Expense(e) => &e.id,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            LineItem::MeterReading(_) => Category::Meters,
            LineItem::ProductSale(_) => Category::Products,
            LineItem::CardSettlement(_) => Category::Cards,
            LineItem::Voucher(_) => Category::Vouchers,
            LineItem::Credit(_) => Category::Credits,
            LineItem::Discount(_) => Category::Discounts,
            LineItem::Deposit(_) => Category::Deposits,
            LineItem::Expense(_) => Category::Expenses,
        }
    }

    /// The monetary amount this entry contributes to its category subtotal.
    /// For discounts this is the discounted portion, not the sale amount.
    pub fn amount(&self) -> f64 {
        match self {
            LineItem::MeterReading(e) => e.amount,
            LineItem::ProductSale(e) => e.amount,
            LineItem::CardSettlement(e) => e.amount,
            LineItem::Voucher(e) => e.amount,
            LineItem::Credit(e) => e.amount,
            LineItem::Discount(e) => e.discount_amount,
            LineItem::Deposit(e) => e.amount,
            LineItem::Expense(e) => e.amount,
        }
    }
}

fn non_blank(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

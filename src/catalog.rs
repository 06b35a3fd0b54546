//! Reference data consumed by the calculators and forms.
//!
//! Employees, fuel meters (contómetros), products, payment terminals,
//! voucher/expense types, and customers.  The catalog is owned by the remote
//! service (`api::CuadreClient` fetches each kind); the engine only reads it
//! for lookups and form pre-fill — it never mutates reference data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub names: String,
    pub surnames: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Employee {
    /// Display name used on ledger rows and shift headers.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.names, self.surnames)
    }
}

/// A fuel dispenser meter.  `current_reading` is the last registered reading
/// and seeds `reading_start` when a new meter entry is drafted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    pub id: i64,
    pub code: String,
    pub product: String,
    pub current_reading: f64,
    pub sale_price: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sale_price: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Shared by vouchers (vales) and authorized expenses: the back office
/// keeps a single "tipo de vale" catalog for both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherType {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub document_number: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Which reference list to fetch from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Employees,
    Meters,
    Products,
    Terminals,
    VoucherTypes,
    Customers,
}

impl CatalogKind {
    /// Path segment under `/api/catalogos/`.
    pub fn as_path(self) -> &'static str {
        match self {
            CatalogKind::Employees => "empleados",
            CatalogKind::Meters => "contometros",
            CatalogKind::Products => "productos",
            CatalogKind::Terminals => "terminales",
            CatalogKind::VoucherTypes => "tipos-vale",
            CatalogKind::Customers => "clientes",
        }
    }
}

/// In-memory snapshot of all reference lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub meters: Vec<Meter>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub terminals: Vec<Terminal>,
    #[serde(default)]
    pub voucher_types: Vec<VoucherType>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl Catalog {
    pub fn employee(&self, id: i64) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Employee display name, falling back to the raw id for unknown rows.
    pub fn employee_name(&self, id: i64) -> String {
        self.employee(id)
            .map(Employee::full_name)
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn meter(&self, id: i64) -> Option<&Meter> {
        self.meters.iter().find(|m| m.id == id)
    }

    pub fn product(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn terminal(&self, id: i64) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.id == id)
    }

    pub fn voucher_type(&self, id: i64) -> Option<&VoucherType> {
        self.voucher_types.iter().find(|v| v.id == id)
    }

    pub fn customer(&self, id: i64) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    /// Lookup used by the credit/discount forms: exact document number match.
    pub fn customer_by_document(&self, document_number: &str) -> Option<&Customer> {
        let wanted = document_number.trim();
        self.customers
            .iter()
            .find(|c| c.document_number == wanted)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

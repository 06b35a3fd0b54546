//! Daily cash reconciliation ("cuadre") engine for a fuel-station
//! operation.
//!
//! The crate covers the full reconciliation flow:
//!
//! - [`entries`] — the eight line-item categories with their validating
//!   constructors and amount derivations
//! - [`totals`] — shift-level expected cash and the day-level balance
//! - [`shifts`] / [`day`] — the open/close state machines, rooted in the
//!   in-memory [`day::Station`] registry
//! - [`consolidation`] — the cross-employee day view with merge and filters
//! - [`api`] — the authenticated client for the back-office service
//! - [`catalog`] — reference data (employees, meters, products, ...)

use std::path::Path;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod catalog;
pub mod consolidation;
pub mod day;
pub mod entries;
pub mod error;
pub mod money;
pub mod shifts;
pub mod totals;

pub use api::{CuadreClient, Session};
pub use catalog::Catalog;
pub use consolidation::{consolidate, ConsolidatedLedger, EntryType, LedgerRow};
pub use day::{DayClose, DayRecord, DayState, Station};
pub use entries::{Category, LineItem, PaymentType};
pub use error::{CuadreError, StateConflict, Violation};
pub use shifts::{CashResult, ShiftClose, ShiftRecord, ShiftState};
pub use totals::{day_totals, shift_totals, DayTotals, ShiftTotals};

/// Initialize structured logging: console always, plus a daily rolling file
/// when `log_dir` is given.  Call once at startup; later calls are ignored.
pub fn init_logging(log_dir: Option<&Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cuadre=debug"));

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "cuadre");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            if registry.with(file_layer).try_init().is_ok() {
                // Keep the guard alive for the lifetime of the process —
                // dropping it flushes and stops the file writer.
                std::mem::forget(guard);
                info!(log_dir = %dir.display(), "Logging initialized (console + file)");
            }
        }
        None => {
            if registry.try_init().is_ok() {
                info!("Logging initialized (console)");
            }
        }
    }
}

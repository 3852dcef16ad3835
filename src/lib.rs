//! # Meal Map Reconciler
//!
//! Ingests the daily meal counts that penitentiary units report for a
//! contracted food lot, checks them against the SIISP population feed and
//! rolls them up into cost and conformity figures per lot.
//!
//! ## Core Concepts
//!
//! - **Meal map**: one unit's counts for one month of one lot, eight columns
//!   (breakfast, lunch, snack, dinner; internal population and staff)
//! - **SIISP reference**: independent daily population count for the same unit
//! - **Deviation**: count minus reference, per day and column; positive means
//!   more meals were billed than the reference supports
//! - **Conformity**: share of billed cost not covered by positive deviations
//!
//! ## Example
//!
//! ```rust,ignore
//! use meal_map_reconciler::*;
//!
//! let reconciler = Reconciler::new(MemoryStore::new());
//! let outcome = reconciler.ingest(&Submission {
//!     lot_id: 1,
//!     month: 3,
//!     year: 2025,
//!     unit_name: "CPP Norte".to_string(),
//!     meal_text: pasted_table,
//!     siisp_text: Some(pasted_siisp),
//! })?;
//!
//! let catalog = Catalog::load(&StoreConfig::from_env())?;
//! let summary = lot_summary(&catalog, reconciler.store(), 1, PeriodFilter::default())?;
//! println!("conformity: {}", summary.conformity);
//! ```

pub mod aggregator;
pub mod config;
pub mod deviation;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod reconciler;
pub mod schema;
pub mod store;
pub mod utils;
pub mod validation;

pub use aggregator::{record_cost, summarize_lot, Conformity, LotSummary, PeriodFilter, RecordCost};
pub use config::StoreConfig;
pub use deviation::{materialize_deviations, refresh_deviations, DeviationOutcome};
pub use error::{MealMapError, Rejection, RejectionKind, Result};
pub use export::{comparative_rows, lot_label, price_row, ExportFilter, ExportRow};
pub use ingestion::*;
pub use reconciler::{IngestionOutcome, Reconciler};
pub use schema::*;
pub use store::{Catalog, JsonFileStore, MemoryStore, RecordSet, RecordStore};
pub use utils::*;
pub use validation::*;

use log::debug;

/// Aggregation entry point: a lot's summary from its stored maps and contract prices.
pub fn lot_summary(
    catalog: &Catalog,
    store: &impl RecordStore,
    lot_id: u32,
    filter: PeriodFilter,
) -> Result<LotSummary> {
    let lot = catalog.lot(lot_id)?;
    let set = store.load()?;

    let summary = summarize_lot(lot, &set.records, filter);
    debug!(
        "Lot {} summary over {} months: conformity {}",
        lot_id, summary.months_on_record, summary.conformity
    );
    Ok(summary)
}

/// Export entry point: price header plus comparative rows for one lot.
pub fn export_lot(
    catalog: &Catalog,
    store: &impl RecordStore,
    lot_id: u32,
    filter: &ExportFilter,
) -> Result<([f64; 8], Vec<ExportRow>)> {
    let lot = catalog.lot(lot_id)?;
    let set = store.load()?;

    Ok((price_row(lot), comparative_rows(lot_id, &set.records, filter)?))
}

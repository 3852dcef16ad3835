//! Per-day comparative rows handed to the spreadsheet exporter.
//!
//! Styling and template handling belong to the exporter; this module only
//! decides which days of which maps are reported and what goes in each cell.

use crate::error::Result;
use crate::schema::{Lot, MealField, MealRecord};
use crate::utils::parse_br_date;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilter {
    /// Unit names to keep; empty keeps every unit.
    pub units: Vec<String>,
    /// Inclusive date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl ExportFilter {
    fn keeps_unit(&self, unit_name: &str) -> bool {
        self.units.is_empty() || self.units.iter().any(|u| u == unit_name)
    }

    fn keeps_date(&self, date: NaiveDate) -> bool {
        self.date_range
            .map_or(true, |(start, end)| start <= date && date <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub lot_label: String,
    pub unit_name: String,
    pub date: String,
    pub siisp: Option<i64>,
    /// Meal counts in [`MealField::ALL`] order.
    pub meals: [Option<u32>; 8],
    /// Deviations in [`MealField::ALL`] order.
    pub deviations: [Option<i64>; 8],
}

impl ExportRow {
    pub fn headers() -> Vec<String> {
        let mut headers = vec![
            "lot".to_string(),
            "unit".to_string(),
            "date".to_string(),
            "siisp".to_string(),
        ];
        headers.extend(MealField::ALL.iter().map(|f| f.store_key().to_string()));
        headers.extend(
            MealField::ALL
                .iter()
                .map(|f| format!("{}_siisp", f.store_key())),
        );
        headers
    }

    /// Cells in [`ExportRow::headers`] order; missing values are blank.
    pub fn to_record(&self) -> Vec<String> {
        fn cell<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let mut record = vec![
            self.lot_label.clone(),
            self.unit_name.clone(),
            self.date.clone(),
            cell(self.siisp),
        ];
        record.extend(self.meals.iter().map(|v| cell(*v)));
        record.extend(self.deviations.iter().map(|v| cell(*v)));
        record
    }
}

pub fn lot_label(lot_id: u32) -> String {
    format!("LOTE {}", lot_id)
}

/// Unit prices in [`MealField::ALL`] order, as laid out in the report header.
pub fn price_row(lot: &Lot) -> [f64; 8] {
    MealField::ALL.map(|field| lot.prices.price(field))
}

pub fn comparative_rows(
    lot_id: u32,
    records: &[MealRecord],
    filter: &ExportFilter,
) -> Result<Vec<ExportRow>> {
    let mut rows = Vec::new();

    for record in records
        .iter()
        .filter(|r| r.lot_id == lot_id && filter.keeps_unit(&r.unit_name))
    {
        let dates = record
            .dates
            .iter()
            .map(|d| parse_br_date(d))
            .collect::<Result<Vec<_>>>()?;

        for (idx, (raw, date)) in record.dates.iter().zip(dates).enumerate() {
            if !filter.keeps_date(date) {
                continue;
            }

            rows.push(ExportRow {
                lot_label: lot_label(lot_id),
                unit_name: record.unit_name.clone(),
                date: raw.clone(),
                siisp: record.siisp_reference.get(idx).copied(),
                meals: MealField::ALL.map(|f| record.meals.get(f).get(idx).copied()),
                deviations: MealField::ALL.map(|f| record.deviations.get(f).get(idx).copied()),
            });
        }
    }

    Ok(rows)
}

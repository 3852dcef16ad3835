use crate::schema::{Lot, MealField, MealRecord, PriceTable};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Share of billed cost not explained by positive deviations.
///
/// Undefined when nothing was billed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conformity {
    Percent(f64),
    NotApplicable,
}

impl Conformity {
    pub fn from_costs(total_cost: f64, deviation_cost: f64) -> Self {
        if total_cost == 0.0 {
            return Self::NotApplicable;
        }
        let percent = (total_cost - deviation_cost) / total_cost * 100.0;
        Self::Percent(round_to(percent.max(0.0), 1))
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::NotApplicable => None,
        }
    }
}

impl fmt::Display for Conformity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{:.1}%", p),
            Self::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl Serialize for Conformity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Percent(p) => serializer.serialize_f64(*p),
            Self::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl PeriodFilter {
    pub fn matches(&self, record: &MealRecord) -> bool {
        self.month.map_or(true, |m| record.month == m)
            && self.year.map_or(true, |y| record.year == y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordCost {
    pub meals: u64,
    pub total_cost: f64,
    /// Cost of the days where the count exceeded the SIISP reference.
    pub deviation_cost: f64,
}

pub fn record_cost(record: &MealRecord, prices: &PriceTable) -> RecordCost {
    let mut cost = RecordCost::default();

    for field in MealField::ALL {
        let price = prices.price(field);
        let meals: u64 = record.meals.get(field).iter().map(|&c| u64::from(c)).sum();
        let excess: i128 = record
            .deviations
            .get(field)
            .iter()
            .filter(|&&d| d > 0)
            .map(|&d| i128::from(d))
            .sum();

        cost.meals += meals;
        cost.total_cost += meals as f64 * price;
        cost.deviation_cost += excess as f64 * price;
    }

    cost
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotSummary {
    pub lot_id: u32,
    pub meals_per_month: u64,
    pub cost_per_month: f64,
    pub deviation_per_month: f64,
    pub conformity: Conformity,
    pub months_on_record: usize,
    pub total_cost: f64,
    pub deviation_cost: f64,
}

/// Rolls up a lot's maps into monthly averages and a conformity figure.
///
/// Records of other lots, or outside `filter`, are ignored.
pub fn summarize_lot(lot: &Lot, records: &[MealRecord], filter: PeriodFilter) -> LotSummary {
    let mut months = BTreeSet::new();
    let mut totals = RecordCost::default();

    for record in records
        .iter()
        .filter(|r| r.lot_id == lot.id && filter.matches(r))
    {
        let cost = record_cost(record, &lot.prices);
        totals.meals += cost.meals;
        totals.total_cost += cost.total_cost;
        totals.deviation_cost += cost.deviation_cost;
        months.insert((record.year, record.month));
    }

    let month_count = months.len();
    let per_month = |value: f64| {
        if month_count == 0 {
            0.0
        } else {
            round_to(value / month_count as f64, 2)
        }
    };

    LotSummary {
        lot_id: lot.id,
        meals_per_month: if month_count == 0 {
            0
        } else {
            totals.meals / month_count as u64
        },
        cost_per_month: per_month(totals.total_cost),
        deviation_per_month: per_month(totals.deviation_cost),
        conformity: Conformity::from_costs(totals.total_cost, totals.deviation_cost),
        months_on_record: month_count,
        total_cost: round_to(totals.total_cost, 2),
        deviation_cost: round_to(totals.deviation_cost, 2),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

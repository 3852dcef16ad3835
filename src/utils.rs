use crate::error::{MealMapError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub const BR_DATE_FORMAT: &str = "%d/%m/%Y";

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(MealMapError::InvalidDate(format!(
            "month {} is outside 1..=12",
            month
        )));
    }
    Ok(())
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;

    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.checked_sub_days(Days::new(1)))
        .ok_or_else(|| {
            MealMapError::InvalidDate(format!("{:02}/{} is out of range", month, year))
        })
}

pub fn days_in_month(month: u32, year: i32) -> Result<usize> {
    Ok(last_day_of_month(year, month)?.day() as usize)
}

/// Every calendar day of `month`/`year` as `DD/MM/YYYY`, starting at day 1.
///
/// The length of this list is the expected day count every parsed column
/// is validated against.
pub fn dates_of_month(month: u32, year: i32) -> Result<Vec<String>> {
    let last = last_day_of_month(year, month)?;

    Ok((1..=last.day())
        .map(|day| format!("{:02}/{:02}/{}", day, month, year))
        .collect())
}

pub fn parse_br_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), BR_DATE_FORMAT).map_err(|_| {
        MealMapError::InvalidDate(format!(
            "'{}' is not a valid date. Expected DD/MM/YYYY",
            value
        ))
    })
}

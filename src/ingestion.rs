//! Parsers for the loosely formatted text staff paste into the meal-map form.
//!
//! Meal tables are one row per day: a label column followed by eight counts
//! (breakfast, lunch, snack and dinner, each internal then staff). Rows that
//! cannot be fully read are skipped one at a time. SIISP columns are one integer
//! per line and are all-or-nothing: one bad value rejects the whole block.

use crate::error::{MealMapError, Result};
use crate::schema::{MealField, MealSeries};
use crate::validation::ValidationVerdict;
use log::{debug, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Label column plus one column per [`MealField`].
pub const MIN_TABLE_COLUMNS: usize = 1 + MealField::ALL.len();

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMealTable {
    pub meals: MealSeries,
    /// Rows that produced all eight counts.
    pub processed: usize,
    /// Non-blank rows that were dropped (too few columns or a non-numeric count).
    pub skipped: usize,
    /// The input had no content at all.
    pub blank_input: bool,
}

impl ParsedMealTable {
    /// Checks the row count against the month length.
    ///
    /// Blank input is accepted with nothing processed; it is not a mismatch.
    pub fn verdict(&self, expected_days: Option<usize>) -> ValidationVerdict {
        if self.blank_input {
            return ValidationVerdict::accept(0, expected_days.unwrap_or(0), "Nothing to process");
        }

        let expected = expected_days.unwrap_or(self.processed);

        if self.processed > expected {
            ValidationVerdict::reject(
                self.processed,
                expected,
                format!(
                    "Found {} rows, but the month has only {} days. The extra rows may be incorrect.",
                    self.processed, expected
                ),
            )
        } else if self.processed < expected {
            ValidationVerdict::reject(
                self.processed,
                expected,
                format!(
                    "Found only {} rows, but the month has {} days. Some days may be missing.",
                    self.processed, expected
                ),
            )
        } else {
            ValidationVerdict::accept(self.processed, expected, "Meal data processed successfully")
        }
    }
}

fn split_columns(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        // Some paste sources turn tabs into runs of spaces.
        line.split_whitespace().collect()
    }
}

fn parse_counts(columns: &[&str]) -> Option<[u32; 8]> {
    let mut counts = [0u32; 8];
    for (slot, raw) in counts.iter_mut().zip(&columns[1..MIN_TABLE_COLUMNS]) {
        *slot = raw.parse().ok()?;
    }
    Some(counts)
}

pub fn parse_meal_table(text: &str) -> ParsedMealTable {
    let mut table = ParsedMealTable::default();

    if text.trim().is_empty() {
        table.blank_input = true;
        return table;
    }

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let columns = split_columns(line);
        let counts = if columns.len() >= MIN_TABLE_COLUMNS {
            parse_counts(&columns)
        } else {
            None
        };

        match counts {
            Some(counts) => {
                for (field, count) in MealField::ALL.into_iter().zip(counts) {
                    table.meals.get_mut(field).push(count);
                }
                table.processed += 1;
            }
            None => {
                warn!(
                    "Skipping meal table line {} ({} columns): {:?}",
                    line_no + 1,
                    columns.len(),
                    line
                );
                table.skipped += 1;
            }
        }
    }

    debug!(
        "Meal table parsed: {} rows accepted, {} skipped",
        table.processed, table.skipped
    );

    table
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSiisp {
    pub values: Vec<i64>,
    pub verdict: ValidationVerdict,
}

impl ParsedSiisp {
    /// No SIISP column was supplied.
    pub fn is_absent(&self) -> bool {
        self.verdict.accepted && self.values.is_empty()
    }
}

/// Largest accepted SIISP population count.
pub const MAX_SIISP_VALUE: i64 = u32::MAX as i64;

pub fn parse_siisp_column(text: &str, expected_days: usize) -> ParsedSiisp {
    if text.trim().is_empty() {
        return ParsedSiisp {
            values: Vec::new(),
            verdict: ValidationVerdict::accept(
                0,
                expected_days,
                "SIISP data not provided; the SIISP reference stays empty",
            ),
        };
    }

    let mut values = Vec::new();
    for line in text.lines() {
        let literal = line.trim();
        if literal.is_empty() {
            continue;
        }

        match literal.parse::<i64>() {
            Ok(value) if (0..=MAX_SIISP_VALUE).contains(&value) => values.push(value),
            Ok(_) => {
                return ParsedSiisp {
                    verdict: ValidationVerdict::reject(
                        values.len(),
                        expected_days,
                        format!(
                            "Invalid SIISP value found: \"{}\". Population counts must be between 0 and {}.",
                            literal, MAX_SIISP_VALUE
                        ),
                    ),
                    values: Vec::new(),
                };
            }
            Err(_) => {
                return ParsedSiisp {
                    verdict: ValidationVerdict::reject(
                        values.len(),
                        expected_days,
                        format!(
                            "Invalid SIISP value found: \"{}\". All values must be integers.",
                            literal
                        ),
                    ),
                    values: Vec::new(),
                };
            }
        }
    }

    if values.len() != expected_days {
        return ParsedSiisp {
            verdict: ValidationVerdict::reject(
                values.len(),
                expected_days,
                format!(
                    "SIISP data: found {} values, but the month has {} days. Provide exactly {} values or leave it empty.",
                    values.len(),
                    expected_days,
                    expected_days
                ),
            ),
            values: Vec::new(),
        };
    }

    let verdict = ValidationVerdict::accept(
        values.len(),
        expected_days,
        format!("SIISP data processed successfully - {} values", values.len()),
    );
    ParsedSiisp { values, verdict }
}

/// One day of a manually typed meal map.
///
/// Cells may be numbers or numeric strings; blank and missing cells are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    #[serde(rename = "dia", default, deserialize_with = "lenient_count")]
    pub day: Option<u32>,
    #[serde(rename = "cafe_interno", default, deserialize_with = "lenient_count")]
    pub breakfast_internal: Option<u32>,
    #[serde(rename = "cafe_funcionario", default, deserialize_with = "lenient_count")]
    pub breakfast_staff: Option<u32>,
    #[serde(rename = "almoco_interno", default, deserialize_with = "lenient_count")]
    pub lunch_internal: Option<u32>,
    #[serde(rename = "almoco_funcionario", default, deserialize_with = "lenient_count")]
    pub lunch_staff: Option<u32>,
    #[serde(rename = "lanche_interno", default, deserialize_with = "lenient_count")]
    pub snack_internal: Option<u32>,
    #[serde(rename = "lanche_funcionario", default, deserialize_with = "lenient_count")]
    pub snack_staff: Option<u32>,
    #[serde(rename = "jantar_interno", default, deserialize_with = "lenient_count")]
    pub dinner_internal: Option<u32>,
    #[serde(rename = "jantar_funcionario", default, deserialize_with = "lenient_count")]
    pub dinner_staff: Option<u32>,
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid = |raw: String| D::Error::custom(format!("{} is not a meal count", raw));

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(format!("{:?}", s))),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(n.to_string())),
        Some(other) => Err(invalid(other.to_string())),
    }
}

impl DailyEntry {
    pub fn count(&self, field: MealField) -> u32 {
        let value = match field {
            MealField::BreakfastInternal => self.breakfast_internal,
            MealField::BreakfastStaff => self.breakfast_staff,
            MealField::LunchInternal => self.lunch_internal,
            MealField::LunchStaff => self.lunch_staff,
            MealField::SnackInternal => self.snack_internal,
            MealField::SnackStaff => self.snack_staff,
            MealField::DinnerInternal => self.dinner_internal,
            MealField::DinnerStaff => self.dinner_staff,
        };
        value.unwrap_or(0)
    }
}

/// Reads manual-entry rows as posted by the form.
///
/// A row that cannot be read rejects the whole entry, naming its day
/// (`dia`, or the row position when the row has none).
pub fn entries_from_json(rows: &[Value]) -> Result<Vec<DailyEntry>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value::<DailyEntry>(row.clone()).map_err(|e| {
                let day = match row.get("dia") {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => (idx + 1).to_string(),
                };
                MealMapError::ManualEntryRejected(format!("invalid value on day {}: {}", day, e))
            })
        })
        .collect()
}

pub fn series_from_entries(entries: &[DailyEntry], expected_days: usize) -> Result<MealSeries> {
    if entries.is_empty() {
        return Err(MealMapError::ManualEntryRejected(
            "table data is required".to_string(),
        ));
    }

    if entries.len() != expected_days {
        return Err(MealMapError::ManualEntryRejected(format!(
            "number of rows ({}) does not match the days in the month ({})",
            entries.len(),
            expected_days
        )));
    }

    let mut meals = MealSeries::default();
    for entry in entries {
        for field in MealField::ALL {
            meals.get_mut(field).push(entry.count(field));
        }
    }
    Ok(meals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, base: u32) -> String {
        let mut cols = vec![label.to_string()];
        cols.extend((0..8).map(|i| (base + i).to_string()));
        cols.join("\t")
    }

    #[test]
    fn test_tab_separated_row_is_processed() {
        let table = parse_meal_table(&row("01/03", 10));
        assert_eq!(table.processed, 1);
        assert_eq!(table.skipped, 0);
        assert_eq!(table.meals.breakfast_internal, vec![10]);
        assert_eq!(table.meals.dinner_staff, vec![17]);
    }

    #[test]
    fn test_whitespace_fallback() {
        let table = parse_meal_table("01   1 2 3 4   5 6 7 8\n02 1 1 1 1 1 1 1 1 extra");
        assert_eq!(table.processed, 2);
        assert_eq!(table.meals.lunch_internal, vec![3, 1]);
    }

    #[test]
    fn test_short_row_is_skipped() {
        let text = "01\t1\t2\t3\t4\t5\t6\t7";
        let table = parse_meal_table(text);
        assert_eq!(table.processed, 0);
        assert_eq!(table.skipped, 1);
        assert!(table.meals.is_empty());
    }

    #[test]
    fn test_non_numeric_row_is_skipped_whole() {
        let text = format!("{}\n01\t1\t2\tx\t4\t5\t6\t7\t8\n{}", row("a", 1), row("b", 2));
        let table = parse_meal_table(&text);
        assert_eq!(table.processed, 2);
        assert_eq!(table.skipped, 1);
        for (_, values) in table.meals.iter() {
            assert_eq!(values.len(), 2);
        }
        assert_eq!(table.meals.breakfast_staff, vec![2, 3]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let text = format!("\r\n{}\r\n\r\n{}\r\n", row("a", 1), row("b", 1));
        let table = parse_meal_table(&text);
        assert_eq!(table.processed, 2);
        assert_eq!(table.skipped, 0);
    }

    #[test]
    fn test_blank_input_has_nothing_to_process() {
        let table = parse_meal_table("  \n\t\n");
        assert!(table.blank_input);
        assert!(table.meals.is_empty());

        let verdict = table.verdict(Some(31));
        assert!(verdict.accepted);
        assert_eq!(verdict.processed_count, 0);
        assert_eq!(verdict.message, "Nothing to process");
    }

    #[test]
    fn test_verdict_distinguishes_too_many_and_too_few() {
        let text: Vec<String> = (0..3).map(|i| row(&i.to_string(), i)).collect();
        let table = parse_meal_table(&text.join("\n"));

        let few = table.verdict(Some(4));
        assert!(!few.accepted);
        assert!(few.message.contains("Some days may be missing"));

        let many = table.verdict(Some(2));
        assert!(!many.accepted);
        assert!(many.message.contains("only 2 days"));

        let exact = table.verdict(Some(3));
        assert!(exact.accepted);

        let unhinted = table.verdict(None);
        assert!(unhinted.accepted);
        assert_eq!(unhinted.expected_count, 3);
    }

    #[test]
    fn test_negative_count_is_not_a_meal_count() {
        let table = parse_meal_table("01\t-1\t2\t3\t4\t5\t6\t7\t8");
        assert_eq!(table.processed, 0);
        assert_eq!(table.skipped, 1);
    }

    #[test]
    fn test_siisp_rejects_first_bad_literal() {
        let parsed = parse_siisp_column("10\n20\nabc", 3);
        assert!(!parsed.verdict.accepted);
        assert!(parsed.verdict.message.contains("\"abc\""));
        assert!(parsed.values.is_empty());
    }

    #[test]
    fn test_siisp_rejects_out_of_range_population() {
        let parsed = parse_siisp_column("-9223372036854775808\n10", 2);
        assert!(!parsed.verdict.accepted);
        assert!(parsed.verdict.message.contains("\"-9223372036854775808\""));
        assert!(parsed.values.is_empty());

        let negative = parse_siisp_column("5\n-1", 2);
        assert!(!negative.verdict.accepted);
        assert!(negative.verdict.message.contains("\"-1\""));

        let too_large = parse_siisp_column("4294967296\n1", 2);
        assert!(!too_large.verdict.accepted);

        let ceiling = parse_siisp_column("4294967295\n0", 2);
        assert!(ceiling.verdict.accepted);
        assert_eq!(ceiling.values, vec![MAX_SIISP_VALUE, 0]);
    }

    #[test]
    fn test_siisp_accepts_exact_count() {
        let parsed = parse_siisp_column("10\n\n20\n", 2);
        assert!(parsed.verdict.accepted);
        assert_eq!(parsed.values, vec![10, 20]);
        assert!(!parsed.is_absent());
    }

    #[test]
    fn test_siisp_count_mismatch() {
        let parsed = parse_siisp_column("1\n2\n3", 2);
        assert!(!parsed.verdict.accepted);
        assert_eq!(parsed.verdict.processed_count, 3);
        assert_eq!(parsed.verdict.expected_count, 2);
    }

    #[test]
    fn test_siisp_blank_is_absent_and_accepted() {
        let parsed = parse_siisp_column("", 30);
        assert!(parsed.verdict.accepted);
        assert!(parsed.is_absent());
    }

    #[test]
    fn test_manual_entries_default_missing_counts_to_zero() {
        let entries = vec![
            DailyEntry {
                day: Some(1),
                lunch_internal: Some(40),
                ..Default::default()
            },
            DailyEntry {
                day: Some(2),
                breakfast_staff: Some(3),
                ..Default::default()
            },
        ];
        let meals = series_from_entries(&entries, 2).unwrap();
        assert_eq!(meals.lunch_internal, vec![40, 0]);
        assert_eq!(meals.breakfast_staff, vec![0, 3]);
        assert_eq!(meals.dinner_staff, vec![0, 0]);
    }

    #[test]
    fn test_manual_cells_accept_strings_and_blanks() {
        let entry: DailyEntry = serde_json::from_value(serde_json::json!({
            "dia": "1",
            "cafe_interno": "12",
            "cafe_funcionario": " 3 ",
            "almoco_interno": "",
            "almoco_funcionario": null,
            "jantar_interno": 7
        }))
        .unwrap();

        assert_eq!(entry.day, Some(1));
        assert_eq!(entry.count(MealField::BreakfastInternal), 12);
        assert_eq!(entry.count(MealField::BreakfastStaff), 3);
        assert_eq!(entry.count(MealField::LunchInternal), 0);
        assert_eq!(entry.count(MealField::LunchStaff), 0);
        assert_eq!(entry.count(MealField::SnackStaff), 0);
        assert_eq!(entry.count(MealField::DinnerInternal), 7);
    }

    #[test]
    fn test_bad_manual_cell_names_the_day() {
        let rows = vec![
            serde_json::json!({"dia": 1, "cafe_interno": "4"}),
            serde_json::json!({"dia": 2, "lanche_interno": "muitos"}),
        ];
        match entries_from_json(&rows) {
            Err(MealMapError::ManualEntryRejected(message)) => {
                assert!(message.contains("day 2"), "{}", message);
                assert!(message.contains("muitos"), "{}", message);
            }
            other => panic!("expected a manual entry rejection, got {:?}", other),
        }

        let unlabeled = vec![serde_json::json!({}), serde_json::json!({"jantar_interno": -3})];
        match entries_from_json(&unlabeled) {
            Err(MealMapError::ManualEntryRejected(message)) => assert!(message.contains("day 2")),
            other => panic!("expected a manual entry rejection, got {:?}", other),
        }

        let ok = entries_from_json(&rows[..1]).unwrap();
        assert_eq!(ok[0].breakfast_internal, Some(4));
    }

    #[test]
    fn test_manual_entries_must_cover_month() {
        let entries = vec![DailyEntry::default(); 29];
        assert!(matches!(
            series_from_entries(&entries, 30),
            Err(MealMapError::ManualEntryRejected(_))
        ));
        assert!(series_from_entries(&[], 30).is_err());
    }
}

use crate::error::{MealMapError, Result};
use crate::ingestion::{parse_meal_table, parse_siisp_column, ParsedMealTable, ParsedSiisp};
use crate::schema::{MealSeries, RecordIdentity};
use crate::utils::dates_of_month;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accept/reject outcome for one parsed block. Returned to callers, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub processed_count: usize,
    pub expected_count: usize,
    pub message: String,
}

impl ValidationVerdict {
    pub fn accept(processed: usize, expected: usize, message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            processed_count: processed,
            expected_count: expected,
            message: message.into(),
        }
    }

    pub fn reject(processed: usize, expected: usize, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            processed_count: processed,
            expected_count: expected,
            message: message.into(),
        }
    }
}

/// A meal-map submission whose identifiers have already been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub lot_id: u32,
    pub month: u32,
    pub year: i32,
    pub unit_name: String,
    pub meal_text: String,
    pub siisp_text: Option<String>,
}

impl Submission {
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::new(self.lot_id, self.unit_name.clone(), self.month, self.year)
    }
}

/// Submission as posted by the form: identifiers may arrive as numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionForm {
    #[serde(alias = "lote_id", default)]
    pub lot_id: Option<Value>,
    #[serde(alias = "mes", default)]
    pub month: Option<Value>,
    #[serde(alias = "ano", default)]
    pub year: Option<Value>,
    #[serde(alias = "unidade", default)]
    pub unit_name: Option<String>,
    #[serde(alias = "texto", default)]
    pub meal_text: Option<String>,
    #[serde(alias = "dados_siisp", default)]
    pub siisp_text: Option<String>,
}

/// A form identifier; absent, blank and zero all count as missing.
fn required_number(field: &'static str, value: Option<&Value>) -> Result<i64> {
    let invalid = |raw: String| MealMapError::InvalidIdentifier { field, value: raw };

    let number = match value {
        None | Some(Value::Null) => return Err(MealMapError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(MealMapError::MissingField(field))
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid(s.clone()))?,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| invalid(n.to_string()))?,
        Some(other) => return Err(invalid(other.to_string())),
    };

    if number == 0 {
        return Err(MealMapError::MissingField(field));
    }
    Ok(number)
}

fn narrow<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| MealMapError::InvalidIdentifier {
        field,
        value: value.to_string(),
    })
}

impl TryFrom<SubmissionForm> for Submission {
    type Error = MealMapError;

    fn try_from(form: SubmissionForm) -> Result<Self> {
        let lot_id = narrow("lot_id", required_number("lot_id", form.lot_id.as_ref())?)?;
        let month = narrow("month", required_number("month", form.month.as_ref())?)?;
        let year = narrow("year", required_number("year", form.year.as_ref())?)?;

        let unit_name = form
            .unit_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(MealMapError::MissingField("unit_name"))?;

        Ok(Self {
            lot_id,
            month,
            year,
            unit_name,
            meal_text: form.meal_text.unwrap_or_default(),
            siisp_text: form.siisp_text,
        })
    }
}

/// Counts reported back to the caller on a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub meal_records_processed: usize,
    pub meal_rows_skipped: usize,
    pub expected_days: usize,
    pub siisp_values_processed: usize,
    pub meal_message: String,
    pub siisp_message: String,
}

/// Both parsers run against the month's calendar, before any gating.
#[derive(Debug, Clone)]
pub struct SubmissionCheck {
    pub identity: RecordIdentity,
    pub dates: Vec<String>,
    pub table: ParsedMealTable,
    pub meal_verdict: ValidationVerdict,
    pub siisp: ParsedSiisp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub identity: RecordIdentity,
    pub dates: Vec<String>,
    pub meals: MealSeries,
    pub siisp_reference: Vec<i64>,
    pub summary: ValidationSummary,
}

pub fn check_submission(submission: &Submission) -> Result<SubmissionCheck> {
    let dates = dates_of_month(submission.month, submission.year)?;
    let expected_days = dates.len();

    let table = parse_meal_table(&submission.meal_text);
    let meal_verdict = table.verdict(Some(expected_days));
    let siisp = parse_siisp_column(
        submission.siisp_text.as_deref().unwrap_or_default(),
        expected_days,
    );

    debug!(
        "Checked submission for {} {:02}/{}: meals {}/{} ({}), SIISP {} ({})",
        submission.unit_name,
        submission.month,
        submission.year,
        meal_verdict.processed_count,
        expected_days,
        meal_verdict.accepted,
        siisp.verdict.processed_count,
        siisp.verdict.accepted
    );

    Ok(SubmissionCheck {
        identity: submission.identity(),
        dates,
        table,
        meal_verdict,
        siisp,
    })
}

impl SubmissionCheck {
    /// Gates the submission: either verdict rejecting rejects the whole thing.
    pub fn into_validated(self) -> Result<ValidatedSubmission> {
        if !self.meal_verdict.accepted {
            warn!(
                "Meal data rejected for {} {:02}/{}: {}",
                self.identity.unit_name,
                self.identity.month,
                self.identity.year,
                self.meal_verdict.message
            );
            return Err(MealMapError::MealDataRejected {
                processed: self.meal_verdict.processed_count,
                expected: self.meal_verdict.expected_count,
                message: self.meal_verdict.message,
            });
        }

        if !self.siisp.verdict.accepted {
            warn!(
                "SIISP data rejected for {} {:02}/{}: {}",
                self.identity.unit_name,
                self.identity.month,
                self.identity.year,
                self.siisp.verdict.message
            );
            return Err(MealMapError::SiispDataRejected {
                processed: self.siisp.verdict.processed_count,
                expected: self.siisp.verdict.expected_count,
                message: self.siisp.verdict.message,
            });
        }

        let summary = ValidationSummary {
            meal_records_processed: self.meal_verdict.processed_count,
            meal_rows_skipped: self.table.skipped,
            expected_days: self.dates.len(),
            siisp_values_processed: self.siisp.values.len(),
            meal_message: self.meal_verdict.message,
            siisp_message: self.siisp.verdict.message,
        };

        Ok(ValidatedSubmission {
            identity: self.identity,
            dates: self.dates,
            meals: self.table.meals,
            siisp_reference: self.siisp.values,
            summary,
        })
    }
}

pub fn validate_submission(submission: &Submission) -> Result<ValidatedSubmission> {
    check_submission(submission)?.into_validated()
}

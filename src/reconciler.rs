use crate::aggregator::PeriodFilter;
use crate::deviation::{materialize_deviations, refresh_deviations};
use crate::error::{MealMapError, Result};
use crate::ingestion::{entries_from_json, parse_siisp_column, series_from_entries, DailyEntry};
use crate::schema::{DeviationSeries, MealRecord, MealSeries, RecordIdentity};
use crate::store::RecordStore;
use crate::utils::dates_of_month;
use crate::validation::{validate_submission, Submission, SubmissionForm, ValidationSummary};
use chrono::{Local, NaiveDateTime};
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    pub record: MealRecord,
    pub summary: ValidationSummary,
    /// An earlier record with the same identity was replaced.
    pub replaced: bool,
}

/// Applies validated meal maps to a [`RecordStore`].
///
/// Every operation is a full load, modify, save cycle. Nothing is kept
/// between calls, so a failed save leaves the store as it was.
pub struct Reconciler<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ingest(&self, submission: &Submission) -> Result<IngestionOutcome> {
        let validated = validate_submission(submission)?;
        let identity = validated.identity.clone();

        let (record, replaced) = self.upsert(&identity, |id| {
            new_record(
                id,
                &identity,
                validated.dates,
                validated.meals,
                validated.siisp_reference,
            )
        })?;

        Ok(IngestionOutcome {
            record,
            summary: validated.summary,
            replaced,
        })
    }

    pub fn ingest_form(&self, form: SubmissionForm) -> Result<IngestionOutcome> {
        let submission = Submission::try_from(form)?;
        self.ingest(&submission)
    }

    /// Stores a map typed day by day. The SIISP reference is all zeros.
    pub fn submit_manual(
        &self,
        identity: &RecordIdentity,
        entries: &[DailyEntry],
    ) -> Result<MealRecord> {
        let dates = dates_of_month(identity.month, identity.year)?;
        let meals = series_from_entries(entries, dates.len())?;
        let zeros = vec![0; dates.len()];

        let (record, _) =
            self.upsert(identity, |id| new_record(id, identity, dates, meals, zeros))?;
        Ok(record)
    }

    /// [`Reconciler::submit_manual`] for rows as posted by the form.
    pub fn submit_manual_rows(
        &self,
        identity: &RecordIdentity,
        rows: &[serde_json::Value],
    ) -> Result<MealRecord> {
        let entries = entries_from_json(rows)?;
        self.submit_manual(identity, &entries)
    }

    /// Sets the SIISP column of a map that already has meal data.
    pub fn attach_siisp(&self, identity: &RecordIdentity, siisp_text: &str) -> Result<MealRecord> {
        let expected_days = dates_of_month(identity.month, identity.year)?.len();

        if siisp_text.trim().is_empty() {
            return Err(MealMapError::SiispDataRejected {
                processed: 0,
                expected: expected_days,
                message: "SIISP values are required".to_string(),
            });
        }

        let parsed = parse_siisp_column(siisp_text, expected_days);
        if !parsed.verdict.accepted {
            return Err(MealMapError::SiispDataRejected {
                processed: parsed.verdict.processed_count,
                expected: parsed.verdict.expected_count,
                message: parsed.verdict.message,
            });
        }

        let mut set = self.store.load()?;
        let idx = set
            .position(identity)
            .ok_or_else(|| not_found(identity))?;

        let record = &mut set.records[idx];
        record.siisp_reference = parsed.values;
        record.siisp_updated_at = Some(now());
        materialize_deviations(record);
        let updated = record.clone();

        self.store.save(&set)?;
        info!(
            "Attached {} SIISP values to {} {:02}/{} (lot {})",
            expected_days, identity.unit_name, identity.month, identity.year, identity.lot_id
        );
        Ok(updated)
    }

    pub fn delete(&self, identity: &RecordIdentity) -> Result<MealRecord> {
        let mut set = self.store.load()?;
        let removed = set.remove(identity).ok_or_else(|| not_found(identity))?;

        self.store.save(&set)?;
        info!(
            "Deleted meal map {} for {} {:02}/{} (lot {}), {} remaining",
            removed.id,
            identity.unit_name,
            identity.month,
            identity.year,
            identity.lot_id,
            set.records.len()
        );
        Ok(removed)
    }

    pub fn find(&self, identity: &RecordIdentity) -> Result<Option<MealRecord>> {
        Ok(self.store.load()?.find(identity).cloned())
    }

    pub fn records_for_lot(&self, lot_id: u32, filter: PeriodFilter) -> Result<Vec<MealRecord>> {
        Ok(self
            .store
            .load()?
            .records
            .into_iter()
            .filter(|r| r.lot_id == lot_id && filter.matches(r))
            .collect())
    }

    /// Recomputes derived fields of every stored map, saving only when one changed.
    ///
    /// Returns how many maps changed.
    pub fn materialize_all(&self) -> Result<usize> {
        let mut set = self.store.load()?;
        let changed = set
            .records
            .iter_mut()
            .map(refresh_deviations)
            .filter(|changed| *changed)
            .count();

        if changed > 0 {
            self.store.save(&set)?;
            info!("Materialized deviations for {} meal maps", changed);
        }
        Ok(changed)
    }

    /// Merges maps from a legacy store, skipping any whose id and identity are already present.
    pub fn import_legacy(&self, legacy: Vec<MealRecord>) -> Result<usize> {
        let mut set = self.store.load()?;
        let mut imported = 0;

        for mut record in legacy {
            let identity = record.identity();
            let exists = set
                .records
                .iter()
                .any(|r| r.id == record.id && identity.matches(r));
            if exists {
                debug!(
                    "Legacy map {} for {} {:02}/{} already present",
                    record.id, record.unit_name, record.month, record.year
                );
                continue;
            }

            record.created_at = None;
            set.records.push(record);
            imported += 1;
        }

        if imported > 0 {
            self.store.save(&set)?;
            info!("Imported {} legacy meal maps", imported);
        }
        Ok(imported)
    }

    fn upsert(
        &self,
        identity: &RecordIdentity,
        build: impl FnOnce(u64) -> MealRecord,
    ) -> Result<(MealRecord, bool)> {
        let mut set = self.store.load()?;

        let (id, replaced) = match set.remove(identity) {
            Some(previous) => (previous.id, true),
            None => (set.next_id(), false),
        };

        let mut record = build(id);
        materialize_deviations(&mut record);
        set.records.push(record.clone());

        self.store.save(&set)?;

        if replaced {
            info!(
                "Replaced meal map {} for {} {:02}/{} (lot {})",
                id, identity.unit_name, identity.month, identity.year, identity.lot_id
            );
        } else {
            info!(
                "Created meal map {} for {} {:02}/{} (lot {})",
                id, identity.unit_name, identity.month, identity.year, identity.lot_id
            );
        }

        Ok((record, replaced))
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn not_found(identity: &RecordIdentity) -> MealMapError {
    MealMapError::RecordNotFound {
        lot_id: identity.lot_id,
        unit_name: identity.unit_name.clone(),
        month: identity.month,
        year: identity.year,
    }
}

fn new_record(
    id: u64,
    identity: &RecordIdentity,
    dates: Vec<String>,
    meals: MealSeries,
    siisp_reference: Vec<i64>,
) -> MealRecord {
    MealRecord {
        id,
        lot_id: identity.lot_id,
        unit_name: identity.unit_name.clone(),
        month: identity.month,
        year: identity.year,
        dates,
        created_at: Some(now()),
        siisp_updated_at: None,
        meals,
        siisp_reference,
        deviations: DeviationSeries::default(),
    }
}

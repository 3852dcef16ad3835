use crate::schema::{DeviationSeries, MealField, MealRecord};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationOutcome {
    /// Record had neither meal counts nor a reference; left untouched.
    NothingToCompute,
    /// Deviations were computed against the record's own SIISP reference.
    Computed,
    /// No reference was present; a zero reference was written first.
    ComputedAgainstZeroReference,
}

/// Computes the eight per-day deviation columns of a record.
///
/// A missing SIISP reference is replaced by zeros as long as the longest meal
/// column, and that reference is stored on the record. Columns whose length
/// differs from the reference get an empty deviation.
pub fn materialize_deviations(record: &mut MealRecord) -> DeviationOutcome {
    let longest = record.meals.max_len();
    let mut outcome = DeviationOutcome::Computed;

    if record.siisp_reference.is_empty() {
        if longest == 0 {
            return DeviationOutcome::NothingToCompute;
        }
        debug!(
            "Synthesizing zero SIISP reference of {} days for {} {:02}/{}",
            longest, record.unit_name, record.month, record.year
        );
        record.siisp_reference = vec![0; longest];
        outcome = DeviationOutcome::ComputedAgainstZeroReference;
    }

    let reference = &record.siisp_reference;
    let mut deviations = DeviationSeries::default();

    for field in MealField::ALL {
        let counts = record.meals.get(field);
        if !counts.is_empty() && counts.len() == reference.len() {
            *deviations.get_mut(field) = counts
                .iter()
                .zip(reference)
                .map(|(&count, &siisp)| i64::from(count).saturating_sub(siisp))
                .collect();
        }
    }

    record.deviations = deviations;
    outcome
}

/// Runs [`materialize_deviations`] and reports whether any derived field changed.
pub fn refresh_deviations(record: &mut MealRecord) -> bool {
    let before_reference = record.siisp_reference.clone();
    let before_deviations = record.deviations.clone();

    materialize_deviations(record);

    record.siisp_reference != before_reference || record.deviations != before_deviations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MealSeries;
    use pretty_assertions::assert_eq;

    fn record(meals: MealSeries, siisp: Vec<i64>) -> MealRecord {
        MealRecord {
            id: 1,
            lot_id: 1,
            unit_name: "A".to_string(),
            month: 1,
            year: 2025,
            dates: vec![],
            created_at: None,
            siisp_updated_at: None,
            meals,
            siisp_reference: siisp,
            deviations: DeviationSeries::default(),
        }
    }

    #[test]
    fn test_deviation_against_reference() {
        let meals = MealSeries {
            breakfast_internal: vec![10, 12],
            ..Default::default()
        };
        let mut rec = record(meals, vec![2, 3]);

        assert_eq!(materialize_deviations(&mut rec), DeviationOutcome::Computed);
        assert_eq!(rec.deviations.breakfast_internal, vec![8, 9]);
        assert!(rec.deviations.lunch_internal.is_empty());
    }

    #[test]
    fn test_missing_reference_is_synthesized() {
        let meals = MealSeries {
            breakfast_internal: vec![10, 12],
            dinner_staff: vec![1, 0],
            ..Default::default()
        };
        let mut rec = record(meals, vec![]);

        assert_eq!(
            materialize_deviations(&mut rec),
            DeviationOutcome::ComputedAgainstZeroReference
        );
        assert_eq!(rec.siisp_reference, vec![0, 0]);
        assert_eq!(rec.deviations.breakfast_internal, vec![10, 12]);
        assert_eq!(rec.deviations.dinner_staff, vec![1, 0]);
    }

    #[test]
    fn test_negative_deviation() {
        let meals = MealSeries {
            snack_staff: vec![5],
            ..Default::default()
        };
        let mut rec = record(meals, vec![9]);
        materialize_deviations(&mut rec);
        assert_eq!(rec.deviations.snack_staff, vec![-4]);
    }

    #[test]
    fn test_length_mismatch_yields_empty_column() {
        let meals = MealSeries {
            lunch_internal: vec![1, 2, 3],
            lunch_staff: vec![1, 2],
            ..Default::default()
        };
        let mut rec = record(meals, vec![1, 1, 1]);
        materialize_deviations(&mut rec);
        assert_eq!(rec.deviations.lunch_internal, vec![0, 1, 2]);
        assert!(rec.deviations.lunch_staff.is_empty());
    }

    #[test]
    fn test_synthesized_reference_follows_longest_column() {
        let meals = MealSeries {
            lunch_internal: vec![1, 2, 3],
            lunch_staff: vec![4, 5],
            ..Default::default()
        };
        let mut rec = record(meals, vec![]);
        materialize_deviations(&mut rec);
        assert_eq!(rec.siisp_reference, vec![0, 0, 0]);
        assert_eq!(rec.deviations.lunch_internal, vec![1, 2, 3]);
        assert!(rec.deviations.lunch_staff.is_empty());
    }

    #[test]
    fn test_empty_record_is_unchanged() {
        let mut rec = record(MealSeries::default(), vec![]);
        let before = rec.clone();
        assert_eq!(
            materialize_deviations(&mut rec),
            DeviationOutcome::NothingToCompute
        );
        assert_eq!(rec, before);
    }

    #[test]
    fn test_reference_without_meals_clears_stale_deviations() {
        let mut rec = record(MealSeries::default(), vec![3, 4]);
        rec.deviations.breakfast_internal = vec![99, 99];
        materialize_deviations(&mut rec);
        assert!(rec.deviations.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let meals = MealSeries {
            breakfast_internal: vec![10, 12],
            lunch_staff: vec![7, 7],
            ..Default::default()
        };
        let mut once = record(meals, vec![]);
        materialize_deviations(&mut once);

        let mut twice = once.clone();
        materialize_deviations(&mut twice);
        assert_eq!(once, twice);

        assert!(!refresh_deviations(&mut twice));
    }

    #[test]
    fn test_refresh_detects_stale_deviations() {
        let meals = MealSeries {
            breakfast_internal: vec![10, 12],
            ..Default::default()
        };
        let mut rec = record(meals, vec![2, 3]);
        assert!(refresh_deviations(&mut rec));
        assert!(!refresh_deviations(&mut rec));
    }

    #[test]
    fn test_extreme_stored_reference_saturates() {
        let meals = MealSeries {
            breakfast_internal: vec![3, 3],
            ..Default::default()
        };
        let mut rec = record(meals, vec![i64::MIN, i64::MAX]);
        materialize_deviations(&mut rec);
        assert_eq!(rec.deviations.breakfast_internal, vec![i64::MAX, 3 - i64::MAX]);
    }
}

//! Year-on-year, quarter-to-quarter and month-to-month growth of a metric series.
//!
//! A growth value is `None` whenever it is undefined: the period has no
//! predecessor in the series, or the predecessor's value is zero or not a
//! finite number. Those cases are expected in real exports and are not
//! errors. Duplicate periods are, since the predecessor would be ambiguous.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    period::{PeriodKey, PeriodUnit},
    record::{FlowSource, Metric},
    rounding::round_half_up,
};

/// Decimal places of reported growth percentages.
const GROWTH_DECIMALS: u32 = 2;

/// One observation of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// The period of the observation.
    pub period: PeriodKey,
    /// The observed value.
    pub value: f64,
}

/// An observation with its growth relative to earlier periods.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthRow {
    /// The period of the observation.
    pub period: PeriodKey,
    /// The observed value.
    pub value: f64,
    /// Percentage change from the same quarter of the previous year.
    /// Only computed for quarterly series.
    pub yoy: Option<f64>,
    /// Percentage change from the preceding row of the series.
    /// Only computed for quarterly series.
    pub qtq: Option<f64>,
    /// Percentage change from the preceding calendar month.
    /// Only computed for monthly series.
    pub mtm: Option<f64>,
}

/// Extracts `metric` from each row as a growth series.
///
/// `rows` should contain one row per period, e.g. buckets aggregated without
/// provider grouping, or filtered to a single provider.
pub fn metric_series<T: FlowSource>(rows: &[T], metric: Metric) -> Vec<SeriesPoint> {
    rows.iter()
        .map(|row| SeriesPoint {
            period: row.period(),
            value: metric.read(row),
        })
        .collect()
}

/// Computes the growth columns for `series`.
///
/// Quarterly series get [GrowthRow::yoy] and [GrowthRow::qtq], monthly series
/// get [GrowthRow::mtm]. The returned rows are sorted by period.
///
/// # Errors
/// Returns [Error::InvalidPeriod] if a key does not have the shape of `unit`,
/// and [Error::DuplicatePeriod] if a period appears more than once.
pub fn growth(series: &[SeriesPoint], unit: PeriodUnit) -> Result<Vec<GrowthRow>, Error> {
    if let Some(point) = series.iter().find(|point| !point.period.matches_unit(unit)) {
        return Err(Error::InvalidPeriod(format!(
            "{} is not a valid key for a {unit:?} series",
            point.period
        )));
    }

    let mut sorted = series.to_vec();
    sorted.sort_by_key(|point| point.period);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].period == pair[1].period) {
        return Err(Error::DuplicatePeriod(pair[0].period));
    }

    let values: HashMap<PeriodKey, f64> = sorted
        .iter()
        .map(|point| (point.period, point.value))
        .collect();
    let first_year = sorted.first().map(|point| point.period.get_year());

    let rows = sorted
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let mut row = GrowthRow {
                period: point.period,
                value: point.value,
                yoy: None,
                qtq: None,
                mtm: None,
            };

            match unit {
                PeriodUnit::Quarter => {
                    if first_year.is_some_and(|first_year| point.period.get_year() > first_year) {
                        row.yoy = values
                            .get(&point.period.one_year_earlier())
                            .and_then(|&previous| percent_change(point.value, previous));
                    }

                    if i > 0 {
                        row.qtq = percent_change(point.value, sorted[i - 1].value);
                    }
                }
                PeriodUnit::Month => {
                    row.mtm = point
                        .period
                        .previous_month()
                        .and_then(|previous_month| values.get(&previous_month))
                        .and_then(|&previous| percent_change(point.value, previous));
                }
            }

            row
        })
        .collect();

    Ok(rows)
}

/// `(current - previous) / previous * 100`, rounded half-up.
///
/// Returns `None` instead of an infinite or NaN result.
fn percent_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }

    Some(round_half_up(
        (current - previous) / previous * 100.0,
        GROWTH_DECIMALS,
    ))
}

#[cfg(test)]
mod percent_change_tests {
    use super::percent_change;

    #[test]
    fn increase_and_decrease() {
        assert_eq!(percent_change(150.0, 100.0), Some(50.0));
        assert_eq!(percent_change(100.0, 150.0), Some(-33.33));
    }

    #[test]
    fn zero_previous_is_undefined() {
        assert_eq!(percent_change(10.0, 0.0), None);
        assert_eq!(percent_change(0.0, 0.0), None);
    }

    #[test]
    fn non_finite_inputs_are_undefined() {
        assert_eq!(percent_change(f64::NAN, 10.0), None);
        assert_eq!(percent_change(10.0, f64::NAN), None);
        assert_eq!(percent_change(10.0, f64::INFINITY), None);
    }
}

#[cfg(test)]
mod quarterly_tests {
    use crate::{
        Error,
        growth::{SeriesPoint, growth},
        period::{PeriodKey, PeriodUnit},
    };

    fn point(year: i32, quarter: u8, value: f64) -> SeriesPoint {
        SeriesPoint {
            period: PeriodKey::quarter(year, quarter).unwrap(),
            value,
        }
    }

    #[test]
    fn first_row_has_no_growth() {
        let rows = growth(&[point(2023, 1, 100.0)], PeriodUnit::Quarter).unwrap();

        assert_eq!(rows[0].yoy, None);
        assert_eq!(rows[0].qtq, None);
        assert_eq!(rows[0].mtm, None);
    }

    #[test]
    fn empty_series_gives_empty_result() {
        assert_eq!(growth(&[], PeriodUnit::Quarter), Ok(vec![]));
    }

    #[test]
    fn quarter_to_quarter_uses_previous_row() {
        let series = vec![point(2023, 1, 100.0), point(2023, 2, 150.0), point(2023, 3, 100.0)];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        let qtq: Vec<_> = rows.iter().map(|row| row.qtq).collect();
        assert_eq!(qtq, vec![None, Some(50.0), Some(-33.33)]);
    }

    #[test]
    fn quarter_to_quarter_skips_gaps_in_sequence_order() {
        // Q2 is missing, so Q3 is compared with Q1.
        let series = vec![point(2023, 1, 100.0), point(2023, 3, 120.0)];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        assert_eq!(rows[1].qtq, Some(20.0));
    }

    #[test]
    fn year_on_year_compares_same_quarter() {
        let series = vec![
            point(2023, 1, 100.0),
            point(2023, 2, 200.0),
            point(2024, 1, 150.0),
            point(2024, 2, 100.0),
        ];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        let yoy: Vec<_> = rows.iter().map(|row| row.yoy).collect();
        assert_eq!(yoy, vec![None, None, Some(50.0), Some(-50.0)]);
    }

    #[test]
    fn year_on_year_without_predecessor_is_undefined() {
        let series = vec![point(2023, 1, 100.0), point(2024, 2, 150.0)];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        assert_eq!(rows[1].yoy, None);
        assert_eq!(rows[1].qtq, Some(50.0));
    }

    #[test]
    fn zero_previous_value_is_undefined() {
        let series = vec![point(2023, 1, 0.0), point(2023, 2, 10.0), point(2024, 1, 5.0)];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        assert_eq!(rows[1].qtq, None);
        assert_eq!(rows[2].yoy, None);
        assert!(rows.iter().flat_map(|row| [row.yoy, row.qtq]).flatten().all(f64::is_finite));
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let series = vec![point(2023, 2, 150.0), point(2023, 1, 100.0)];

        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        assert_eq!(rows[0].period, PeriodKey::quarter(2023, 1).unwrap());
        assert_eq!(rows[1].qtq, Some(50.0));
    }

    #[test]
    fn duplicate_period_is_rejected() {
        let series = vec![point(2023, 1, 100.0), point(2023, 2, 1.0), point(2023, 1, 5.0)];

        let result = growth(&series, PeriodUnit::Quarter);

        assert_eq!(
            result,
            Err(Error::DuplicatePeriod(PeriodKey::quarter(2023, 1).unwrap()))
        );
    }

    #[test]
    fn month_keys_are_rejected_for_quarterly_series() {
        let series = vec![SeriesPoint {
            period: PeriodKey::month(2023, 1).unwrap(),
            value: 1.0,
        }];

        assert!(matches!(
            growth(&series, PeriodUnit::Quarter),
            Err(Error::InvalidPeriod(_))
        ));
    }
}


#[cfg(test)]
mod metric_series_tests {
    use crate::{
        aggregation::aggregate,
        growth::{growth, metric_series},
        period::{Granularity, PeriodKey, PeriodUnit},
        record::{Flow, Metric, TransactionRecord},
    };

    #[test]
    fn series_from_buckets_feeds_growth() {
        let record = |month, value| TransactionRecord {
            provider_code: "A".to_owned(),
            provider_name: "A".to_owned(),
            period: PeriodKey::month(2024, month).unwrap(),
            incoming: Flow::new(1, value),
            outgoing: Flow::new(1, value),
            domestic: Flow::default(),
        };
        let records = vec![record(1, 50.0), record(4, 75.0)];

        let buckets = aggregate(&records, false, Granularity::Quarter);
        let series = metric_series(&buckets, Metric::TOTAL_VALUE);
        let rows = growth(&series, PeriodUnit::Quarter).unwrap();

        assert_eq!(series[0].value, 100.0);
        assert_eq!(rows[1].qtq, Some(50.0));
    }

    #[test]
    fn series_split_by_provider_has_duplicate_periods() {
        let record = |code: &str| TransactionRecord {
            provider_code: code.to_owned(),
            provider_name: code.to_owned(),
            period: PeriodKey::month(2024, 1).unwrap(),
            incoming: Flow::new(1, 1.0),
            outgoing: Flow::default(),
            domestic: Flow::default(),
        };
        let records = vec![record("A"), record("B")];

        let buckets = aggregate(&records, true, Granularity::Month);
        let series = metric_series(&buckets, Metric::TOTAL_VALUE);

        assert!(growth(&series, PeriodUnit::Month).is_err());
    }
}

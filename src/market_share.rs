//! Market share of each bucket within its period group.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    aggregation::AggregatedBucket,
    period::PeriodKey,
    record::{Metric, NationalTotal},
    rounding::round_half_up,
};

/// Decimal places of reported shares.
const SHARE_DECIMALS: u32 = 2;

/// Which buckets share a denominator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareGroup {
    /// Every bucket in the table.
    Overall,
    /// Buckets in the same calendar year.
    Year,
    /// Buckets with the same period key.
    Period,
}

impl ShareGroup {
    fn key_of(self, bucket: &AggregatedBucket) -> Option<PeriodKey> {
        match self {
            ShareGroup::Overall => None,
            ShareGroup::Year => Some(PeriodKey::year(bucket.period.get_year())),
            ShareGroup::Period => Some(bucket.period),
        }
    }
}

/// A bucket with its percentage share of the group denominator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketShareRow {
    /// The aggregated bucket.
    pub bucket: AggregatedBucket,
    /// The share in percent, rounded half-up to two decimals. `None` when the
    /// denominator is zero.
    pub market_share: Option<f64>,
}

/// Adds each bucket's share of total value within its `group`.
pub fn with_market_share(buckets: Vec<AggregatedBucket>, group: ShareGroup) -> Vec<MarketShareRow> {
    with_market_share_of(buckets, group, Metric::TOTAL_VALUE)
}

/// Adds each bucket's share of `metric` within its `group`.
pub fn with_market_share_of(
    buckets: Vec<AggregatedBucket>,
    group: ShareGroup,
    metric: Metric,
) -> Vec<MarketShareRow> {
    let mut denominators: HashMap<Option<PeriodKey>, f64> = HashMap::new();

    for bucket in &buckets {
        *denominators.entry(group.key_of(bucket)).or_insert(0.0) += metric.read(bucket);
    }

    buckets
        .into_iter()
        .map(|bucket| {
            let denominator = denominators[&group.key_of(&bucket)];
            MarketShareRow {
                market_share: share_percent(metric.read(&bucket), denominator),
                bucket,
            }
        })
        .collect()
}

/// Adds each bucket's share of the national total reported for its period.
///
/// `national` must be aggregated to the same granularity as `buckets`.
/// Buckets whose period has no national row get no share.
pub fn national_share(
    buckets: Vec<AggregatedBucket>,
    national: &[NationalTotal],
    metric: Metric,
) -> Vec<MarketShareRow> {
    let national_by_period: HashMap<PeriodKey, f64> = national
        .iter()
        .map(|row| (row.period, metric.read(row)))
        .collect();

    buckets
        .into_iter()
        .map(|bucket| {
            let market_share = national_by_period
                .get(&bucket.period)
                .and_then(|&denominator| share_percent(metric.read(&bucket), denominator));

            MarketShareRow {
                bucket,
                market_share,
            }
        })
        .collect()
}

fn share_percent(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 || !whole.is_finite() || !part.is_finite() {
        return None;
    }

    Some(round_half_up(part / whole * 100.0, SHARE_DECIMALS))
}

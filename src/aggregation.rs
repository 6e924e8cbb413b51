//! Grouping of transaction records into provider/period buckets.
//!
//! Provides functions to sum the frequency and value of each category per
//! period, optionally split by provider, and to coarsen national totals to
//! the same granularity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    period::{Granularity, PeriodKey},
    record::{Category, Flow, FlowSource, NationalTotal, TransactionRecord},
};

/// The summed flows of one (period, provider) combination.
///
/// `total` is always the sum of the three component flows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    /// The provider code, or `None` when records were not grouped by provider.
    pub provider_code: Option<String>,
    /// The provider name from the first record seen for the code.
    pub provider_name: Option<String>,
    /// The period at the requested granularity.
    pub period: PeriodKey,
    /// Summed incoming flow.
    pub incoming: Flow,
    /// Summed outgoing flow.
    pub outgoing: Flow,
    /// Summed domestic flow.
    pub domestic: Flow,
    /// Derived total of the three flows.
    pub total: Flow,
}

impl AggregatedBucket {
    fn from_sums(
        provider_code: Option<String>,
        provider_name: Option<String>,
        period: PeriodKey,
        sums: [Flow; 3],
    ) -> Self {
        let [incoming, outgoing, domestic] = sums;
        let total = Flow::new(
            incoming.count + outgoing.count + domestic.count,
            incoming.value + outgoing.value + domestic.value,
        );

        Self {
            provider_code,
            provider_name,
            period,
            incoming,
            outgoing,
            domestic,
            total,
        }
    }
}

impl FlowSource for AggregatedBucket {
    fn period(&self) -> PeriodKey {
        self.period
    }

    fn flow(&self, category: Category) -> Flow {
        match category {
            Category::Incoming => self.incoming,
            Category::Outgoing => self.outgoing,
            Category::Domestic => self.domestic,
            Category::Total => self.total,
        }
    }
}

#[derive(Default)]
struct BucketSums {
    provider_name: Option<String>,
    flows: [Flow; 3],
}

/// Sums transaction records per period and, optionally, per provider.
///
/// # Arguments
/// * `records` - The loaded transaction records
/// * `group_by_provider` - Whether to keep one bucket per provider code
/// * `granularity` - The period size of each bucket
///
/// # Returns
/// One bucket per distinct (period, provider) combination present in
/// `records`, ordered by period and then provider code. Combinations without
/// records are not filled in.
pub fn aggregate(
    records: &[TransactionRecord],
    group_by_provider: bool,
    granularity: Granularity,
) -> Vec<AggregatedBucket> {
    let mut sums: BTreeMap<(PeriodKey, Option<&str>), BucketSums> = BTreeMap::new();

    for record in records {
        let provider = group_by_provider.then_some(record.provider_code.as_str());
        let entry = sums
            .entry((record.period.truncate(granularity), provider))
            .or_default();

        if group_by_provider && entry.provider_name.is_none() {
            entry.provider_name = Some(record.provider_name.clone());
        }

        for (flow, category) in entry.flows.iter_mut().zip(Category::FLOWS) {
            flow.accumulate(record.flow(category));
        }
    }

    let buckets: Vec<_> = sums
        .into_iter()
        .map(|((period, provider), sums)| {
            // Totals are derived only once the component sums are final.
            AggregatedBucket::from_sums(
                provider.map(str::to_owned),
                sums.provider_name,
                period,
                sums.flows,
            )
        })
        .collect();

    tracing::debug!(
        "aggregated {} records into {} buckets at {granularity:?} granularity",
        records.len(),
        buckets.len()
    );

    buckets
}

/// Sums national-total rows per period.
///
/// The reported national `total` columns are summed as they are, they are
/// not recomputed from the three flows.
pub fn aggregate_national(totals: &[NationalTotal], granularity: Granularity) -> Vec<NationalTotal> {
    let mut sums: BTreeMap<PeriodKey, [Flow; 4]> = BTreeMap::new();

    for row in totals {
        let entry = sums.entry(row.period.truncate(granularity)).or_default();

        for (flow, category) in entry.iter_mut().zip(Category::ALL) {
            flow.accumulate(row.flow(category));
        }
    }

    sums.into_iter()
        .map(|(period, [incoming, outgoing, domestic, total])| NationalTotal {
            period,
            incoming,
            outgoing,
            domestic,
            total,
        })
        .collect()
}

//! The loaded tables of one upload together with the current filter selection.
//!
//! Every view is recomputed from the loaded tables on each call, so changing
//! the filter never leaves stale derived rows behind.

use std::{collections::BTreeSet, ops::RangeInclusive, path::Path};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    aggregation::{AggregatedBucket, aggregate, aggregate_national},
    config::DashboardConfig,
    fraud::{FlaggedTransaction, ModelRegistry, flag_transactions},
    growth::{GrowthRow, growth, metric_series},
    loader::{Workbook, load_workbook},
    market_share::{MarketShareRow, ShareGroup, national_share, with_market_share_of},
    period::{Granularity, PeriodKey, PeriodUnit},
    provider::ProviderCache,
    record::{Metric, NationalTotal, TransactionRecord},
};

/// The filters chosen for the current view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    /// Provider codes to include. `None` includes every provider.
    pub providers: Option<BTreeSet<String>>,
    /// Inclusive range of years to include. `None` includes every year.
    pub years: Option<RangeInclusive<i32>>,
    /// The bucket size of aggregated views.
    pub granularity: Granularity,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            providers: None,
            years: None,
            granularity: Granularity::Month,
        }
    }
}

impl FilterSelection {
    fn includes_period(&self, period: &PeriodKey) -> bool {
        self.years
            .as_ref()
            .is_none_or(|years| years.contains(&period.get_year()))
    }

    fn includes(&self, record: &TransactionRecord) -> bool {
        self.includes_period(&record.period)
            && self
                .providers
                .as_ref()
                .is_none_or(|providers| providers.contains(&record.provider_code))
    }
}

/// The state of one user's session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    workbook: Workbook,
    filter: FilterSelection,
}

impl SessionContext {
    /// Start a session on already loaded tables with no filters applied.
    pub fn new(workbook: Workbook) -> Self {
        Self {
            workbook,
            filter: FilterSelection::default(),
        }
    }

    /// Load the workbook at `path` and start a session on it.
    ///
    /// # Errors
    /// Returns the errors of [load_workbook].
    pub fn load(path: &Path, config: &DashboardConfig) -> Result<Self, Error> {
        Ok(Self::new(load_workbook(path, config)?))
    }

    /// The tables as loaded, without filters.
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// The current filter selection.
    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    /// Replace the filter selection.
    pub fn set_filter(&mut self, filter: FilterSelection) {
        tracing::debug!("filter changed to {filter:?}");
        self.filter = filter;
    }

    /// The distinct provider codes in the loaded records, for filter choices.
    pub fn provider_codes(&self) -> Vec<&str> {
        self.workbook
            .records
            .iter()
            .map(|record| record.provider_code.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The distinct years in the loaded records, for filter choices.
    pub fn years(&self) -> Vec<i32> {
        self.workbook
            .records
            .iter()
            .map(|record| record.period.get_year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The records that pass the current filter.
    pub fn filtered_records(&self) -> Vec<TransactionRecord> {
        self.workbook
            .records
            .iter()
            .filter(|record| self.filter.includes(record))
            .cloned()
            .collect()
    }

    fn filtered_national(&self) -> Vec<NationalTotal> {
        self.workbook
            .national
            .iter()
            .filter(|row| self.filter.includes_period(&row.period))
            .cloned()
            .collect()
    }

    /// Filtered records summed per provider at the selected granularity.
    pub fn provider_buckets(&self) -> Vec<AggregatedBucket> {
        aggregate(&self.filtered_records(), true, self.filter.granularity)
    }

    /// Like [SessionContext::provider_buckets], with names taken from the
    /// provider reference table.
    ///
    /// Codes missing from the table keep the name written in the export.
    ///
    /// # Errors
    /// Returns the errors of [ProviderCache::names].
    pub fn named_provider_buckets(
        &self,
        cache: &ProviderCache,
        connection: &Connection,
    ) -> Result<Vec<AggregatedBucket>, Error> {
        let names = cache.names(connection)?;

        Ok(self
            .provider_buckets()
            .into_iter()
            .map(|mut bucket| {
                if let Some(name) = bucket
                    .provider_code
                    .as_ref()
                    .and_then(|code| names.get(code))
                {
                    bucket.provider_name = Some(name.clone());
                }

                bucket
            })
            .collect())
    }

    /// Filtered records summed over all providers at the selected granularity.
    pub fn overall_buckets(&self) -> Vec<AggregatedBucket> {
        aggregate(&self.filtered_records(), false, self.filter.granularity)
    }

    /// Each provider bucket's share of `metric` within `group`.
    pub fn market_share(&self, group: ShareGroup, metric: Metric) -> Vec<MarketShareRow> {
        with_market_share_of(self.provider_buckets(), group, metric)
    }

    /// Each provider bucket's share of the national total of `metric` for the
    /// same period.
    pub fn national_market_share(&self, metric: Metric) -> Vec<MarketShareRow> {
        let national = aggregate_national(&self.filtered_national(), self.filter.granularity);

        national_share(self.provider_buckets(), &national, metric)
    }

    /// Growth of `metric` summed over the filtered providers.
    ///
    /// # Errors
    /// Returns the errors of [growth].
    pub fn growth(&self, metric: Metric, unit: PeriodUnit) -> Result<Vec<GrowthRow>, Error> {
        let buckets = aggregate(&self.filtered_records(), false, unit.into());

        growth(&metric_series(&buckets, metric), unit)
    }

    /// Growth of `metric` for a single provider, ignoring the provider filter.
    ///
    /// # Errors
    /// Returns the errors of [growth].
    pub fn provider_growth(
        &self,
        provider_code: &str,
        metric: Metric,
        unit: PeriodUnit,
    ) -> Result<Vec<GrowthRow>, Error> {
        let records: Vec<_> = self
            .workbook
            .records
            .iter()
            .filter(|record| {
                record.provider_code == provider_code
                    && self.filter.includes_period(&record.period)
            })
            .cloned()
            .collect();
        let buckets = aggregate(&records, false, unit.into());

        growth(&metric_series(&buckets, metric), unit)
    }

    /// Growth of the national total of `metric`.
    ///
    /// # Errors
    /// Returns the errors of [growth].
    pub fn national_growth(
        &self,
        metric: Metric,
        unit: PeriodUnit,
    ) -> Result<Vec<GrowthRow>, Error> {
        let national = aggregate_national(&self.filtered_national(), unit.into());

        growth(&metric_series(&national, metric), unit)
    }

    /// Run the model registered as `model_id` over the filtered records.
    ///
    /// # Errors
    /// Returns the errors of [flag_transactions].
    pub fn flag_transactions(
        &self,
        model_id: &str,
        registry: &ModelRegistry,
    ) -> Result<Vec<FlaggedTransaction>, Error> {
        flag_transactions(&self.filtered_records(), model_id, registry)
    }
}

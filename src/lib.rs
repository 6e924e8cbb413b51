//! Reporting core for payment-service-provider (PJP) transaction exports.
//!
//! The crate loads spreadsheet exports of per-provider transaction records,
//! aggregates them by provider and period, and derives market-share and
//! period-over-period growth tables. Numbers are formatted for Indonesian or
//! English display, provider names come from a SQLite reference table behind
//! a TTL cache, and pre-trained anomaly models can flag suspicious rows.

#![warn(missing_docs)]

mod aggregation;
mod config;
mod db;
mod format;
mod fraud;
mod growth;
mod loader;
mod logging;
mod market_share;
mod period;
mod provider;
mod record;
mod rounding;
mod session;

pub use aggregation::{AggregatedBucket, aggregate, aggregate_national};
pub use config::DashboardConfig;
pub use db::{initialize as initialize_db, open_shared};
pub use format::{
    Locale, MAX_DECIMALS, NumberFormat, PercentFormat, format_indonesian, format_integer,
    format_number, format_percent, period_label,
};
pub use fraud::{
    AnomalyModel, FEATURE_COUNT, FeatureRange, FlaggedTransaction, FraudSummary, ModelRegistry,
    RangeModel, Verdict, feature_vector, flag_transactions,
};
pub use growth::{GrowthRow, SeriesPoint, growth, metric_series};
pub use loader::{Workbook, load_detail_csv, load_workbook};
pub use logging::setup_logging;
pub use market_share::{
    MarketShareRow, ShareGroup, national_share, with_market_share, with_market_share_of,
};
pub use period::{Granularity, PeriodKey, PeriodUnit};
pub use provider::{
    Provider, ProviderCache, ProviderCode, create_provider, create_provider_table,
    delete_provider, get_all_providers, get_provider, update_provider,
};
pub use record::{Category, Flow, FlowSource, Measure, Metric, NationalTotal, TransactionRecord};
pub use rounding::round_half_up;
pub use session::{FilterSelection, SessionContext};

/// The errors that may occur while loading, computing or storing report data.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The workbook does not contain a sheet with the expected name.
    #[error("sheet \"{0}\" not found in the workbook")]
    MissingSheet(String),

    /// The file could not be opened or decoded as a workbook or CSV export.
    ///
    /// Callers should pass in the original error as a string.
    #[error("could not read the file: {0}")]
    UnreadableFile(String),

    /// A required column is missing from a sheet's header row.
    #[error("sheet \"{sheet}\" is missing the column \"{column}\"")]
    MissingColumn {
        /// The sheet that was being read.
        sheet: String,
        /// The column name that could not be found.
        column: String,
    },

    /// A cell could not be converted into the expected type.
    ///
    /// `row` is the one-based row number as shown in a spreadsheet program.
    #[error("invalid value in sheet \"{sheet}\", row {row}, column \"{column}\": {message}")]
    InvalidCell {
        /// The sheet that was being read.
        sheet: String,
        /// The one-based spreadsheet row.
        row: usize,
        /// The column name.
        column: String,
        /// What was wrong with the value.
        message: String,
    },

    /// The same period appears more than once in a growth series.
    #[error("the period {0} appears more than once in the series")]
    DuplicatePeriod(PeriodKey),

    /// A period key does not have the shape required by the computation, e.g.
    /// a month-to-month series containing a key without a month.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// An empty string was used as a provider code.
    #[error("provider code cannot be empty")]
    EmptyProviderCode,

    /// An empty string was used as a provider name.
    #[error("provider name cannot be empty")]
    EmptyProviderName,

    /// The provider code already exists in the reference table.
    #[error("the provider code \"{0}\" already exists in the database")]
    DuplicateProviderCode(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a provider that does not exist.
    #[error("tried to update a provider that is not in the database")]
    UpdateMissingProvider,

    /// Tried to delete a provider that does not exist.
    #[error("tried to delete a provider that is not in the database")]
    DeleteMissingProvider,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// No model is registered under the requested identifier.
    #[error("no anomaly model registered as \"{0}\"")]
    ModelNotFound(String),

    /// A model file could not be read or parsed.
    #[error("could not load anomaly model: {0}")]
    ModelLoad(String),

    /// A model returned a prediction other than `1` or `-1`.
    #[error("model returned the prediction {0}, expected 1 or -1")]
    InvalidPrediction(i8),

    /// A model returned a different number of predictions than rows given.
    #[error("model returned {got} predictions for {expected} rows")]
    PredictionLengthMismatch {
        /// The number of rows passed to the model.
        expected: usize,
        /// The number of predictions returned.
        got: usize,
    },

    /// The configuration could not be parsed or contains invalid values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The global tracing subscriber could not be installed.
    #[error("could not set up logging: {0}")]
    Logging(String),
}

/// SQLite extended result code for a failed UNIQUE constraint.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLite extended result code for a failed PRIMARY KEY constraint.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if matches!(
                    sql_error.extended_code,
                    SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY
                ) && desc.ends_with("provider.code") =>
            {
                // The constraint message does not carry the offending value,
                // callers that know it should replace the empty code.
                Error::DuplicateProviderCode(String::new())
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// A one-line message suitable for showing to the person who uploaded the
    /// file or edited the provider table.
    ///
    /// Upstream failures (SQL, locking) are logged and replaced with a generic
    /// message.
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingSheet(sheet) => format!(
                "The uploaded workbook has no sheet named \"{sheet}\". \
                Check that you uploaded the correct export."
            ),
            Error::UnreadableFile(_) => {
                "The uploaded file could not be read. Upload an xlsx, xls, ods or csv export."
                    .to_owned()
            }
            Error::MissingColumn { sheet, column } => {
                format!("Sheet \"{sheet}\" is missing the column \"{column}\".")
            }
            Error::InvalidCell { .. } | Error::DuplicatePeriod(_) | Error::InvalidPeriod(_) => {
                format!("The data could not be processed: {self}.")
            }
            Error::EmptyProviderCode | Error::EmptyProviderName => format!("{self}."),
            Error::DuplicateProviderCode(code) => format!(
                "The provider code {code} already exists. \
                Choose a different code, or edit or delete the existing provider."
            ),
            Error::NotFound | Error::UpdateMissingProvider | Error::DeleteMissingProvider => {
                "The provider could not be found. Try refreshing the provider list.".to_owned()
            }
            Error::ModelNotFound(model_id) => {
                format!("The anomaly model \"{model_id}\" is not available.")
            }
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                "Something went wrong, check the server logs for more details.".to_owned()
            }
        }
    }
}

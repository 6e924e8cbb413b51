//! Typed rows loaded from a PJP transaction export.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{format::Locale, period::PeriodKey};

/// A transaction category.
///
/// `Total` is derived from the other three and never appears as a detail
/// column, only as a national-total column and a derived bucket field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Funds received from outside the country.
    Incoming,
    /// Funds sent outside the country.
    Outgoing,
    /// Transfers within the country.
    Domestic,
    /// The sum of the three flows.
    Total,
}

struct CategoryStyle {
    code: &'static str,
    label_en: &'static str,
    label_id: &'static str,
    color: &'static str,
}

// Indexed by `Category as usize`.
const CATEGORY_STYLES: [CategoryStyle; 4] = [
    CategoryStyle {
        code: "Inc",
        label_en: "Incoming",
        label_id: "Masuk",
        color: "#1f77b4",
    },
    CategoryStyle {
        code: "Out",
        label_en: "Outgoing",
        label_id: "Keluar",
        color: "#ff7f0e",
    },
    CategoryStyle {
        code: "Dom",
        label_en: "Domestic",
        label_id: "Domestik",
        color: "#2ca02c",
    },
    CategoryStyle {
        code: "Total",
        label_en: "Total",
        label_id: "Total",
        color: "#7f7f7f",
    },
];

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 4] = [
        Category::Incoming,
        Category::Outgoing,
        Category::Domestic,
        Category::Total,
    ];

    /// The three categories that are summed into [Category::Total].
    pub const FLOWS: [Category; 3] = [Category::Incoming, Category::Outgoing, Category::Domestic];

    fn style(self) -> &'static CategoryStyle {
        &CATEGORY_STYLES[self as usize]
    }

    /// The suffix used in export column names, e.g. `"Inc"` in `Fin Nilai Inc`.
    pub fn column_code(self) -> &'static str {
        self.style().code
    }

    /// The display label in `locale`.
    pub fn label(self, locale: Locale) -> &'static str {
        match locale {
            Locale::Indonesian => self.style().label_id,
            Locale::English => self.style().label_en,
        }
    }

    /// The chart colour as a hex string.
    pub fn color(self) -> &'static str {
        self.style().color
    }
}

/// Which of the two numbers of a [Flow] to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    /// The number of transactions (`Jumlah`/`Frek` columns).
    Frequency,
    /// The transaction value (`Nilai`/`Nom` columns).
    Value,
}

/// One numeric column of a bucket: a category and a measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metric {
    /// The transaction category.
    pub category: Category,
    /// Frequency or value.
    pub measure: Measure,
}

impl Metric {
    /// Total transaction value, the default market-share and growth metric.
    pub const TOTAL_VALUE: Metric = Metric::new(Category::Total, Measure::Value);

    /// Total transaction frequency.
    pub const TOTAL_FREQUENCY: Metric = Metric::new(Category::Total, Measure::Frequency);

    /// Create a metric.
    pub const fn new(category: Category, measure: Measure) -> Self {
        Self { category, measure }
    }

    /// Read this metric from a flow source.
    pub fn read<T: FlowSource>(&self, source: &T) -> f64 {
        let flow = source.flow(self.category);

        match self.measure {
            Measure::Frequency => flow.count as f64,
            Measure::Value => flow.value,
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let measure = match self.measure {
            Measure::Frequency => "frequency",
            Measure::Value => "value",
        };

        write!(f, "{} {measure}", self.category.column_code())
    }
}

/// The number and value of transactions in one category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Number of transactions.
    pub count: u64,
    /// Total transaction value.
    pub value: f64,
}

impl Flow {
    /// Create a flow.
    pub fn new(count: u64, value: f64) -> Self {
        Self { count, value }
    }

    pub(crate) fn accumulate(&mut self, other: Flow) {
        self.count += other.count;
        self.value += other.value;
    }
}

/// Rows keyed by a period that expose one [Flow] per category.
pub trait FlowSource {
    /// The period the row belongs to.
    fn period(&self) -> PeriodKey;

    /// The flow for `category`.
    fn flow(&self, category: Category) -> Flow;
}

/// One row of the per-transaction detail sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The provider's code in the reference table.
    pub provider_code: String,
    /// The provider's name as written in the export.
    pub provider_name: String,
    /// The month the transactions were reported for.
    pub period: PeriodKey,
    /// Funds received from abroad.
    pub incoming: Flow,
    /// Funds sent abroad.
    pub outgoing: Flow,
    /// Transfers within the country.
    pub domestic: Flow,
}

impl FlowSource for TransactionRecord {
    fn period(&self) -> PeriodKey {
        self.period
    }

    fn flow(&self, category: Category) -> Flow {
        match category {
            Category::Incoming => self.incoming,
            Category::Outgoing => self.outgoing,
            Category::Domestic => self.domestic,
            Category::Total => Flow::new(
                self.incoming.count + self.outgoing.count + self.domestic.count,
                self.incoming.value + self.outgoing.value + self.domestic.value,
            ),
        }
    }
}

/// One row of the national-totals sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NationalTotal {
    /// The month the totals were reported for.
    pub period: PeriodKey,
    /// National incoming flow.
    pub incoming: Flow,
    /// National outgoing flow.
    pub outgoing: Flow,
    /// National domestic flow.
    pub domestic: Flow,
    /// National total as reported in the sheet.
    pub total: Flow,
}

impl FlowSource for NationalTotal {
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

//! Display strings for numbers, percentages and periods.
//!
//! Indonesian reports group thousands with `.` and use `,` as the decimal
//! mark (`1.234.567,90`). English output, which is also what the charting
//! layer consumes, uses `,` and `.`. All rounding is half-up.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};
use serde::{Deserialize, Serialize};

use crate::{period::PeriodKey, rounding::to_rounded_decimal};

/// The placeholder shown for missing numbers.
pub const DEFAULT_PLACEHOLDER: &str = "-";

/// The most decimal places a number is printed with. Larger requests are
/// clamped to this.
pub const MAX_DECIMALS: u32 = 10;

/// The separator convention used when formatting numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    /// `.` thousands separator, `,` decimal mark.
    Indonesian,
    /// `,` thousands separator, `.` decimal mark.
    English,
}

impl Locale {
    fn thousands_separator(self) -> char {
        match self {
            Locale::Indonesian => '.',
            Locale::English => ',',
        }
    }

    fn decimal_mark(self) -> char {
        match self {
            Locale::Indonesian => ',',
            Locale::English => '.',
        }
    }
}

/// Options for [format_number].
#[derive(Clone, Debug, PartialEq)]
pub struct NumberFormat {
    /// The separator convention.
    pub locale: Locale,
    /// The number of decimal places, always printed in full. At most
    /// [MAX_DECIMALS] places are printed.
    pub decimals: u32,
    /// Whether to insert thousands separators.
    pub grouping: bool,
    /// The text returned for missing or non-finite values.
    pub placeholder: String,
}

impl NumberFormat {
    /// Indonesian separators with grouping and the `-` placeholder.
    pub fn indonesian(decimals: u32) -> Self {
        Self {
            locale: Locale::Indonesian,
            decimals,
            grouping: true,
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
        }
    }

    /// English separators with grouping and the `-` placeholder.
    pub fn english(decimals: u32) -> Self {
        Self {
            locale: Locale::English,
            decimals,
            grouping: true,
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
        }
    }
}

/// Options for [format_percent].
#[derive(Clone, Debug, PartialEq)]
pub struct PercentFormat {
    /// The separator convention.
    pub locale: Locale,
    /// The number of decimal places, always printed in full. At most
    /// [MAX_DECIMALS] places are printed.
    pub decimals: u32,
    /// Prefix positive values with `+`.
    pub signed: bool,
    /// Put a space between the number and `%`.
    pub space_before_percent: bool,
    /// The text returned for missing or non-finite values.
    pub placeholder: String,
}

impl PercentFormat {
    /// Growth figures in reports, e.g. `+12,50%`.
    pub fn indonesian_growth(decimals: u32) -> Self {
        Self {
            locale: Locale::Indonesian,
            decimals,
            signed: true,
            space_before_percent: false,
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
        }
    }

    /// Chart labels, e.g. `12.50 %`, with an empty placeholder so missing
    /// points render as gaps.
    pub fn plotting(decimals: u32) -> Self {
        Self {
            locale: Locale::English,
            decimals,
            signed: false,
            space_before_percent: true,
            placeholder: String::new(),
        }
    }
}

/// Format `value` as a number in Indonesian notation with `decimals` places.
///
/// Returns `"-"` for `None`.
pub fn format_indonesian(value: Option<f64>, decimals: u32) -> String {
    format_number(value, &NumberFormat::indonesian(decimals))
}

/// Format `value` according to `format`.
pub fn format_number(value: Option<f64>, format: &NumberFormat) -> String {
    match value.and_then(|value| render(value, format.decimals, format.locale, format.grouping)) {
        Some(rendered) => rendered.to_string(),
        None => format.placeholder.clone(),
    }
}

/// Format `value` as a whole number, rounding half-up first.
///
/// Returns `"-"` for `None`.
pub fn format_integer(value: Option<f64>, locale: Locale) -> String {
    let format = NumberFormat {
        locale,
        decimals: 0,
        grouping: true,
        placeholder: DEFAULT_PLACEHOLDER.to_owned(),
    };

    format_number(value, &format)
}

/// Format `value` (already a percentage, e.g. `12.5` for 12.5%) according to `format`.
pub fn format_percent(value: Option<f64>, format: &PercentFormat) -> String {
    let Some(rendered) = value.and_then(|value| render(value, format.decimals, format.locale, false))
    else {
        return format.placeholder.clone();
    };

    let sign = if format.signed && rendered.is_positive() {
        "+"
    } else {
        ""
    };
    let space = if format.space_before_percent { " " } else { "" };

    format!("{sign}{rendered}{space}%")
}

const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_ID: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "Mei", "Jun", "Jul", "Agu", "Sep", "Okt", "Nov", "Des",
];

/// A short label for chart axes and table headers: `"2024"`, `"Q1 2024"` or
/// `"Mei 2024"`.
pub fn period_label(period: &PeriodKey, locale: Locale) -> String {
    let year = period.get_year();

    match (period.get_quarter(), period.get_month()) {
        (_, Some(month)) => {
            let names = match locale {
                Locale::Indonesian => &MONTHS_ID,
                Locale::English => &MONTHS_EN,
            };
            // Month keys are validated to 1..=12 on construction.
            format!("{} {year}", names[usize::from(month) - 1])
        }
        (Some(quarter), None) => format!("Q{quarter} {year}"),
        (None, None) => year.to_string(),
    }
}

/// A rounded number split into its sign and display digits.
struct Rendered {
    negative: bool,
    zero: bool,
    digits: String,
}

impl Rendered {
    fn is_positive(&self) -> bool {
        !self.negative && !self.zero
    }
}

impl std::fmt::Display for Rendered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negative {
            write!(f, "-{}", self.digits)
        } else {
            write!(f, "{}", self.digits)
        }
    }
}

fn render(value: f64, decimals: u32, locale: Locale, grouping: bool) -> Option<Rendered> {
    if !value.is_finite() {
        return None;
    }

    let decimals = decimals.min(MAX_DECIMALS);
    let plain = match to_rounded_decimal(value, decimals) {
        Some(decimal) => decimal.to_string(),
        None => format!("{:.*}", decimals as usize, value),
    };

    let (negative, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, plain.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let zero = unsigned.chars().all(|c| c == '0' || c == '.');

    let mut digits = match integer.parse::<f64>() {
        Ok(whole) if grouping => integer_formatter(locale).fmt_string(whole),
        _ => integer.to_owned(),
    };

    if let Some(fraction) = fraction {
        digits.push(locale.decimal_mark());
        digits.push_str(fraction);
    }

    Some(Rendered {
        // Values that round to zero are shown without a sign.
        negative: negative && !zero,
        zero,
        digits,
    })
}

/// Groups the digits of an already rounded, non-negative whole number.
fn integer_formatter(locale: Locale) -> &'static Formatter {
    static INDONESIAN_FMT: OnceLock<Formatter> = OnceLock::new();
    static ENGLISH_FMT: OnceLock<Formatter> = OnceLock::new();

    let formatter = match locale {
        Locale::Indonesian => &INDONESIAN_FMT,
        Locale::English => &ENGLISH_FMT,
    };

    formatter.get_or_init(|| {
        Formatter::new()
            .separator(locale.thousands_separator())
            .expect("thousands separators are single-byte characters")
            .precision(Precision::Decimals(0))
    })
}

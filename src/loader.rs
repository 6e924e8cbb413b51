//! Reading PJP transaction exports into typed records.
//!
//! Workbooks (xlsx, xls, xlsb, ods) are read with `calamine`, CSV exports of
//! the detail sheet with `csv`. Both are first turned into a table of
//! cells so that header validation and cell conversion happen in one place.

use std::{collections::HashMap, io::Read, path::Path};

use calamine::{Data, Range, Reader, open_workbook_auto};

use crate::{
    Error,
    config::DashboardConfig,
    period::PeriodKey,
    record::{Category, Flow, Measure, NationalTotal, TransactionRecord},
};

const PROVIDER_CODE_COLUMN: &str = "Kode PJP";
const PROVIDER_NAME_COLUMN: &str = "Nama PJP";
const YEAR_COLUMN: &str = "Year";
const QUARTER_COLUMN: &str = "Quarter";
const MONTH_COLUMN: &str = "Month";

/// The label used in errors for CSV exports, which have no sheet name.
const CSV_SHEET_LABEL: &str = "csv";

/// The tables loaded from one uploaded workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    /// Rows of the per-transaction detail sheet.
    pub records: Vec<TransactionRecord>,
    /// Rows of the national-totals sheet.
    pub national: Vec<NationalTotal>,
}

/// Loads the detail and national-total sheets of the workbook at `path`.
///
/// Sheet names are taken from `config`.
///
/// # Errors
/// Returns [Error::UnreadableFile] if the file cannot be opened as a workbook,
/// [Error::MissingSheet] if either sheet is absent, [Error::MissingColumn] if a
/// required header is absent and [Error::InvalidCell] for malformed values.
pub fn load_workbook(path: &Path, config: &DashboardConfig) -> Result<Workbook, Error> {
    let mut workbook = open_workbook_auto(path).map_err(|error| {
        tracing::warn!("could not open workbook {}: {error}", path.display());
        Error::UnreadableFile(error.to_string())
    })?;

    let sheet_names = workbook.sheet_names();
    ensure_sheet(&sheet_names, &config.detail_sheet)?;
    ensure_sheet(&sheet_names, &config.national_sheet)?;

    let detail = workbook
        .worksheet_range(&config.detail_sheet)
        .map_err(|error| Error::UnreadableFile(error.to_string()))?;
    let records = parse_detail(&Table::from_range(&detail, &config.detail_sheet))?;

    let national = workbook
        .worksheet_range(&config.national_sheet)
        .map_err(|error| Error::UnreadableFile(error.to_string()))?;
    let national = parse_national(&Table::from_range(&national, &config.national_sheet))?;

    tracing::info!(
        "loaded {} transaction records and {} national rows from {}",
        records.len(),
        national.len(),
        path.display()
    );

    Ok(Workbook { records, national })
}

/// Loads transaction records from a CSV export of the detail sheet.
///
/// The CSV must have a header row with the same column names as the sheet.
///
/// # Errors
/// Returns [Error::UnreadableFile] if the CSV is malformed, otherwise the same
/// errors as [load_workbook].
pub fn load_detail_csv<R: Read>(reader: R) -> Result<Vec<TransactionRecord>, Error> {
    let table = Table::from_csv(reader, CSV_SHEET_LABEL)?;
    let records = parse_detail(&table)?;

    tracing::info!("loaded {} transaction records from CSV", records.len());

    Ok(records)
}

fn ensure_sheet(sheet_names: &[String], sheet: &str) -> Result<(), Error> {
    if sheet_names.iter().any(|name| name == sheet) {
        Ok(())
    } else {
        tracing::debug!("sheet {sheet:?} not in {sheet_names:?}");
        Err(Error::MissingSheet(sheet.to_owned()))
    }
}

fn detail_column(measure: Measure, category: Category) -> String {
    let measure = match measure {
        Measure::Frequency => "Jumlah",
        Measure::Value => "Nilai",
    };

    format!("Fin {measure} {}", category.column_code())
}

fn national_column(measure: Measure, category: Category) -> String {
    let measure = match measure {
        Measure::Frequency => "Frek",
        Measure::Value => "Nom",
    };

    format!("{measure} Nasional {}", category.column_code())
}

/// Column indexes of one flow.
struct FlowColumns {
    count: usize,
    value: usize,
}

impl FlowColumns {
    fn resolve(
        table: &Table,
        category: Category,
        name: fn(Measure, Category) -> String,
    ) -> Result<Self, Error> {
        Ok(Self {
            count: table.column(&name(Measure::Frequency, category))?,
            value: table.column(&name(Measure::Value, category))?,
        })
    }

    fn read(&self, row: &RowView) -> Result<Flow, Error> {
        Ok(Flow::new(row.count(self.count)?, row.value(self.value)?))
    }
}

fn parse_detail(table: &Table) -> Result<Vec<TransactionRecord>, Error> {
    let code = table.column(PROVIDER_CODE_COLUMN)?;
    let name = table.column(PROVIDER_NAME_COLUMN)?;
    let year = table.column(YEAR_COLUMN)?;
    let quarter = table.column(QUARTER_COLUMN)?;
    let month = table.column(MONTH_COLUMN)?;
    let [incoming, outgoing, domestic] =
        Category::FLOWS.map(|category| FlowColumns::resolve(table, category, detail_column));
    let (incoming, outgoing, domestic) = (incoming?, outgoing?, domestic?);

    table
        .rows()
        .map(|row| {
            let period = row.month_period(year, month)?;

            let quarter_value = row.integer(quarter)?;
            let expected_quarter = period.get_quarter().unwrap_or_default();
            if quarter_value != i64::from(expected_quarter) {
                return Err(row.invalid(
                    quarter,
                    format!(
                        "quarter {quarter_value} does not contain month {}",
                        period.get_month().unwrap_or_default()
                    ),
                ));
            }

            Ok(TransactionRecord {
                provider_code: row.text(code)?,
                provider_name: row.text(name)?,
                period,
                incoming: incoming.read(&row)?,
                outgoing: outgoing.read(&row)?,
                domestic: domestic.read(&row)?,
            })
        })
        .collect()
}

fn parse_national(table: &Table) -> Result<Vec<NationalTotal>, Error> {
    let year = table.column(YEAR_COLUMN)?;
    let month = table.column(MONTH_COLUMN)?;
    let [incoming, outgoing, domestic, total] =
        Category::ALL.map(|category| FlowColumns::resolve(table, category, national_column));
    let (incoming, outgoing, domestic, total) = (incoming?, outgoing?, domestic?, total?);

    table
        .rows()
        .map(|row| {
            Ok(NationalTotal {
                period: row.month_period(year, month)?,
                incoming: incoming.read(&row)?,
                outgoing: outgoing.read(&row)?,
                domestic: domestic.read(&row)?,
                total: total.read(&row)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

/// A sheet as a header row plus data rows.
struct Table {
    sheet: String,
    /// One-based spreadsheet row number of the header.
    header_row: usize,
    header: Vec<String>,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(sheet: &str, header_row: usize, header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .map(|(index, name)| (normalize_header(name), index))
            .collect();

        Self {
            sheet: sheet.to_owned(),
            header_row,
            header,
            columns,
            rows,
        }
    }

    fn from_range(range: &Range<Data>, sheet: &str) -> Self {
        let header_row = range.start().map_or(1, |(row, _)| row as usize + 1);
        let mut rows = range.rows();

        let header = rows
            .next()
            .map(|cells| cells.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
            .unwrap_or_default();
        let rows = rows
            .map(|cells| cells.iter().map(Cell::from).collect::<Vec<_>>())
            .collect();

        Self::new(sheet, header_row, header, rows)
    }

    fn from_csv<R: Read>(reader: R, sheet: &str) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let header = reader
            .headers()
            .map_err(|error| Error::UnreadableFile(error.to_string()))?
            .iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();

        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|record| record.iter().map(Cell::from_text).collect::<Vec<_>>())
                    .map_err(|error| Error::UnreadableFile(error.to_string()))
            })
            .collect::<Result<Vec<Vec<Cell>>, Error>>()?;

        Ok(Self::new(sheet, 1, header, rows))
    }

    fn column(&self, name: &str) -> Result<usize, Error> {
        self.columns
            .get(&normalize_header(name))
            .copied()
            .ok_or_else(|| Error::MissingColumn {
                sheet: self.sheet.clone(),
                column: name.to_owned(),
            })
    }

    /// The non-blank data rows.
    fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|cell| *cell != Cell::Empty))
            .map(|(index, cells)| RowView {
                table: self,
                number: self.header_row + index + 1,
                cells,
            })
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(value) => Cell::Number(*value as f64),
            Data::Float(value) => Cell::Number(*value),
            Data::String(text) => Cell::from_text(text),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl Cell {
    fn from_text(text: &str) -> Self {
        let text = text.trim();

        if text.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(text.to_owned())
        }
    }
}

struct RowView<'a> {
    table: &'a Table,
    number: usize,
    cells: &'a [Cell],
}

impl RowView<'_> {
    fn cell(&self, column: usize) -> &Cell {
        self.cells.get(column).unwrap_or(&Cell::Empty)
    }

    fn invalid(&self, column: usize, message: String) -> Error {
        Error::InvalidCell {
            sheet: self.table.sheet.clone(),
            row: self.number,
            column: self.table.header[column].trim().to_owned(),
            message,
        }
    }

    fn text(&self, column: usize) -> Result<String, Error> {
        match self.cell(column) {
            Cell::Text(text) => Ok(text.clone()),
            // Numeric provider codes are stored as numbers by spreadsheet programs.
            Cell::Number(value) if value.fract() == 0.0 => Ok(format!("{value:.0}")),
            Cell::Number(value) => Ok(value.to_string()),
            Cell::Empty => Err(self.invalid(column, "the cell is empty".to_owned())),
        }
    }

    /// A finite number. Blank cells read as zero.
    fn number(&self, column: usize) -> Result<f64, Error> {
        let value = match self.cell(column) {
            Cell::Empty => return Ok(0.0),
            Cell::Number(value) => *value,
            Cell::Text(text) => text.parse::<f64>().map_err(|_| {
                self.invalid(column, format!("\"{text}\" is not a number"))
            })?,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(column, format!("{value} is not a finite number")))
        }
    }

    fn integer(&self, column: usize) -> Result<i64, Error> {
        if *self.cell(column) == Cell::Empty {
            return Err(self.invalid(column, "the cell is empty".to_owned()));
        }

        let value = self.number(column)?;

        if value.fract() != 0.0 {
            return Err(self.invalid(column, format!("{value} is not a whole number")));
        }

        Ok(value as i64)
    }

    fn count(&self, column: usize) -> Result<u64, Error> {
        let value = self.number(column)?;

        if value < 0.0 || value.fract() != 0.0 {
            return Err(self.invalid(
                column,
                format!("{value} is not a non-negative whole number"),
            ));
        }

        Ok(value as u64)
    }

    fn value(&self, column: usize) -> Result<f64, Error> {
        let value = self.number(column)?;

        if value < 0.0 {
            return Err(self.invalid(column, format!("{value} is negative")));
        }

        Ok(value)
    }

    fn month_period(&self, year_column: usize, month_column: usize) -> Result<PeriodKey, Error> {
        let year = self.integer(year_column)?;
        let year = i32::try_from(year)
            .map_err(|_| self.invalid(year_column, format!("{year} is not a valid year")))?;

        let month = self.integer(month_column)?;
        u8::try_from(month)
            .ok()
            .and_then(|month| PeriodKey::month(year, month).ok())
            .ok_or_else(|| {
                self.invalid(month_column, format!("{month} is not a month between 1 and 12"))
            })
    }
}

#[cfg(test)]
mod range_tests {
    use calamine::{Data, Range};

    use crate::{
        Error,
        loader::{Table, parse_detail, parse_national},
        period::PeriodKey,
        record::Flow,
    };

    const DETAIL_HEADER: [&str; 11] = [
        "Kode PJP",
        "Nama PJP",
        "Year",
        "Quarter",
        "Month",
        "Fin Jumlah Inc",
        "Fin Nilai Inc",
        "Fin Jumlah Out",
        "Fin Nilai Out",
        "Fin Jumlah Dom",
        "Fin Nilai Dom",
    ];

    fn create_test_range(header: &[&str], rows: &[Vec<Data>]) -> Range<Data> {
        let width = header.len() as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32, width - 1));

        for (column, name) in header.iter().enumerate() {
            range.set_value((0, column as u32), Data::String((*name).to_owned()));
        }

        for (row, cells) in rows.iter().enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                range.set_value((row as u32 + 1, column as u32), cell.clone());
            }
        }

        range
    }

    fn detail_row(code: Data, month: i64, quarter: i64) -> Vec<Data> {
        vec![
            code,
            Data::String("Bank Satu".to_owned()),
            Data::Float(2024.0),
            Data::Int(quarter),
            Data::Int(month),
            Data::Int(3),
            Data::Float(1500.5),
            Data::Int(1),
            Data::Float(200.0),
            Data::Empty,
            Data::Empty,
        ]
    }

    #[test]
    fn parses_detail_rows() {
        let range = create_test_range(
            &DETAIL_HEADER,
            &[detail_row(Data::String("PJP01".to_owned()), 5, 2)],
        );

        let records = parse_detail(&Table::from_range(&range, "Data")).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider_code, "PJP01");
        assert_eq!(records[0].period, PeriodKey::month(2024, 5).unwrap());
        assert_eq!(records[0].incoming, Flow::new(3, 1500.5));
        assert_eq!(records[0].outgoing, Flow::new(1, 200.0));
        assert_eq!(records[0].domestic, Flow::new(0, 0.0));
    }

    #[test]
    fn numeric_provider_code_is_read_as_text() {
        let range = create_test_range(&DETAIL_HEADER, &[detail_row(Data::Float(1001.0), 1, 1)]);

        let records = parse_detail(&Table::from_range(&range, "Data")).unwrap();

        assert_eq!(records[0].provider_code, "1001");
    }

    #[test]
    fn headers_match_ignoring_case_and_whitespace() {
        let header: Vec<String> = DETAIL_HEADER
            .iter()
            .map(|name| format!(" {} ", name.to_uppercase()))
            .collect();
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let range = create_test_range(&header, &[detail_row(Data::Int(7), 1, 1)]);

        let records = parse_detail(&Table::from_range(&range, "Data"));

        assert!(records.is_ok());
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let range = create_test_range(&DETAIL_HEADER[..10], &[]);

        let result = parse_detail(&Table::from_range(&range, "Data"));

        assert_eq!(
            result,
            Err(Error::MissingColumn {
                sheet: "Data".to_owned(),
                column: "Fin Nilai Dom".to_owned(),
            })
        );
    }

    #[test]
    fn non_numeric_value_is_rejected_with_row_number() {
        let mut row = detail_row(Data::Int(7), 1, 1);
        row[6] = Data::String("lots".to_owned());
        let range = create_test_range(&DETAIL_HEADER, &[row]);

        let result = parse_detail(&Table::from_range(&range, "Data"));

        assert!(matches!(
            result,
            Err(Error::InvalidCell { row: 2, ref column, .. }) if column == "Fin Nilai Inc"
        ));
    }

    #[test]
    fn negative_and_fractional_counts_are_rejected() {
        let mut negative = detail_row(Data::Int(7), 1, 1);
        negative[5] = Data::Int(-1);
        let mut fractional = detail_row(Data::Int(7), 1, 1);
        fractional[7] = Data::Float(1.5);

        for row in [negative, fractional] {
            let range = create_test_range(&DETAIL_HEADER, &[row]);
            let result = parse_detail(&Table::from_range(&range, "Data"));
            assert!(matches!(result, Err(Error::InvalidCell { .. })));
        }
    }

    #[test]
    fn quarter_must_contain_month() {
        let range = create_test_range(&DETAIL_HEADER, &[detail_row(Data::Int(7), 5, 1)]);

        let result = parse_detail(&Table::from_range(&range, "Data"));

        assert!(matches!(
            result,
            Err(Error::InvalidCell { ref column, .. }) if column == "Quarter"
        ));
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        let range = create_test_range(&DETAIL_HEADER, &[detail_row(Data::Int(7), 13, 4)]);

        let result = parse_detail(&Table::from_range(&range, "Data"));

        assert!(matches!(
            result,
            Err(Error::InvalidCell { ref column, .. }) if column == "Month"
        ));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let blank = vec![Data::Empty; DETAIL_HEADER.len()];
        let range = create_test_range(
            &DETAIL_HEADER,
            &[detail_row(Data::Int(7), 1, 1), blank, detail_row(Data::Int(8), 2, 1)],
        );

        let records = parse_detail(&Table::from_range(&range, "Data")).unwrap();

        assert_eq!(records.len(), 2);
    }

    #[test]
    fn parses_national_rows() {
        let header = [
            "Year",
            "Month",
            "Frek Nasional Inc",
            "Nom Nasional Inc",
            "Frek Nasional Out",
            "Nom Nasional Out",
            "Frek Nasional Dom",
            "Nom Nasional Dom",
            "Frek Nasional Total",
            "Nom Nasional Total",
        ];
        let row = vec![
            Data::Int(2024),
            Data::Int(12),
            Data::Int(10),
            Data::Float(100.0),
            Data::Int(20),
            Data::Float(200.0),
            Data::Int(30),
            Data::Float(300.0),
            Data::Int(60),
            Data::Float(600.0),
        ];
        let range = create_test_range(&header, &[row]);

        let national = parse_national(&Table::from_range(&range, "Nasional")).unwrap();

        assert_eq!(national.len(), 1);
        assert_eq!(national[0].period, PeriodKey::month(2024, 12).unwrap());
        assert_eq!(national[0].domestic, Flow::new(30, 300.0));
        assert_eq!(national[0].total, Flow::new(60, 600.0));
    }
}

use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, DecoderOrder};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unreadable spreadsheet: {primary}; {fallback}")]
    UnreadableTable { primary: String, fallback: String },

    #[error("Spreadsheet contains no data rows")]
    EmptyTable,
}

/// Raw cell value as produced by the spreadsheet readers
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Integer(*i),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => CellValue::Text(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) | Data::Empty => CellValue::Missing,
        }
    }
}

/// Decoded worksheet: column labels plus rows aligned to them
///
/// Every row has exactly one cell per column; short rows are padded with
/// `CellValue::Missing` and long rows truncated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    columns: Vec<CellValue>,
    rows: Vec<Vec<CellValue>>,
}

impl DecodedTable {
    pub fn new(columns: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Raw column labels, possibly non-text
    pub fn columns(&self) -> &[CellValue] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn into_parts(self) -> (Vec<CellValue>, Vec<Vec<CellValue>>) {
        (self.columns, self.rows)
    }
}

/// Decodes BCV statistics spreadsheets
///
/// The site serves `.xls` URLs whose payload is sometimes a real BIFF file and
/// sometimes an OOXML workbook, so both readers are tried in the configured order.
/// Only the first worksheet is read.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetDecoder {
    order: DecoderOrder,
    header_row: usize,
}

impl Default for SpreadsheetDecoder {
    fn default() -> Self {
        Self {
            order: DecoderOrder::LegacyFirst,
            header_row: 0,
        }
    }
}

impl SpreadsheetDecoder {
    pub fn new(order: DecoderOrder, header_row: usize) -> Self {
        Self { order, header_row }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.decoder_order, config.header_row)
    }

    /// Decode raw bytes (synchronous, callers in async code should use spawn_blocking)
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
        let range = self.read_first_sheet(bytes)?;
        let table = range_to_table(&range, self.header_row);

        if table.is_empty() {
            warn!("Decoded worksheet has no data rows");
            return Err(DecodeError::EmptyTable);
        }

        info!(
            "Decoded worksheet: {} rows x {} columns",
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    fn read_first_sheet(&self, bytes: &[u8]) -> Result<Range<Data>, DecodeError> {
        let (primary, fallback) = match self.order {
            DecoderOrder::LegacyFirst => (ReaderKind::Xls, ReaderKind::Xlsx),
            DecoderOrder::ModernFirst => (ReaderKind::Xlsx, ReaderKind::Xls),
        };

        let primary_err = match primary.read_first_sheet(bytes) {
            Ok(range) => return Ok(range),
            Err(e) => e,
        };
        debug!("{primary} reader failed ({primary_err}), falling back to {fallback} reader");

        match fallback.read_first_sheet(bytes) {
            Ok(range) => {
                info!("Spreadsheet decoded with fallback {fallback} reader");
                Ok(range)
            }
            Err(fallback_err) => Err(DecodeError::UnreadableTable {
                primary: format!("{primary} reader failed: {primary_err}"),
                fallback: format!("{fallback} reader failed: {fallback_err}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ReaderKind {
    Xls,
    Xlsx,
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderKind::Xls => f.write_str("xls"),
            ReaderKind::Xlsx => f.write_str("xlsx"),
        }
    }
}

impl ReaderKind {
    fn read_first_sheet(self, bytes: &[u8]) -> Result<Range<Data>, String> {
        match self {
            ReaderKind::Xls => first_sheet::<Xls<Cursor<Vec<u8>>>>(bytes),
            ReaderKind::Xlsx => first_sheet::<Xlsx<Cursor<Vec<u8>>>>(bytes),
        }
    }
}

fn first_sheet<R>(bytes: &[u8]) -> Result<Range<Data>, String>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: fmt::Display,
{
    let mut workbook = R::new(Cursor::new(bytes.to_vec())).map_err(|e| e.to_string())?;
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("workbook has no worksheets".to_string()),
    }
}

/// Split a worksheet range into a header row and data rows, dropping blank rows
fn range_to_table(range: &Range<Data>, header_row: usize) -> DecodedTable {
    let mut rows = range.rows().skip(header_row);

    let columns: Vec<CellValue> = match rows.next() {
        Some(header) => header.iter().map(CellValue::from).collect(),
        None => return DecodedTable::new(Vec::new(), Vec::new()),
    };

    let body: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(CellValue::from).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_missing()))
        .collect();

    DecodedTable::new(columns, body)
}

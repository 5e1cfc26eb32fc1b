// ! Spreadsheet download and decoding for the BCV quarterly statistics

pub mod downloader;
pub mod excel_importer;

// Re-export commonly used items
pub use downloader::{browser_client, BcvDownloader, FetchOutcome};
pub use excel_importer::{CellValue, DecodeError, DecodedTable, SpreadsheetDecoder};

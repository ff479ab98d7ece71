//! Row-oriented XLSX import/export.
//!
//! This crate covers exactly what the spreadsheet adapter needs:
//!
//! - [`read_first_sheet_rows`]: open a workbook, take its first worksheet, treat the first
//!   populated row as headers and return every following row as a header -> text map.
//! - [`write_rows_workbook`]: serialize a grid of JSON scalars (headers first) into a
//!   single-sheet workbook with fixed column widths.
//!
//! Styles, formulas, merged cells and the rest of SpreadsheetML are out of scope; formula
//! cells are read through their cached values.

mod cell_ref;
pub mod read;
mod shared_strings;
mod sheet_name;
pub mod value;
pub mod write;
mod zip_util;

pub use cell_ref::{column_name, parse_a1, CellCoord};
pub use read::{read_first_sheet_rows, ReadError, Row};
pub use sheet_name::{validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN};
pub use value::CellValue;
pub use write::{char_width_to_column_width, write_rows_workbook, WriteError, WriteOptions};

/// Sheet name used when the caller does not pick one.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// MIME type for the `.xlsx` download blob.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

use chrono::{Datelike, NaiveDate};

/// Download name for an exported workbook: `<prefix>_<year>-<month>-<day>.xlsx`.
///
/// Month and day are not zero padded (`2024-3-7`).
pub fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!(
        "{prefix}_{}-{}-{}.xlsx",
        date.year(),
        date.month(),
        date.day()
    )
}

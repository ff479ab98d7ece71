//! Single-sheet workbook writer for row grids.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use log::debug;
use serde_json::Value as JsonValue;
use thiserror::Error;
use zip::write::FileOptions;

use crate::cell_ref::{column_name, CellCoord};
use crate::sheet_name::{validate_sheet_name, SheetNameError};
use crate::value::js_number_to_string;
use crate::DEFAULT_SHEET;

/// Maximum digit width, in pixels, of the default 11pt Calibri body font.
const MAX_DIGIT_WIDTH_PX: f64 = 7.0;
/// Cell padding Excel adds around the digits, in pixels.
const COLUMN_PADDING_PX: f64 = 5.0;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SheetName(#[from] SheetNameError),
    #[error("unsupported value at row {row}, column {col}: only strings, numbers, booleans and null can be written")]
    UnsupportedValue { row: usize, col: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteOptions {
    pub sheet_name: String,
    /// Display widths in characters for the leading columns.
    pub column_widths: Vec<f64>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            column_widths: Vec::new(),
        }
    }
}

/// Converts a width in characters to the OOXML `<col width>` unit.
///
/// `width = round((chars * mdw + padding) / mdw * 256) / 256` with a 7 px digit width.
pub fn char_width_to_column_width(chars: f64) -> f64 {
    ((chars * MAX_DIGIT_WIDTH_PX + COLUMN_PADDING_PX) / MAX_DIGIT_WIDTH_PX * 256.0).round() / 256.0
}

/// Writes `rows` (headers first) as the only sheet of a new workbook.
///
/// Strings go through the shared string table, numbers and booleans are stored natively and
/// `null` leaves the cell empty. Rows may be ragged.
pub fn write_rows_workbook(rows: &[Vec<JsonValue>], options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
    validate_sheet_name(&options.sheet_name)?;

    let mut shared = SharedStringTable::default();
    let sheet = sheet_xml(rows, &options.column_widths, &mut shared)?;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options_zip =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

        let parts: [(&str, String); 7] = [
            ("[Content_Types].xml", content_types_xml()),
            ("_rels/.rels", root_rels_xml()),
            ("xl/workbook.xml", workbook_xml(&options.sheet_name)),
            ("xl/_rels/workbook.xml.rels", workbook_rels_xml()),
            ("xl/styles.xml", styles_xml()),
            ("xl/sharedStrings.xml", shared.to_xml()),
            ("xl/worksheets/sheet1.xml", sheet),
        ];
        for (name, xml) in parts {
            zip.start_file(name, options_zip)?;
            zip.write_all(xml.as_bytes())?;
        }
        zip.finish()?;
    }

    let bytes = buffer.into_inner();
    debug!(
        "event=xlsx_write rows={} shared_strings={} bytes={}",
        rows.len(),
        shared.values.len(),
        bytes.len()
    );
    Ok(bytes)
}

#[derive(Default)]
struct SharedStringTable {
    values: Vec<String>,
    index: HashMap<String, usize>,
    /// Number of cells referencing the table, repeats included.
    count: usize,
}

impl SharedStringTable {
    fn intern(&mut self, s: &str) -> usize {
        self.count += 1;
        if let Some(idx) = self.index.get(s) {
            return *idx;
        }
        let idx = self.values.len();
        self.values.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    fn to_xml(&self) -> String {
        let mut si = String::new();
        for value in &self.values {
            if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
                si.push_str(&format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(value)));
            } else {
                si.push_str(&format!("<si><t>{}</t></si>", escape_xml(value)));
            }
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">{si}</sst>"#,
            self.count,
            self.values.len()
        )
    }
}

fn sheet_xml(
    rows: &[Vec<JsonValue>],
    column_widths: &[f64],
    shared: &mut SharedStringTable,
) -> Result<String, WriteError> {
    let mut sheet_data = String::new();
    let mut last_row = 0u32;
    let mut last_col = 0u32;
    for (row_idx, row) in rows.iter().enumerate() {
        let row_number = row_idx as u32 + 1;
        let mut cells = String::new();
        for (col_idx, value) in row.iter().enumerate() {
            let coord = CellCoord::new(row_number, col_idx as u32 + 1);
            let Some(cell) = cell_xml(coord, value, shared)
                .ok_or(WriteError::UnsupportedValue { row: row_idx, col: col_idx })?
            else {
                continue;
            };
            cells.push_str(&cell);
            last_row = last_row.max(coord.row);
            last_col = last_col.max(coord.col);
        }
        if !cells.is_empty() {
            sheet_data.push_str(&format!(r#"<row r="{row_number}">{cells}</row>"#));
        }
    }

    let dimension = if last_row == 0 {
        "A1".to_string()
    } else {
        format!("A1:{}{last_row}", column_name(last_col))
    };

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str(&format!(r#"<dimension ref="{dimension}"/>"#));
    if !column_widths.is_empty() {
        xml.push_str("<cols>");
        for (idx, chars) in column_widths.iter().enumerate() {
            let col = idx + 1;
            xml.push_str(&format!(
                r#"<col min="{col}" max="{col}" width="{}" customWidth="1"/>"#,
                char_width_to_column_width(*chars)
            ));
        }
        xml.push_str("</cols>");
    }
    xml.push_str("<sheetData>");
    xml.push_str(&sheet_data);
    xml.push_str("</sheetData></worksheet>");
    Ok(xml)
}

/// `None` for values that have no cell form; `Some(None)` for empty cells.
fn cell_xml(coord: CellCoord, value: &JsonValue, shared: &mut SharedStringTable) -> Option<Option<String>> {
    let a1 = coord.to_a1();
    let xml = match value {
        JsonValue::Null => return Some(None),
        JsonValue::String(s) => {
            let idx = shared.intern(s);
            format!(r#"<c r="{a1}" t="s"><v>{idx}</v></c>"#)
        }
        JsonValue::Bool(b) => format!(r#"<c r="{a1}" t="b"><v>{}</v></c>"#, u8::from(*b)),
        JsonValue::Number(n) => {
            let n = n.as_f64()?;
            format!(r#"<c r="{a1}"><v>{}</v></c>"#, js_number_to_string(n))
        }
        JsonValue::Array(_) | JsonValue::Object(_) => return None,
    };
    Some(Some(xml))
}

fn content_types_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#
        .to_owned()
}

fn root_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_owned()
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="{}" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#,
        escape_xml(sheet_name)
    )
}

fn workbook_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#
        .to_owned()
}

fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
        .to_owned()
}

/// Escapes markup and drops characters XML 1.0 cannot carry.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn column_widths_use_seven_pixel_digits() {
        assert_eq!(char_width_to_column_width(30.0), 30.71484375);
        assert_eq!(char_width_to_column_width(16.0), 16.71484375);
        assert_eq!(char_width_to_column_width(10.0), 10.71484375);
    }

    #[test]
    fn shared_strings_are_deduplicated() {
        let mut shared = SharedStringTable::default();
        assert_eq!(shared.intern("a"), 0);
        assert_eq!(shared.intern("b"), 1);
        assert_eq!(shared.intern("a"), 0);
        let xml = shared.to_xml();
        assert!(xml.contains(r#"count="3" uniqueCount="2""#), "{xml}");
    }

    #[test]
    fn sheet_xml_skips_nulls_and_tracks_dimension() {
        let rows = vec![
            vec![json!("Name"), json!("Qty"), json!("Ok")],
            vec![json!(" tea "), JsonValue::Null, json!(true)],
            vec![JsonValue::Null, json!(1.5)],
        ];
        let mut shared = SharedStringTable::default();
        let xml = sheet_xml(&rows, &[30.0], &mut shared).unwrap();
        assert!(xml.contains(r#"<dimension ref="A1:C3"/>"#), "{xml}");
        assert!(xml.contains(r#"<col min="1" max="1" width="30.71484375" customWidth="1"/>"#));
        assert!(xml.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"<row r="3"><c r="B3"><v>1.5</v></c></row>"#));
        assert!(!xml.contains(r#"r="B2""#));
        assert!(shared.to_xml().contains(r#"<t xml:space="preserve"> tea </t>"#));
    }

    #[test]
    fn nested_values_are_rejected_with_position() {
        let rows = vec![vec![json!("h")], vec![json!("x"), json!({"a": 1})]];
        let err = write_rows_workbook(&rows, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, WriteError::UnsupportedValue { row: 1, col: 1 }));
    }

    #[test]
    fn escapes_markup_and_strips_control_characters() {
        assert_eq!(escape_xml("a<b>&\"c'\u{1}\n"), "a&lt;b&gt;&amp;&quot;c&apos;\n");
    }
}

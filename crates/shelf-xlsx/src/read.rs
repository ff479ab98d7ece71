//! First-sheet row import.
//!
//! Mirrors the object-row shape spreadsheet tooling in the browser hands back: the first row
//! of the used range names the columns, every later row becomes a `header -> text` mapping,
//! and columns a row does not populate read as `""`.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek};
use std::ops::Bound;

use log::debug;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::cell_ref::{parse_a1, MAX_COL, MAX_ROW};
use crate::shared_strings::{parse_shared_strings, read_text};
use crate::value::CellValue;
use crate::zip_util::{read_part, resolve_target};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const FALLBACK_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const REL_TYPE_SHARED_STRINGS_SUFFIX: &str = "/sharedStrings";

/// Header given to columns whose header cell is missing.
const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("invalid xlsx archive: {0}")]
    Zip(#[from] ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("missing required part: {0}")]
    MissingPart(String),
    #[error("zip part `{part}` is too large ({size} bytes)")]
    PartTooLarge { part: String, size: u64 },
    #[error("invalid cell reference `{0}`")]
    InvalidCellRef(String),
    #[error("malformed workbook: {0}")]
    Malformed(&'static str),
}

/// One imported data row: header name to cell text, in column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, String)>,
}

impl Row {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Populated cells keyed by one-based row, then column.
type CellGrid = BTreeMap<u32, BTreeMap<u32, CellValue>>;

/// Reads the first worksheet of an `.xlsx` file into header-keyed rows.
pub fn read_first_sheet_rows(bytes: &[u8]) -> Result<Vec<Row>, ReadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let rels = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
        Some(xml) => parse_relationships(std::str::from_utf8(&xml)?)?,
        None => Vec::new(),
    };

    let sheet_part = first_sheet_part(&mut archive, &rels)?;
    let sheet_xml = read_part(&mut archive, &sheet_part)?
        .ok_or_else(|| ReadError::MissingPart(sheet_part.clone()))?;

    let shared_strings = match shared_strings_part(&rels) {
        Some(part) => read_part(&mut archive, &part)?,
        None => read_part(&mut archive, FALLBACK_SHARED_STRINGS_PART)?,
    };
    let shared_strings = match shared_strings {
        Some(xml) => parse_shared_strings(std::str::from_utf8(&xml)?)?,
        None => Vec::new(),
    };

    let cells = parse_sheet_cells(std::str::from_utf8(&sheet_xml)?, &shared_strings)?;
    let rows = rows_from_cells(&cells);
    debug!(
        "event=xlsx_read part={sheet_part} shared_strings={} rows={}",
        shared_strings.len(),
        rows.len()
    );
    Ok(rows)
}

struct Relationship {
    id: String,
    type_: String,
    target: String,
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, ReadError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut type_ = String::new();
                let mut target = String::new();
                for attr in e.attributes().with_checks(false) {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr_string(&attr)?),
                        b"Type" => type_ = attr_string(&attr)?,
                        b"Target" => target = attr_string(&attr)?,
                        _ => {}
                    }
                }
                if let Some(id) = id {
                    rels.push(Relationship { id, type_, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn shared_strings_part(rels: &[Relationship]) -> Option<String> {
    rels.iter()
        .find(|rel| rel.type_.ends_with(REL_TYPE_SHARED_STRINGS_SUFFIX))
        .map(|rel| resolve_target(WORKBOOK_PART, &rel.target))
}

/// Worksheet part of the first `<sheet>` in workbook order.
fn first_sheet_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    rels: &[Relationship],
) -> Result<String, ReadError> {
    let Some(workbook) = read_part(archive, WORKBOOK_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };

    let rel_id = first_sheet_rel_id(std::str::from_utf8(&workbook)?)?;
    let part = rel_id
        .and_then(|rel_id| rels.iter().find(|rel| rel.id == rel_id))
        .map(|rel| resolve_target(WORKBOOK_PART, &rel.target));
    Ok(part.unwrap_or_else(|| FALLBACK_SHEET_PART.to_string()))
}

fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, ReadError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes().with_checks(false) {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    // `r:id`, whatever prefix the producer bound the relationships namespace to.
                    if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        return Ok(Some(attr_string(&attr)?));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn attr_string(attr: &Attribute<'_>) -> Result<String, ReadError> {
    Ok(attr.unescape_value()?.into_owned())
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReadError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr_string(&attr)?));
        }
    }
    Ok(None)
}

/// Raw contents of one `<c>` element.
#[derive(Default)]
struct RawCell {
    cell_type: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

impl RawCell {
    fn resolve(self, shared_strings: &[String]) -> Option<CellValue> {
        match self.cell_type.as_deref() {
            Some("s") => {
                let index: usize = self.value?.trim().parse().ok()?;
                shared_strings.get(index).cloned().map(CellValue::Text)
            }
            Some("inlineStr") => self.inline.or(self.value).map(CellValue::Text),
            Some("str") | Some("d") => self.value.map(CellValue::Text),
            Some("b") => self
                .value
                .map(|v| CellValue::Bool(matches!(v.trim(), "1" | "true"))),
            Some("e") => self.value.map(CellValue::Error),
            _ => {
                let value = self.value?;
                value.trim().parse::<f64>().ok().map(CellValue::Number)
            }
        }
    }
}

fn parse_sheet_cells(xml: &str, shared_strings: &[String]) -> Result<CellGrid, ReadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut grid = CellGrid::new();
    let mut buf = Vec::new();
    let mut current_row: u32 = 0;
    let mut current_col: u32 = 0;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                current_row = match attr_value(&e, b"r")? {
                    Some(r) => parse_row_number(&r)?,
                    None => next_index(current_row, MAX_ROW, "row")?,
                };
                current_col = 0;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (row, col) = cell_position(&e, current_row, current_col)?;
                current_row = row;
                current_col = col;
                let mut raw = read_cell_body(&mut reader)?;
                raw.cell_type = attr_value(&e, b"t")?;
                if let Some(value) = raw.resolve(shared_strings) {
                    grid.entry(row).or_default().insert(col, value);
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (row, col) = cell_position(&e, current_row, current_col)?;
                current_row = row;
                current_col = col;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

/// Position from the `r` attribute, or the next column when the producer omitted it.
fn cell_position(e: &BytesStart<'_>, row: u32, col: u32) -> Result<(u32, u32), ReadError> {
    match attr_value(e, b"r")? {
        Some(r) => {
            let coord = parse_a1(&r).ok_or(ReadError::InvalidCellRef(r))?;
            Ok((coord.row, coord.col))
        }
        None => Ok((row.max(1), next_index(col, MAX_COL, "column")?)),
    }
}

/// A `<row r="...">` number, held to the sheet's row bounds.
fn parse_row_number(r: &str) -> Result<u32, ReadError> {
    r.trim()
        .parse::<u32>()
        .ok()
        .filter(|row| (1..=MAX_ROW).contains(row))
        .ok_or_else(|| ReadError::InvalidCellRef(r.to_string()))
}

/// The position after `index` for rows or cells that omit `r`.
fn next_index(index: u32, max: u32, what: &'static str) -> Result<u32, ReadError> {
    match index.checked_add(1) {
        Some(next) if next <= max => Ok(next),
        _ => Err(ReadError::InvalidCellRef(format!("{what} {index} + 1"))),
    }
}

fn read_cell_body(reader: &mut Reader<&[u8]>) -> Result<RawCell, ReadError> {
    let mut raw = RawCell::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"v" => {
                raw.value = Some(read_text(reader, e.name())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"is" => {
                raw.inline = Some(read_inline_string(reader)?);
            }
            // Formulas are read through their cached `<v>`.
            Event::Start(e) => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"c" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <c>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(raw)
}

fn read_inline_string(reader: &mut Reader<&[u8]>) -> Result<String, ReadError> {
    let mut text = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, e.name())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"rPh" => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"is" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <is>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Text used to name a column from its header cell.
fn header_text(value: &CellValue) -> String {
    match value {
        CellValue::Error(literal) => literal.clone(),
        other => other.to_text().unwrap_or_default(),
    }
}

/// Names the columns of the used range, disambiguating repeats with `_1`, `_2`, ...
fn build_headers<'a>(cells: impl Iterator<Item = Option<&'a CellValue>>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::new();
    for cell in cells {
        let base = cell.map(header_text).unwrap_or_else(|| EMPTY_HEADER.to_string());
        let name = match seen.get(&base).copied() {
            None => {
                seen.insert(base.clone(), 1);
                base
            }
            Some(mut counter) => {
                let mut candidate = format!("{base}_{counter}");
                counter += 1;
                while seen.contains_key(&candidate) {
                    candidate = format!("{base}_{counter}");
                    counter += 1;
                }
                seen.insert(base, counter);
                seen.insert(candidate.clone(), 1);
                candidate
            }
        };
        headers.push(name);
    }
    headers
}

/// Turns the populated cells into header-keyed rows.
///
/// The used range spans every populated cell. Its first row supplies the headers; later rows
/// without a single text-bearing cell are skipped.
fn rows_from_cells(grid: &CellGrid) -> Vec<Row> {
    let (Some((&first_row, _)), Some(min_col), Some(max_col)) = (
        grid.first_key_value(),
        grid.values().filter_map(|cols| cols.keys().next()).min().copied(),
        grid.values().filter_map(|cols| cols.keys().next_back()).max().copied(),
    ) else {
        return Vec::new();
    };

    let header_cells = grid.get(&first_row);
    let headers = build_headers(
        (min_col..=max_col).map(|col| header_cells.and_then(|cells| cells.get(&col))),
    );

    let mut rows = Vec::new();
    for (_, cells) in grid.range((Bound::Excluded(first_row), Bound::Unbounded)) {
        let mut has_value = false;
        let entries = (min_col..=max_col)
            .zip(&headers)
            .map(|(col, header)| {
                let text = cells.get(&col).and_then(CellValue::to_text);
                has_value |= text.is_some();
                (header.clone(), text.unwrap_or_default())
            })
            .collect();
        if has_value {
            rows.push(Row { entries });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(cells: &[(u32, u32, CellValue)]) -> CellGrid {
        let mut grid = CellGrid::new();
        for (row, col, value) in cells {
            grid.entry(*row).or_default().insert(*col, value.clone());
        }
        grid
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn header_names_follow_empty_and_duplicate_rules() {
        let a = text("a");
        let blank = text("");
        let a_1 = text("a_1");
        let headers = build_headers(
            [Some(&a), None, Some(&a), None, Some(&a_1), Some(&a), Some(&blank)].into_iter(),
        );
        assert_eq!(
            headers,
            vec!["a", "__EMPTY", "a_1", "__EMPTY_1", "a_1_1", "a_2", ""]
        );
    }

    #[test]
    fn missing_cells_default_to_empty_string() {
        let rows = rows_from_cells(&grid(&[
            (1, 1, text("Name")),
            (1, 2, text("Price")),
            (2, 1, text("Tea")),
            (3, 2, CellValue::Number(2.5)),
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Name"), Some("Tea"));
        assert_eq!(rows[0].get("Price"), Some(""));
        assert_eq!(rows[1].get("Name"), Some(""));
        assert_eq!(rows[1].get("Price"), Some("2.5"));
    }

    #[test]
    fn used_range_starts_at_first_populated_cell() {
        let rows = rows_from_cells(&grid(&[
            (3, 2, text("Name")),
            (3, 3, CellValue::Bool(true)),
            (5, 2, text("x")),
            (5, 3, CellValue::Bool(false)),
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].headers().collect::<Vec<_>>(), vec!["Name", "true"]);
        assert_eq!(rows[0].get("true"), Some("false"));
    }

    #[test]
    fn error_only_rows_are_skipped_and_errors_read_as_empty() {
        let rows = rows_from_cells(&grid(&[
            (1, 1, text("h")),
            (1, 2, text("g")),
            (2, 1, CellValue::Error("#DIV/0!".to_string())),
            (3, 1, CellValue::Error("#N/A".to_string())),
            (3, 2, text("")),
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("h"), Some(""));
        assert_eq!(rows[0].get("g"), Some(""));
    }

    #[test]
    fn empty_grid_has_no_rows() {
        assert!(rows_from_cells(&CellGrid::new()).is_empty());
    }

    #[test]
    fn parses_cell_types_and_positions() {
        let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
  <row r="1"><c r="A1" t="s"><v>0</v></c><c t="inlineStr"><is><t>Inline</t></is></c></row>
  <row><c r="A2" t="b"><v>1</v></c><c r="B2"><f>1+1</f><v>2</v></c><c r="C2" t="str"><f>"x"</f><v>x</v></c></row>
  <row r="4"><c r="A4" t="e"><v>#REF!</v></c><c r="B4"/><c r="C4" t="s"><v>9</v></c></row>
</sheetData>
</worksheet>"#;
        let shared = vec!["Name".to_string()];
        let cells = parse_sheet_cells(xml, &shared).unwrap();

        assert_eq!(cells[&1][&1], text("Name"));
        assert_eq!(cells[&1][&2], text("Inline"));
        assert_eq!(cells[&2][&1], CellValue::Bool(true));
        assert_eq!(cells[&2][&2], CellValue::Number(2.0));
        assert_eq!(cells[&2][&3], text("x"));
        assert_eq!(cells[&4][&1], CellValue::Error("#REF!".to_string()));
        // Stub cells and dangling shared-string indices hold no value.
        assert_eq!(cells[&4].len(), 1);
    }

    #[test]
    fn rejects_garbage_cell_references() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="1A"><v>1</v></c></row></sheetData></worksheet>"#;
        assert!(matches!(
            parse_sheet_cells(xml, &[]),
            Err(ReadError::InvalidCellRef(r)) if r == "1A"
        ));
    }

    #[test]
    fn row_numbers_outside_the_sheet_are_rejected() {
        for r in ["0", "1048577", "4294967295", "-1", "x"] {
            let xml = format!(r#"<sheetData><row r="{r}"><c t="str"><v>h</v></c></row></sheetData>"#);
            assert!(
                matches!(parse_sheet_cells(&xml, &[]), Err(ReadError::InvalidCellRef(_))),
                "{r}"
            );
        }
    }

    #[test]
    fn last_sheet_row_reads_without_overflow() {
        let xml = r#"<sheetData><row r="1048576"><c t="str"><v>h</v></c></row><row><c t="str"><v>x</v></c></row></sheetData>"#;
        assert!(matches!(
            parse_sheet_cells(xml, &[]),
            Err(ReadError::InvalidCellRef(_))
        ));

        let xml = r#"<sheetData><row r="1048576"><c t="str"><v>h</v></c></row></sheetData>"#;
        let cells = parse_sheet_cells(xml, &[]).unwrap();
        assert!(rows_from_cells(&cells).is_empty());
    }

    #[test]
    fn first_sheet_rel_id_accepts_any_prefix() {
        let xml = r#"<workbook xmlns:x="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="B" sheetId="2" x:id="rId7"/><sheet name="A" sheetId="1" x:id="rId1"/></sheets>
</workbook>"#;
        assert_eq!(first_sheet_rel_id(xml).unwrap().as_deref(), Some("rId7"));
    }

    #[test]
    fn rows_serialize_in_column_order() {
        let row = Row {
            entries: vec![
                ("z".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
            ],
        };
        assert_eq!(serde_json::to_string(&[row]).unwrap(), r#"[{"z":"1","a":"2"}]"#);
    }
}

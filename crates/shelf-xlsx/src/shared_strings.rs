//! `xl/sharedStrings.xml`: the workbook-wide string table referenced by `t="s"` cells.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::read::ReadError;

/// Parses the shared string table into the display text of each `<si>` item.
///
/// Rich-text runs are flattened; phonetic (`<rPh>`) runs are not part of the displayed
/// string and are dropped.
pub(crate) fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ReadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(parse_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => items.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(items)
}

fn parse_si(reader: &mut Reader<&[u8]>) -> Result<String, ReadError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, e.name())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"r" => parse_run(reader, &mut text)?,
            Event::Start(e) => skip(reader, &e)?,
            Event::End(e) if e.local_name().as_ref() == b"si" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <si>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

fn parse_run(reader: &mut Reader<&[u8]>, out: &mut String) -> Result<(), ReadError> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                out.push_str(&read_text(reader, e.name())?);
            }
            // Run properties and anything unexpected.
            Event::Start(e) => skip(reader, &e)?,
            Event::End(e) if e.local_name().as_ref() == b"r" => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in <r>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn skip(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<(), ReadError> {
    reader.read_to_end_into(start.name(), &mut Vec::new())?;
    Ok(())
}

/// Collects the text content of an element up to its matching end tag.
pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String, ReadError> {
    let end = end.as_ref().to_vec();
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::End(e) if e.name().as_ref() == end.as_slice() => break,
            Event::Eof => return Err(ReadError::Malformed("unexpected eof in text element")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flattens_runs_and_ignores_phonetic_text() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>Name</t></si>
  <si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> tail</t></r></si>
  <si><t>Base</t><phoneticPr fontId="0"/><rPh sb="0" eb="4"><t>PHO</t></rPh></si>
  <si/>
</sst>"#;

        let items = parse_shared_strings(xml).unwrap();
        assert_eq!(items, vec!["Name", "Bold tail", "Base", ""]);
    }

    #[test]
    fn unescapes_entities() {
        let xml = r#"<sst><si><t>a &amp; b &lt;c&gt;</t></si></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["a & b <c>"]);
    }

    #[test]
    fn truncated_item_is_an_error() {
        let xml = r#"<sst><si><t>open"#;
        assert!(parse_shared_strings(xml).is_err());
    }
}

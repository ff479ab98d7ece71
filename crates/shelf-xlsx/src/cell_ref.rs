/// One-based cell position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn to_a1(self) -> String {
        format!("{}{}", column_name(self.col), self.row)
    }
}

/// Excel's last column (`XFD`).
pub(crate) const MAX_COL: u32 = 16_384;
/// Excel's last row.
pub(crate) const MAX_ROW: u32 = 1_048_576;

/// Parses an A1 reference such as `AA12`; `$` anchors are ignored.
pub fn parse_a1(address: &str) -> Option<CellCoord> {
    let mut chars = address.trim().chars().filter(|c| *c != '$').peekable();
    let mut col: u32 = 0;
    let mut saw_letter = false;
    while let Some(ch) = chars.peek().copied() {
        if ch.is_ascii_alphabetic() {
            saw_letter = true;
            let upper = ch.to_ascii_uppercase();
            col = col.checked_mul(26)?.checked_add(upper as u32 - 'A' as u32 + 1)?;
            chars.next();
        } else {
            break;
        }
    }
    if !saw_letter || col > MAX_COL {
        return None;
    }

    let mut row: u32 = 0;
    let mut saw_digit = false;
    for ch in chars {
        let digit = ch.to_digit(10)?;
        saw_digit = true;
        row = row.checked_mul(10)?.checked_add(digit)?;
    }
    if !saw_digit || row == 0 || row > MAX_ROW {
        return None;
    }
    Some(CellCoord::new(row, col))
}

/// Column letters for a one-based column index (`1 -> A`, `27 -> AA`).
pub fn column_name(col: u32) -> String {
    let mut col = col;
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.reverse();
    letters.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_a1() {
        assert_eq!(parse_a1("A1"), Some(CellCoord::new(1, 1)));
        assert_eq!(parse_a1("AA12"), Some(CellCoord::new(12, 27)));
        assert_eq!(parse_a1("$b$3"), Some(CellCoord::new(3, 2)));
        assert_eq!(CellCoord::new(12, 27).to_a1(), "AA12");
        assert_eq!(column_name(16_384), "XFD");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in ["", "A", "12", "A0", "1A", "A1B", "XFE1", "A1048577"] {
            assert_eq!(parse_a1(bad), None, "{bad}");
        }
    }
}

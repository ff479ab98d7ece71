use thiserror::Error;

/// Excel limits sheet names to 31 UTF-16 code units.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SheetNameError {
    #[error("sheet name cannot be empty")]
    Empty,
    #[error("sheet name cannot exceed {EXCEL_MAX_SHEET_NAME_LEN} characters")]
    TooLong,
    #[error("sheet name contains invalid character `{0}`")]
    InvalidChar(char),
    #[error("sheet name cannot start or end with an apostrophe")]
    LeadingOrTrailingApostrophe,
}

/// Checks `name` against Excel's sheet naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.trim().is_empty() {
        return Err(SheetNameError::Empty);
    }
    if name.encode_utf16().count() > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong);
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(SheetNameError::InvalidChar(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_and_unicode_names() {
        assert_eq!(validate_sheet_name("Sheet1"), Ok(()));
        assert_eq!(validate_sheet_name("المنتجات"), Ok(()));
        assert_eq!(validate_sheet_name("It's fine"), Ok(()));
        assert_eq!(validate_sheet_name(&"x".repeat(31)), Ok(()));
    }

    #[test]
    fn rejects_names_excel_refuses() {
        assert_eq!(validate_sheet_name(" "), Err(SheetNameError::Empty));
        assert_eq!(validate_sheet_name(&"x".repeat(32)), Err(SheetNameError::TooLong));
        assert_eq!(validate_sheet_name("a/b"), Err(SheetNameError::InvalidChar('/')));
        assert_eq!(validate_sheet_name("[x]"), Err(SheetNameError::InvalidChar('[')));
        assert_eq!(
            validate_sheet_name("'quoted"),
            Err(SheetNameError::LeadingOrTrailingApostrophe)
        );
    }
}

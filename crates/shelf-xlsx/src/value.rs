//! Cell values and their text coercion.

/// A worksheet cell value as read from SpreadsheetML.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Error literal such as `#DIV/0!`.
    Error(String),
}

impl CellValue {
    /// Text form used for imported rows.
    ///
    /// Error cells have no text form; callers treat them as missing.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(js_number_to_string(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Error(_) => None,
        }
    }
}

/// Formats a number the way JavaScript's `Number.prototype.toString()` does.
///
/// Uses the shortest round-tripping digits, switching to exponent notation for magnitudes
/// at or above `1e21` or below `1e-6`.
pub fn js_number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. `1.25e1`.
    let scientific = format!("{:e}", n.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return n.to_string();
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exponent + 1;

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let (first, rest) = digits.split_at(1);
        let e = point - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        if rest.is_empty() {
            format!("{first}e{sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", e.abs())
        }
    };

    if n < 0.0 {
        format!("-{body}")
    } else {
        body
    }
}

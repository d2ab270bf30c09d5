use thiserror::Error;

/// Errors from numeric specification cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericCellError {
    /// The cell is empty.
    #[error("empty numeric cell")]
    Empty,
    /// The cell is not a hexadecimal number.
    #[error("'{0}' is not a hexadecimal value")]
    InvalidHex(String),
    /// The cell is not an integer.
    #[error("'{0}' is not an integer")]
    InvalidInteger(String),
}

/// Parses a hexadecimal cell, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`NumericCellError`] when the cell is empty or not hex.
pub fn parse_hex(cell: &str) -> Result<u64, NumericCellError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Err(NumericCellError::Empty);
    }
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| NumericCellError::InvalidHex(cell.to_string()))
}

/// Rewrites a hexadecimal cell as lower-case `0x…` text.
///
/// # Errors
///
/// Returns [`NumericCellError`] when the cell is empty or not hex.
pub fn normalize_hex(cell: &str) -> Result<String, NumericCellError> {
    parse_hex(cell).map(|value| format!("{value:#x}"))
}

/// Parses an integer cell.
///
/// Spreadsheet exports write integer columns containing blanks as floats,
/// so `25.0` is accepted as `25`. A `0x` prefix selects hexadecimal.
///
/// # Errors
///
/// Returns [`NumericCellError`] when the cell is empty, fractional, or not
/// numeric.
pub fn parse_int_cell(cell: &str) -> Result<i64, NumericCellError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Err(NumericCellError::Empty);
    }
    let invalid = || NumericCellError::InvalidInteger(cell.to_string());

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).map_err(|_| invalid());
    }

    let integral = match trimmed.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') => {
            whole
        }
        Some(_) => return Err(invalid()),
        None => trimmed,
    };
    integral.parse::<i64>().map_err(|_| invalid())
}

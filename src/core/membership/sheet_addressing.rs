// Fixed A1-notation conventions for the membership sheet.
// Row 1 is the header, data lives in rows 2 through 10000.

use super::membership_ports::MembershipError;

pub const FIRST_DATA_ROW: u32 = 2;
pub const LAST_DATA_ROW: u32 = 10_000;

/// Only single-letter columns (`a` to `z`) are addressable.
pub const MAX_COLUMN_INDEX: usize = 25;

/// Maps a 0-based column index to its lower-case letter.
pub fn column_letter(column_index: usize) -> Result<char, MembershipError> {
    if column_index > MAX_COLUMN_INDEX {
        return Err(MembershipError::InvalidRequest(format!(
            "column index {} is beyond column z",
            column_index
        )));
    }
    Ok((b'a' + column_index as u8) as char)
}

/// The data range of one column, e.g. `a2:a10000`.
pub fn column_range(column_index: usize) -> Result<String, MembershipError> {
    let letter = column_letter(column_index)?;
    Ok(format!("{letter}{FIRST_DATA_ROW}:{letter}{LAST_DATA_ROW}"))
}

/// The full-width range of one 0-based row, e.g. `A1:AAA1` for the header.
pub fn row_range(row_index: u32) -> String {
    let row = row_index + 1;
    format!("A{row}:AAA{row}")
}

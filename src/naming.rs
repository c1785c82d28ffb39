//! Folder-name parsing for the `YYYYMMDD_name` visit convention.
//!
//! Every source folder is named after the visit it records: an 8-digit
//! calendar date, an underscore, then the restaurant name.
//!
//! - `20260214_스시로쿠` → visit_date="20260214", restaurant_name="스시로쿠"
//! - `20260301_Le Bistro_2nd floor` → restaurant_name="Le Bistro_2nd floor"
//!
//! Only the first underscore separates the two parts, so restaurant names
//! may contain underscores of their own. Dates are checked against the
//! calendar, not just the digit count: `20260230_x` is rejected.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Invalid source folder format: {0}")]
    InvalidFormat(String),
}

/// Result of parsing a folder name like `20260214_스시로쿠`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFolderName {
    /// Visit date as the original 8-digit `YYYYMMDD` string.
    pub visit_date: String,
    /// Restaurant name, trimmed. Never empty.
    pub restaurant_name: String,
}

impl ParsedFolderName {
    /// The visit date as a calendar date.
    ///
    /// Always succeeds for values produced by [`parse_folder_name`].
    pub fn visit_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.visit_date, "%Y%m%d").ok()
    }
}

/// Parse a visit folder name following the `YYYYMMDD_name` convention.
///
/// Fails with [`NamingError::InvalidFormat`] when:
/// - the name does not start with exactly 8 ASCII digits followed by `_`
/// - the restaurant part is empty after trimming
/// - the digits do not form a real calendar date (month 13, Feb 30, ...)
pub fn parse_folder_name(name: &str) -> Result<ParsedFolderName, NamingError> {
    let invalid = || NamingError::InvalidFormat(name.to_string());

    let (date_part, rest) = name.split_once('_').ok_or_else(invalid)?;
    if date_part.len() != 8 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let restaurant_name = rest.trim();
    if restaurant_name.is_empty() {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| invalid())?;

    Ok(ParsedFolderName {
        visit_date: date_part.to_string(),
        restaurant_name: restaurant_name.to_string(),
    })
}

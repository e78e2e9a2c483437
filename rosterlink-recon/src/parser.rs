//! CSV parsing for bulk import files
//!
//! Turns raw text plus three header names into an ordered sequence of typed
//! rows. Pure and deterministic: no I/O, same input always yields the same
//! output. Dialect support is deliberately minimal: fields are split on `,`
//! with no embedded-comma handling; one pair of wrapping double quotes is
//! stripped per field.

use thiserror::Error;

/// The three header names identifying the required columns
///
/// Matching against the file's header row is case-insensitive exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvHeaders {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Default for CsvHeaders {
    /// Header names applied when the caller supplies none
    fn default() -> Self {
        Self {
            first_name: "first_name".to_string(),
            last_name: "last_name".to_string(),
            email: "email".to_string(),
        }
    }
}

/// One valid data row: all three required fields non-empty after cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based source line number (header = 1, first data row = 2)
    pub line_number: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Required header(s) absent from the file's header row
///
/// Fatal to a submit call: the file is rejected wholesale, no rows returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "CSV header(s) not found: '{}'. Available headers: {}",
    missing.join("', '"),
    available.join(", ")
)]
pub struct HeaderMismatch {
    /// Every supplied header name that did not match a column
    pub missing: Vec<String>,
    /// Header names actually present in the file
    pub available: Vec<String>,
}

/// Parse CSV text against the supplied header names
///
/// - Lines split on `\r\n` or `\n`; fewer than 2 lines is an empty result,
///   not an error.
/// - Rows missing any of the three fields after cleanup are silently dropped
///   (intentional pre-filtering, not an error).
pub fn parse(text: &str, headers: &CsvHeaders) -> Result<Vec<RawRow>, HeaderMismatch> {
    let lines: Vec<&str> = text.trim().split('\n').map(|l| l.trim_end_matches('\r')).collect();
    if lines.len() < 2 {
        return Ok(Vec::new());
    }

    let available: Vec<String> = lines[0].split(',').map(|h| h.trim().to_string()).collect();

    let find_index = |name: &str| -> Option<usize> {
        available.iter().position(|h| h.eq_ignore_ascii_case(name))
    };

    let first_name_idx = find_index(&headers.first_name);
    let last_name_idx = find_index(&headers.last_name);
    let email_idx = find_index(&headers.email);

    let mut missing = Vec::new();
    if first_name_idx.is_none() {
        missing.push(headers.first_name.clone());
    }
    if last_name_idx.is_none() {
        missing.push(headers.last_name.clone());
    }
    if email_idx.is_none() {
        missing.push(headers.email.clone());
    }
    if !missing.is_empty() {
        return Err(HeaderMismatch { missing, available });
    }

    // Indices are present past this point
    let (first_name_idx, last_name_idx, email_idx) = (
        first_name_idx.unwrap(),
        last_name_idx.unwrap(),
        email_idx.unwrap(),
    );

    let mut rows = Vec::new();
    for (idx, line) in lines[1..].iter().enumerate() {
        let fields: Vec<String> = line.split(',').map(clean_field).collect();
        let get = |i: usize| fields.get(i).cloned().unwrap_or_default();

        let first_name = get(first_name_idx);
        let last_name = get(last_name_idx);
        let email = get(email_idx);

        if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
            continue;
        }

        rows.push(RawRow {
            line_number: idx + 2,
            first_name,
            last_name,
            email,
        });
    }

    Ok(rows)
}

/// Trim whitespace and strip one pair of wrapping double quotes
fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

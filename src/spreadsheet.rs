//! Reads the address column out of an uploaded workbook.

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

/// Header substring (case-insensitive) that marks the address column.
const EMAIL_HEADER_MARKER: &str = "email";

/// Read the first worksheet of an `.xlsx`/`.xls` workbook and return the
/// trimmed, non-empty cells of the first column whose header contains
/// "email". Returns `Ok(None)` when no header matches.
///
/// The first row is treated as the header row.
pub fn read_email_column(bytes: Vec<u8>) -> Result<Option<Vec<String>>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("Not a readable spreadsheet")?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.context("Failed to read first worksheet")?,
        None => return Ok(None),
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(None);
    };
    let Some(column) = header
        .iter()
        .position(|cell| cell.to_string().to_lowercase().contains(EMAIL_HEADER_MARKER))
    else {
        return Ok(None);
    };

    let values = rows
        .filter_map(|row| row.get(column))
        .filter(|cell| !matches!(cell, Data::Empty))
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    Ok(Some(values))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rust_xlsxwriter::Workbook;

    /// Legacy BIFF8 workbook, sheet "Leads": `Name | Email`, with Ann, Bob
    /// (padded address), Dee (no address) and Cy.
    pub(crate) const LEADS_XLS: &[u8] = include_bytes!("../tests/fixtures/leads.xls");

    /// Build an `.xlsx` whose first row is `header` and whose following rows
    /// are `rows`. Empty strings leave the cell blank.
    pub(crate) fn workbook_bytes(header: &[&str], rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet
                        .write_string(r as u32 + 1, col as u16, *value)
                        .unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::{LEADS_XLS, workbook_bytes};
    use super::*;

    #[test]
    fn picks_first_column_mentioning_email() {
        let bytes = workbook_bytes(
            &["Name", "Work E-mail", "Primary Email", "Backup email"],
            &[
                &["Ann", "x", "ann@example.com", "ann2@example.com"],
                &["Bob", "y", "bob@example.com", ""],
            ],
        );
        let values = read_email_column(bytes).unwrap().unwrap();
        assert_eq!(values, vec!["ann@example.com", "bob@example.com"]);
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let bytes = workbook_bytes(&["EMAIL_ADDRESS"], &[&["a@example.com"]]);
        assert_eq!(
            read_email_column(bytes).unwrap().unwrap(),
            vec!["a@example.com"]
        );
    }

    #[test]
    fn drops_empty_cells_and_trims() {
        let bytes = workbook_bytes(
            &["id", "email"],
            &[
                &["1", "  padded@example.com  "],
                &["2", ""],
                &["3", "junk"],
            ],
        );
        assert_eq!(
            read_email_column(bytes).unwrap().unwrap(),
            vec!["padded@example.com", "junk"]
        );
    }

    #[test]
    fn no_matching_header_is_none() {
        let bytes = workbook_bytes(&["Name", "Phone"], &[&["Ann", "555"]]);
        assert!(read_email_column(bytes).unwrap().is_none());
    }

    #[test]
    fn reads_legacy_xls_workbooks() {
        assert_eq!(
            read_email_column(LEADS_XLS.to_vec()).unwrap().unwrap(),
            vec!["ann@example.com", "bob@example.com", "cy@example.org"]
        );
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(read_email_column(b"definitely not a workbook".to_vec()).is_err());
    }
}

//! Delimited-text parser for accident CSV files
//!
//! The published files mix `,`, `;` and tab separators and sometimes quote
//! every field. Normalization, in order:
//!
//! 1. strip `\r`
//! 2. strip `"`
//! 3. `;` -> `,`
//! 4. tab -> `,`
//! 5. split into lines; the first line is the header (lowercased)
//!
//! Quotes are deleted, not honoured: a comma inside a quoted field becomes a
//! column separator. Empty lines are skipped.

use std::path::Path;
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::models::RawTable;

/// Read and parse one file
pub async fn parse_file(path: &Path) -> IngestResult<RawTable> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::io(path, e))?;

    // Older releases are Latin-1; undecodable bytes become U+FFFD
    let content = String::from_utf8_lossy(&bytes);
    let table = parse_str(&content);
    debug!(
        path = %path.display(),
        columns = table.header.len(),
        rows = table.rows.len(),
        "Parsed file"
    );

    Ok(table)
}

/// Parse already-loaded file content
pub fn parse_str(content: &str) -> RawTable {
    let normalized: String = content
        .chars()
        .filter(|c| *c != '\r' && *c != '"')
        .map(|c| match c {
            ';' | '\t' => ',',
            other => other,
        })
        .collect();

    let mut lines = normalized.split('\n').filter(|line| !line.is_empty());

    let header = match lines.next() {
        Some(line) => split_cells(line).map(|c| c.to_lowercase()).collect(),
        None => return RawTable::default(),
    };

    let rows = lines
        .map(|line| split_cells(line).map(str::to_string).collect::<Vec<_>>())
        .collect();

    RawTable { header, rows }
}

fn split_cells(line: &str) -> impl Iterator<Item = &str> {
    line.split(',')
}

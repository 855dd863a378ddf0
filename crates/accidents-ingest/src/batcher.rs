//! Row chunking
//!
//! Bounds the size of a single insert statement. At the default 200 rows the
//! widest table (34 columns) binds 6 800 parameters, well under the
//! PostgreSQL limit of 65 535.

use crate::models::{Chunk, RawTable};

/// Default rows per insert statement
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Split the table's rows into consecutive chunks of at most `size` rows.
///
/// Every chunk shares the table header. `size` must be non-zero; the
/// configuration layer rejects 0.
pub fn chunks(table: &RawTable, size: usize) -> impl Iterator<Item = Chunk<'_>> {
    let header = table.header.as_slice();
    let size = size.max(1);
    table
        .rows
        .chunks(size)
        .enumerate()
        .map(move |(i, rows)| Chunk {
            header,
            rows,
            offset: i * size,
        })
}

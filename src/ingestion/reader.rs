//! Blocking CSV reader feeding the async pipeline.
//!
//! The `csv` parser is synchronous, so it runs on a blocking thread and hands rows over a
//! bounded channel. The bound keeps read-ahead (and memory) small regardless of file size.
//! If the receiving side goes away the reader stops at the next row.

use super::types::{ColumnMap, ParsedRow};
use crate::operations::types::PipelineError;

use std::io::Read;
use tokio::sync::mpsc;

pub const READ_AHEAD_ROWS: usize = 1024;

pub type RowSender = mpsc::Sender<Result<ParsedRow, PipelineError>>;

/// Streams accepted rows into `tx`; a parse failure is sent as the final item.
pub fn read_rows<R: Read>(input: R, tx: RowSender) {
    if let Err(err) = stream_rows(input, &tx) {
        if tx.blocking_send(Err(err)).is_err() {
            tracing::debug!("Row consumer gone before reader error could be delivered");
        }
    }
}

fn stream_rows<R: Read>(input: R, tx: &RowSender) -> Result<(), PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    // No header line at all: an empty file imports nothing.
    if headers.is_empty() {
        return Ok(());
    }
    let columns = ColumnMap::resolve(&headers)?;

    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        let Some(draft) = columns.draft(&record) else {
            continue;
        };
        let row = ParsedRow {
            draft,
            bytes_read: reader.position().byte(),
        };
        if tx.blocking_send(Ok(row)).is_err() {
            tracing::debug!("Row consumer gone; stopping reader");
            return Ok(());
        }
    }
    Ok(())
}

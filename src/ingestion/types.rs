use crate::catalog::types::RecordDraft;
use crate::operations::types::PipelineError;

/// Tuning knobs for the import pipeline.
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Distinct SKUs buffered before a bulk upsert.
    pub batch_size: usize,
    /// Accepted rows between progress snapshots.
    pub progress_every: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            progress_every: 1000,
        }
    }
}

/// One accepted data row, plus how far into the input the parser had read.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub draft: RecordDraft,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Rows with a non-blank SKU, duplicates included.
    pub rows_processed: u64,
    pub batches_flushed: u64,
}

/// Column positions resolved from the header row. Names match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub sku: usize,
    pub name: usize,
    pub description: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &csv::StringRecord) -> Result<Self, PipelineError> {
        let position = |column: &str| headers.iter().position(|header| header == column);
        Ok(Self {
            sku: position("sku").ok_or(PipelineError::MissingColumn("sku"))?,
            name: position("name").ok_or(PipelineError::MissingColumn("name"))?,
            description: position("description"),
        })
    }

    /// `None` for rows whose SKU is blank; those are skipped, not rejected.
    /// Short rows read missing cells as empty.
    pub fn draft(&self, row: &csv::StringRecord) -> Option<RecordDraft> {
        let cell = |index: usize| row.get(index).unwrap_or("");
        let sku = cell(self.sku).trim();
        if sku.is_empty() {
            return None;
        }
        let description = self.description.map(cell).unwrap_or("");
        Some(RecordDraft::new(sku, cell(self.name), description))
    }
}

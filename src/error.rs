//! Error types for the reconciliation engine.
//!
//! Every error aborts the current operation immediately; the engine never
//! substitutes a default value for a failed extraction or formatting step,
//! because doing so would corrupt the reconciliation result.

use recon_core::{Row, RowValue};
use thiserror::Error;

/// Value types the statement synthesizer can render as SQL literals.
pub const SUPPORTED_SQL_TYPES: &[&str] = &[
    "null",
    "boolean",
    "integer",
    "float",
    "decimal",
    "string",
    "timestamp",
    "duration",
    "uuid",
    "bytes",
    "array",
    "object",
];

/// Errors that can occur during reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A row lacks a field required by the key specification.
    #[error("key field '{field}' not found in row (available fields: {available:?})")]
    MissingKeyField { field: String, available: Vec<String> },

    /// A key field is present but null.
    #[error("key field '{field}' has NULL value in row {row:?} (keys cannot be NULL)")]
    NullKeyValue { field: String, row: Row },

    /// A value has no SQL literal form.
    #[error(
        "no SQL literal for {type_name} value {value:?} (supported types: {:?})",
        SUPPORTED_SQL_TYPES
    )]
    UnsupportedValue {
        type_name: &'static str,
        value: RowValue,
    },

    /// A row failed key extraction, annotated with its position in the
    /// dataset.
    #[error("invalid row at index {index}: {source}")]
    InvalidRow {
        index: usize,
        source: Box<ReconcileError>,
    },

    /// Batch insert called with zero rows.
    #[error("cannot generate a batch insert from zero rows")]
    EmptyBatch,

    /// Batch insert called with rows that do not share one field set.
    #[error("row {index} in batch does not share the field set of the first row")]
    HeterogeneousBatch { index: usize },

    /// A mismatch has no non-key fields left to update.
    #[error("mismatch for key {key} has no non-key fields to update")]
    NothingToUpdate { key: String },
}

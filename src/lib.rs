//! Reconciliation engine for CDC-replicated datasets.
//!
//! Compares two independently maintained copies of one logical dataset (a
//! ScyllaDB source and a PostgreSQL target kept approximately in sync by
//! an external replication pipeline), detects discrepancies between them,
//! and synthesizes injection-safe repair statements.
//!
//! # Components
//!
//! - [`comparer`] - value normalization and field-by-field row comparison
//! - [`differ`] - key extraction, indexing, and discrepancy detection in
//!   full, streaming, and lazy-iterator modes
//! - [`repairer`] - INSERT/UPDATE/DELETE statement synthesis
//! - [`report`] - discrepancy and result types
//!
//! The engine never opens a database connection: callers supply row
//! iterables from both sides and decide what to do with the generated
//! [`RepairAction`]s (execute, log, or discard in a dry run). Scheduling,
//! transport, and credentials live with the caller.
//!
//! Every component is synchronous and stateless; all configuration is
//! passed per call, so one engine instance may be shared across threads,
//! one table per thread, without coordination.
//!
//! # Example
//!
//! ```rust
//! use scylla_pg_reconcile::{DataDiffer, KeySpec, Row, RowValue};
//!
//! let mut row = Row::new();
//! row.insert("id".to_string(), RowValue::from(1i64));
//!
//! let differ = DataDiffer::new();
//! let result = differ
//!     .find_all_discrepancies(&[row], &[], &KeySpec::field("id"), &[])
//!     .unwrap();
//! assert_eq!(result.missing_count, 1);
//! ```

pub mod comparer;
pub mod differ;
pub mod error;
pub mod repairer;
pub mod report;

pub use comparer::{
    CompareOptions, FieldDifference, RowComparer, RowComparison, DEFAULT_FLOAT_TOLERANCE,
};
pub use differ::{build_key_index, extract_key, DataDiffer, DiscrepancyIter, Key, KeySpec};
pub use error::{ReconcileError, SUPPORTED_SQL_TYPES};
pub use recon_core::{Row, RowValue};
pub use repairer::{format_value, quote_identifier, RepairAction, RepairActionType, Repairer};
pub use report::{
    Discrepancy, DiscrepancyKind, DuplicateKey, Mismatch, ReconciliationResult, ScanStats,
    SchemaDiff, SAMPLE_LIMIT,
};

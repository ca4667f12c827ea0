//! Core value types for the scylla-pg-reconcile engine.
//!
//! This crate provides the foundational value model shared by every
//! engine component:
//!
//! - [`RowValue`] - closed tagged representation of the field values both
//!   sides of a reconciliation can produce
//! - [`Row`] - field name to value mapping
//!
//! # Architecture
//!
//! recon-core sits at the foundation of the engine:
//!
//! ```text
//! recon-core (this crate)
//!    │
//!    ├─── comparer  (normalizes and compares RowValues)
//!    ├─── differ    (indexes Rows by canonical key strings)
//!    └─── repairer  (renders RowValues as SQL literals)
//! ```
//!
//! A value canonicalized here compares, indexes, and formats identically
//! everywhere in the engine.

pub mod value;

pub use value::{Row, RowValue};

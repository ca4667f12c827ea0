//! Key extraction, indexing, and discrepancy detection.
//!
//! The differ classifies rows into three categories: missing (in the
//! source but not the target), extra (in the target but not the source),
//! and mismatched (present on both sides with differing values). Three
//! detection strategies are provided:
//!
//! - [`DataDiffer::find_all_discrepancies`] - full key indices on both
//!   sides; for datasets that fit in memory
//! - [`DataDiffer::find_all_discrepancies_streaming`] - chunked passes
//!   with key-only tracking on the target side, bounding peak memory
//! - [`DataDiffer::iter_discrepancies`] - a lazy sequence yielding one
//!   discrepancy at a time

use crate::comparer::{CompareOptions, RowComparer};
use crate::error::ReconcileError;
use crate::report::{
    Discrepancy, DuplicateKey, Mismatch, ReconciliationResult, SchemaDiff, ScanStats, SAMPLE_LIMIT,
};
use recon_core::Row;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How often the streaming path reports progress, in batches.
const PROGRESS_INTERVAL: usize = 10;

/// The field(s) that carry a row's identity across both datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeySpec {
    /// A single key field.
    Field(String),

    /// An ordered tuple of key fields.
    Composite(Vec<String>),
}

impl KeySpec {
    /// Key specification over a single field.
    pub fn field(name: impl Into<String>) -> Self {
        KeySpec::Field(name.into())
    }

    /// Key specification over an ordered tuple of fields.
    pub fn composite<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySpec::Composite(names.into_iter().map(Into::into).collect())
    }

    /// The key field names, in order.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            KeySpec::Field(name) => vec![name.as_str()],
            KeySpec::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A row identity extracted under a [`KeySpec`]: the canonical string
/// form of the key field value(s).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Key {
    Single(String),
    Composite(Vec<String>),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Single(value) => f.write_str(value),
            Key::Composite(values) => write!(f, "({})", values.join(", ")),
        }
    }
}

/// Extract a row's key under the given specification.
///
/// Fails with [`ReconcileError::MissingKeyField`] if a key field is absent
/// and [`ReconcileError::NullKeyValue`] if one is null. Never substitutes
/// a default value.
pub fn extract_key(row: &Row, spec: &KeySpec) -> Result<Key, ReconcileError> {
    match spec {
        KeySpec::Field(name) => Ok(Key::Single(key_part(row, name)?)),
        KeySpec::Composite(names) => {
            let mut parts = Vec::with_capacity(names.len());
            for name in names {
                parts.push(key_part(row, name)?);
            }
            Ok(Key::Composite(parts))
        }
    }
}

fn key_part(row: &Row, field: &str) -> Result<String, ReconcileError> {
    let value = row.get(field).ok_or_else(|| ReconcileError::MissingKeyField {
        field: field.to_string(),
        available: row.keys().cloned().collect(),
    })?;
    if value.is_null() {
        return Err(ReconcileError::NullKeyValue {
            field: field.to_string(),
            row: row.clone(),
        });
    }
    Ok(value.canonical_string())
}

/// Build a key-to-row index for one dataset.
///
/// Fail-fast: the first row that fails key extraction aborts the build
/// with [`ReconcileError::InvalidRow`] carrying the row's position; no
/// partial index is returned. When two rows share a key, the last one
/// wins and a warning is logged.
pub fn build_key_index(rows: &[Row], spec: &KeySpec) -> Result<BTreeMap<Key, Row>, ReconcileError> {
    let mut index = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = extract_key(row, spec).map_err(|e| ReconcileError::InvalidRow {
            index: i,
            source: Box::new(e),
        })?;
        if index.contains_key(&key) {
            tracing::warn!(%key, "duplicate key in dataset, keeping the last row");
        }
        index.insert(key, row.clone());
    }
    Ok(index)
}

/// Detects discrepancies between source and target datasets.
///
/// Stateless apart from its embedded [`RowComparer`]; one instance may be
/// used concurrently, one thread per table, without coordination.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataDiffer {
    comparer: RowComparer,
}

impl DataDiffer {
    pub fn new() -> Self {
        DataDiffer {
            comparer: RowComparer::new(),
        }
    }

    /// Find all discrepancies by building full key indices for both
    /// sides. Appropriate for datasets that fit in memory.
    pub fn find_all_discrepancies(
        &self,
        source: &[Row],
        target: &[Row],
        key_spec: &KeySpec,
        ignore_fields: &[String],
    ) -> Result<ReconciliationResult, ReconcileError> {
        let source_index = build_key_index(source, key_spec)?;
        let target_index = build_key_index(target, key_spec)?;
        let options = compare_options(ignore_fields);

        let mut result = ReconciliationResult {
            stats: ScanStats {
                source_rows_scanned: source.len(),
                target_rows_scanned: target.len(),
                batches_processed: 1,
            },
            ..Default::default()
        };

        for (key, source_row) in &source_index {
            match target_index.get(key) {
                None => result.record(Discrepancy::Missing {
                    key: key.clone(),
                    row: source_row.clone(),
                }),
                Some(target_row) => {
                    let comparison =
                        self.comparer
                            .compare_rows_detailed(source_row, target_row, &options);
                    if comparison.is_equal {
                        result.matched_count += 1;
                    } else {
                        result.record(Discrepancy::Mismatch(Mismatch {
                            key: key.clone(),
                            source_row: source_row.clone(),
                            target_row: target_row.clone(),
                            differing_fields: comparison.differing_fields,
                        }));
                    }
                }
            }
        }
        for (key, target_row) in &target_index {
            if !source_index.contains_key(key) {
                result.record(Discrepancy::Extra {
                    key: key.clone(),
                    row: target_row.clone(),
                });
            }
        }

        tracing::info!(
            missing = result.missing_count,
            extra = result.extra_count,
            mismatched = result.mismatch_count,
            "discrepancy scan complete"
        );
        Ok(result)
    }

    /// Find all discrepancies in batches of `batch_size` rows, bounding
    /// peak memory versus the full-materialization path.
    ///
    /// The source side is indexed with row bodies (needed for comparison
    /// and for `Missing` samples); the target side is tracked by key
    /// only, with bodies dropped as soon as each row is classified. The
    /// remaining memory floor, O(distinct keys), is intentional: key-set
    /// membership must be known on both sides to classify `Missing` and
    /// `Extra`.
    ///
    /// Aggregate counts are identical to [`Self::find_all_discrepancies`]
    /// for the same input, for every `batch_size`. `on_progress` is
    /// invoked every 10 batches with `(rows_processed, total_estimate)`.
    pub fn find_all_discrepancies_streaming(
        &self,
        source: &[Row],
        target: &[Row],
        key_spec: &KeySpec,
        batch_size: usize,
        ignore_fields: &[String],
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let batch_size = batch_size.max(1);
        let options = compare_options(ignore_fields);
        let total_estimate = source.len() + target.len();
        let mut batches_processed = 0usize;
        let mut rows_processed = 0usize;

        // Pass 1: index the source side, last row winning on duplicate
        // keys exactly as build_key_index does.
        let mut source_index: BTreeMap<Key, Row> = BTreeMap::new();
        for batch in source.chunks(batch_size) {
            for (offset, row) in batch.iter().enumerate() {
                let index = rows_processed + offset;
                let key = extract_key(row, key_spec).map_err(|e| ReconcileError::InvalidRow {
                    index,
                    source: Box::new(e),
                })?;
                if source_index.contains_key(&key) {
                    tracing::warn!(%key, "duplicate key in source dataset, keeping the last row");
                }
                source_index.insert(key, row.clone());
            }
            rows_processed += batch.len();
            batches_processed += 1;
            report_progress(&mut on_progress, batches_processed, rows_processed, total_estimate);
        }

        // Pass 2: stream the target side. Per-key comparison state is
        // overwritten on duplicate target keys, so the last occurrence
        // decides, matching the full path's last-wins index.
        let mut target_keys: BTreeSet<Key> = BTreeSet::new();
        let mut mismatched: BTreeMap<Key, bool> = BTreeMap::new();
        let mut mismatch_samples: BTreeMap<Key, Mismatch> = BTreeMap::new();
        let mut extra_keys: BTreeSet<Key> = BTreeSet::new();
        let mut extra_samples: BTreeMap<Key, Row> = BTreeMap::new();
        let mut target_position = 0usize;
        for batch in target.chunks(batch_size) {
            for (offset, row) in batch.iter().enumerate() {
                let index = target_position + offset;
                let key = extract_key(row, key_spec).map_err(|e| ReconcileError::InvalidRow {
                    index,
                    source: Box::new(e),
                })?;
                match source_index.get(&key) {
                    Some(source_row) => {
                        let comparison =
                            self.comparer.compare_rows_detailed(source_row, row, &options);
                        if comparison.is_equal {
                            mismatched.insert(key.clone(), false);
                            mismatch_samples.remove(&key);
                        } else {
                            mismatched.insert(key.clone(), true);
                            if mismatch_samples.contains_key(&key)
                                || mismatch_samples.len() < SAMPLE_LIMIT
                            {
                                mismatch_samples.insert(
                                    key.clone(),
                                    Mismatch {
                                        key: key.clone(),
                                        source_row: source_row.clone(),
                                        target_row: row.clone(),
                                        differing_fields: comparison.differing_fields,
                                    },
                                );
                            }
                        }
                    }
                    None => {
                        if extra_samples.contains_key(&key) || extra_samples.len() < SAMPLE_LIMIT {
                            extra_samples.insert(key.clone(), row.clone());
                        }
                        extra_keys.insert(key.clone());
                    }
                }
                target_keys.insert(key);
            }
            target_position += batch.len();
            rows_processed += batch.len();
            batches_processed += 1;
            report_progress(&mut on_progress, batches_processed, rows_processed, total_estimate);
        }

        // Assemble the result in key order, matching the full path.
        let mut result = ReconciliationResult {
            stats: ScanStats {
                source_rows_scanned: source.len(),
                target_rows_scanned: target.len(),
                batches_processed,
            },
            ..Default::default()
        };
        for (key, source_row) in &source_index {
            if !target_keys.contains(key) {
                result.record(Discrepancy::Missing {
                    key: key.clone(),
                    row: source_row.clone(),
                });
            }
        }
        for (key, is_mismatched) in &mismatched {
            if *is_mismatched {
                match mismatch_samples.remove(key) {
                    Some(sample) => result.record(Discrepancy::Mismatch(sample)),
                    // Sample budget exhausted during the pass; count only.
                    None => result.mismatch_count += 1,
                }
            } else {
                result.matched_count += 1;
            }
        }
        for key in &extra_keys {
            match extra_samples.remove(key) {
                Some(row) => result.record(Discrepancy::Extra {
                    key: key.clone(),
                    row,
                }),
                None => result.extra_count += 1,
            }
        }

        tracing::info!(
            missing = result.missing_count,
            extra = result.extra_count,
            mismatched = result.mismatch_count,
            batches = batches_processed,
            "streaming discrepancy scan complete"
        );
        Ok(result)
    }

    /// Lazily compare two row streams, yielding one discrepancy at a
    /// time without materializing a result set.
    ///
    /// The source stream is indexed up front; the target stream is
    /// consumed as the sequence is pulled, and each target row is
    /// classified per occurrence. Stop pulling to cancel; no cleanup is
    /// required beyond dropping the iterator.
    pub fn iter_discrepancies<S, T>(
        &self,
        source: S,
        target: T,
        key_spec: &KeySpec,
        ignore_fields: &[String],
    ) -> Result<DiscrepancyIter<T::IntoIter>, ReconcileError>
    where
        S: IntoIterator<Item = Row>,
        T: IntoIterator<Item = Row>,
    {
        let mut source_index = BTreeMap::new();
        for (index, row) in source.into_iter().enumerate() {
            let key = extract_key(&row, key_spec).map_err(|e| ReconcileError::InvalidRow {
                index,
                source: Box::new(e),
            })?;
            if source_index.contains_key(&key) {
                tracing::warn!(%key, "duplicate key in source dataset, keeping the last row");
            }
            source_index.insert(key, row);
        }
        Ok(DiscrepancyIter {
            comparer: self.comparer,
            options: compare_options(ignore_fields),
            key_spec: key_spec.clone(),
            source_index,
            seen: BTreeSet::new(),
            target: target.into_iter(),
            target_position: 0,
            drain: None,
            done: false,
        })
    }

    /// Field-name differences between the two datasets.
    ///
    /// Schemas are sparse: the field set of each side is the union across
    /// every row scanned, not just the first. Empty inputs yield empty
    /// sets.
    pub fn find_schema_differences(&self, source: &[Row], target: &[Row]) -> SchemaDiff {
        let source_fields = field_union(source);
        let target_fields = field_union(target);
        SchemaDiff {
            only_in_source: source_fields.difference(&target_fields).cloned().collect(),
            only_in_target: target_fields.difference(&source_fields).cloned().collect(),
            common_fields: source_fields.intersection(&target_fields).cloned().collect(),
        }
    }

    /// Keys occurring more than once within one dataset, with counts.
    pub fn find_duplicates(
        &self,
        rows: &[Row],
        key_spec: &KeySpec,
    ) -> Result<Vec<DuplicateKey>, ReconcileError> {
        let mut counts: BTreeMap<Key, usize> = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            let key = extract_key(row, key_spec).map_err(|e| ReconcileError::InvalidRow {
                index,
                source: Box::new(e),
            })?;
            *counts.entry(key).or_insert(0) += 1;
        }
        let duplicates: Vec<DuplicateKey> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, count)| DuplicateKey { key, count })
            .collect();
        if !duplicates.is_empty() {
            tracing::warn!(count = duplicates.len(), "duplicate keys found in dataset");
        }
        Ok(duplicates)
    }
}

fn compare_options(ignore_fields: &[String]) -> CompareOptions {
    CompareOptions {
        ignore_fields: ignore_fields.to_vec(),
        ..CompareOptions::default()
    }
}

fn field_union(rows: &[Row]) -> BTreeSet<String> {
    rows.iter().flat_map(|row| row.keys().cloned()).collect()
}

fn report_progress(
    on_progress: &mut Option<&mut dyn FnMut(usize, usize)>,
    batches_processed: usize,
    rows_processed: usize,
    total_estimate: usize,
) {
    if batches_processed % PROGRESS_INTERVAL == 0 {
        if let Some(callback) = on_progress.as_mut() {
            callback(rows_processed, total_estimate);
        }
    }
}

/// Lazy discrepancy sequence returned by
/// [`DataDiffer::iter_discrepancies`].
///
/// Forward-only and single-pass. Holds the source index plus the set of
/// target keys seen so far; the memory floor is O(distinct source keys),
/// the minimum needed to classify `Missing` and `Extra`.
pub struct DiscrepancyIter<T>
where
    T: Iterator<Item = Row>,
{
    comparer: RowComparer,
    options: CompareOptions,
    key_spec: KeySpec,
    source_index: BTreeMap<Key, Row>,
    seen: BTreeSet<Key>,
    target: T,
    target_position: usize,
    drain: Option<std::collections::btree_map::IntoIter<Key, Row>>,
    done: bool,
}

impl<T> Iterator for DiscrepancyIter<T>
where
    T: Iterator<Item = Row>,
{
    type Item = Result<Discrepancy, ReconcileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            // Drain phase: the target stream is exhausted; whatever
            // source keys were never seen are missing from the target.
            if let Some(drain) = self.drain.as_mut() {
                for (key, row) in drain.by_ref() {
                    if !self.seen.contains(&key) {
                        return Some(Ok(Discrepancy::Missing { key, row }));
                    }
                }
                self.done = true;
                return None;
            }

            match self.target.next() {
                Some(row) => {
                    let position = self.target_position;
                    self.target_position += 1;
                    let key = match extract_key(&row, &self.key_spec) {
                        Ok(key) => key,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(ReconcileError::InvalidRow {
                                index: position,
                                source: Box::new(e),
                            }));
                        }
                    };
                    self.seen.insert(key.clone());
                    match self.source_index.get(&key) {
                        None => return Some(Ok(Discrepancy::Extra { key, row })),
                        Some(source_row) => {
                            let comparison = self.comparer.compare_rows_detailed(
                                source_row,
                                &row,
                                &self.options,
                            );
                            if comparison.is_equal {
                                continue;
                            }
                            return Some(Ok(Discrepancy::Mismatch(Mismatch {
                                key,
                                source_row: source_row.clone(),
                                target_row: row,
                                differing_fields: comparison.differing_fields,
                            })));
                        }
                    }
                }
                None => {
                    let index = std::mem::take(&mut self.source_index);
                    self.drain = Some(index.into_iter());
                }
            }
        }
    }
}

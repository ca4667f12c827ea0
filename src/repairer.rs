//! Repair statement synthesis for detected discrepancies.
//!
//! Converts rows and mismatches into injection-safe INSERT, UPDATE, and
//! DELETE statements for the PostgreSQL target. The engine only produces
//! statement text; executing a [`RepairAction`] against a live connection
//! is the caller's concern.

use crate::differ::KeySpec;
use crate::error::ReconcileError;
use crate::report::{Discrepancy, Mismatch};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use recon_core::{Row, RowValue};
use serde::Serialize;
use std::fmt::Write as _;

/// Kind of statement a repair action carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepairActionType {
    Insert,
    Update,
    Delete,
}

impl RepairActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairActionType::Insert => "INSERT",
            RepairActionType::Update => "UPDATE",
            RepairActionType::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for RepairActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated, not-yet-executed repair statement.
///
/// Pure data: owns no connection or transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairAction {
    pub action_type: RepairActionType,

    /// Qualified target, `schema.table`.
    pub table: String,

    /// The statement text.
    pub sql: String,

    /// Row(s) the statement was generated from.
    pub rows: Vec<Row>,

    /// For updates, the fields covered by the SET clause.
    pub updated_fields: Vec<String>,

    /// Marker set by dry-run generation; the statement is identical
    /// either way.
    pub dry_run: bool,

    pub generated_at: DateTime<Utc>,
}

/// Synthesizes repair statements from rows and mismatches.
///
/// Identifier quoting is on by default so reserved keywords and special
/// characters are always safe as column or table names;
/// [`Repairer::unquoted`] is the explicit compatibility opt-out.
#[derive(Debug, Clone, Copy)]
pub struct Repairer {
    quote_identifiers: bool,
}

impl Default for Repairer {
    fn default() -> Self {
        Repairer::new()
    }
}

impl Repairer {
    /// Repairer that quotes every identifier (the default).
    pub fn new() -> Self {
        Repairer {
            quote_identifiers: true,
        }
    }

    /// Repairer that emits bare identifiers, for targets that cannot
    /// accept quoted names.
    pub fn unquoted() -> Self {
        Repairer {
            quote_identifiers: false,
        }
    }

    /// INSERT statement for a row missing from the target.
    pub fn generate_insert(
        &self,
        row: &Row,
        table: &str,
        schema: &str,
    ) -> Result<RepairAction, ReconcileError> {
        let columns: Vec<String> = row.keys().map(|field| self.identifier(field)).collect();
        let mut values = Vec::with_capacity(row.len());
        for value in row.values() {
            values.push(format_value(value)?);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.table_ref(schema, table),
            columns.join(", "),
            values.join(", ")
        );
        Ok(self.action(
            RepairActionType::Insert,
            schema,
            table,
            sql,
            vec![row.clone()],
            Vec::new(),
        ))
    }

    /// One multi-row INSERT for rows sharing an identical field set.
    pub fn generate_batch_insert(
        &self,
        rows: &[Row],
        table: &str,
        schema: &str,
    ) -> Result<RepairAction, ReconcileError> {
        let first = rows.first().ok_or(ReconcileError::EmptyBatch)?;
        for (index, row) in rows.iter().enumerate().skip(1) {
            if !row.keys().eq(first.keys()) {
                return Err(ReconcileError::HeterogeneousBatch { index });
            }
        }

        let columns: Vec<String> = first.keys().map(|field| self.identifier(field)).collect();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(row.len());
            for value in row.values() {
                values.push(format_value(value)?);
            }
            tuples.push(format!("({})", values.join(", ")));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES\n    {};",
            self.table_ref(schema, table),
            columns.join(", "),
            tuples.join(",\n    ")
        );
        Ok(self.action(
            RepairActionType::Insert,
            schema,
            table,
            sql,
            rows.to_vec(),
            Vec::new(),
        ))
    }

    /// UPDATE statement correcting a mismatched row in the target.
    ///
    /// The SET clause covers the mismatch's recorded differing fields,
    /// falling back to all non-key fields when none were recorded; values
    /// come from the source row. The WHERE clause is built from the key.
    pub fn generate_update(
        &self,
        mismatch: &Mismatch,
        table: &str,
        schema: &str,
        key_spec: &KeySpec,
    ) -> Result<RepairAction, ReconcileError> {
        let source_row = &mismatch.source_row;
        let key_fields = key_spec.field_names();

        let mut updated_fields: Vec<String> = mismatch
            .differing_fields
            .iter()
            .filter(|field| source_row.contains_key(*field))
            .cloned()
            .collect();
        if updated_fields.is_empty() {
            updated_fields = source_row
                .keys()
                .filter(|field| !key_fields.contains(&field.as_str()))
                .cloned()
                .collect();
        }
        if updated_fields.is_empty() {
            return Err(ReconcileError::NothingToUpdate {
                key: mismatch.key.to_string(),
            });
        }

        let mut set_parts = Vec::with_capacity(updated_fields.len());
        for field in &updated_fields {
            set_parts.push(format!(
                "{} = {}",
                self.identifier(field),
                format_value(&source_row[field])?
            ));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {};",
            self.table_ref(schema, table),
            set_parts.join(", "),
            self.where_clause(source_row, key_spec)?
        );
        Ok(self.action(
            RepairActionType::Update,
            schema,
            table,
            sql,
            vec![source_row.clone()],
            updated_fields,
        ))
    }

    /// DELETE statement for a row present only in the target.
    pub fn generate_delete(
        &self,
        row: &Row,
        table: &str,
        schema: &str,
        key_spec: &KeySpec,
    ) -> Result<RepairAction, ReconcileError> {
        let sql = format!(
            "DELETE FROM {} WHERE {};",
            self.table_ref(schema, table),
            self.where_clause(row, key_spec)?
        );
        Ok(self.action(
            RepairActionType::Delete,
            schema,
            table,
            sql,
            vec![row.clone()],
            Vec::new(),
        ))
    }

    /// Generate repair actions for a whole discrepancy list.
    ///
    /// DELETEs come first so reinserted keys cannot collide, then
    /// INSERTs, then UPDATEs. `dry_run` is stamped onto every action.
    pub fn generate_repair_actions(
        &self,
        discrepancies: &[Discrepancy],
        table: &str,
        schema: &str,
        key_spec: &KeySpec,
        dry_run: bool,
    ) -> Result<Vec<RepairAction>, ReconcileError> {
        let mut deletes = Vec::new();
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        for discrepancy in discrepancies {
            match discrepancy {
                Discrepancy::Extra { row, .. } => {
                    deletes.push(self.generate_delete(row, table, schema, key_spec)?)
                }
                Discrepancy::Missing { row, .. } => {
                    inserts.push(self.generate_insert(row, table, schema)?)
                }
                Discrepancy::Mismatch(mismatch) => {
                    updates.push(self.generate_update(mismatch, table, schema, key_spec)?)
                }
            }
        }

        tracing::info!(
            deletes = deletes.len(),
            inserts = inserts.len(),
            updates = updates.len(),
            "generated repair actions"
        );
        let mut actions: Vec<RepairAction> =
            deletes.into_iter().chain(inserts).chain(updates).collect();
        for action in &mut actions {
            action.dry_run = dry_run;
        }
        Ok(actions)
    }

    fn action(
        &self,
        action_type: RepairActionType,
        schema: &str,
        table: &str,
        sql: String,
        rows: Vec<Row>,
        updated_fields: Vec<String>,
    ) -> RepairAction {
        RepairAction {
            action_type,
            table: format!("{schema}.{table}"),
            sql,
            rows,
            updated_fields,
            dry_run: false,
            generated_at: Utc::now(),
        }
    }

    fn identifier(&self, name: &str) -> String {
        if self.quote_identifiers {
            quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    fn table_ref(&self, schema: &str, table: &str) -> String {
        if self.quote_identifiers {
            format!("{}.{}", quote_identifier(schema), quote_identifier(table))
        } else {
            format!("{schema}.{table}")
        }
    }

    /// Equality conditions over the key fields, joined with AND.
    fn where_clause(&self, row: &Row, key_spec: &KeySpec) -> Result<String, ReconcileError> {
        let mut conditions = Vec::new();
        for field in key_spec.field_names() {
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
            conditions.push(format!(
                "{} = {}",
                self.identifier(field),
                format_value(value)?
            ));
        }
        Ok(conditions.join(" AND "))
    }
}

/// Quote a SQL identifier, doubling embedded quote characters, so
/// reserved keywords and special characters are safe as column or table
/// names.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a value as a SQL literal.
///
/// Total over [`RowValue`] except for non-finite floats, which have no
/// literal form and fail with [`ReconcileError::UnsupportedValue`] rather
/// than being silently stringified.
pub fn format_value(value: &RowValue) -> Result<String, ReconcileError> {
    match value {
        RowValue::Null => Ok("NULL".to_string()),
        RowValue::Bool(true) => Ok("TRUE".to_string()),
        RowValue::Bool(false) => Ok("FALSE".to_string()),
        RowValue::Int(i) => Ok(i.to_string()),
        RowValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        RowValue::Float(_) => Err(unsupported(value)),
        RowValue::Decimal(d) => Ok(d.to_string()),
        RowValue::String(s) => Ok(quote_literal(s)),
        RowValue::Timestamp(ts) => Ok(format!("'{}'", ts.to_rfc3339())),
        RowValue::Duration(d) => Ok(format!("INTERVAL '{} seconds'", d.as_secs())),
        RowValue::Uuid(u) => Ok(format!("'{u}'")),
        RowValue::Bytes(bytes) => Ok(hex_literal(bytes)),
        RowValue::Array(_) | RowValue::Object(_) => {
            let json = value_to_json(value)?;
            Ok(quote_literal(&json.to_string()))
        }
    }
}

fn unsupported(value: &RowValue) -> ReconcileError {
    ReconcileError::UnsupportedValue {
        type_name: value.type_name(),
        value: value.clone(),
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// PostgreSQL hex bytea literal, `'\xDEADBEEF'`.
fn hex_literal(bytes: &[u8]) -> String {
    let mut literal = String::with_capacity(bytes.len() * 2 + 4);
    literal.push_str("'\\x");
    for byte in bytes {
        let _ = write!(literal, "{byte:02X}");
    }
    literal.push('\'');
    literal
}

/// JSON rendering for array/object literals: timestamps as RFC 3339
/// strings, bytes as base64, decimals and durations as strings.
fn value_to_json(value: &RowValue) -> Result<serde_json::Value, ReconcileError> {
    Ok(match value {
        RowValue::Null => serde_json::Value::Null,
        RowValue::Bool(b) => serde_json::Value::Bool(*b),
        RowValue::Int(i) => serde_json::Value::Number((*i).into()),
        RowValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| unsupported(value))?,
        RowValue::Decimal(d) => serde_json::Value::String(d.to_string()),
        RowValue::String(s) => serde_json::Value::String(s.clone()),
        RowValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        RowValue::Duration(d) => serde_json::Value::String(format!("{}s", d.as_secs())),
        RowValue::Uuid(u) => serde_json::Value::String(u.to_string()),
        RowValue::Bytes(bytes) => {
            serde_json::Value::String(general_purpose::STANDARD.encode(bytes))
        }
        RowValue::Array(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                array.push(value_to_json(item)?);
            }
            serde_json::Value::Array(array)
        }
        RowValue::Object(map) => {
            let mut object = serde_json::Map::new();
            for (field, item) in map {
                object.insert(field.clone(), value_to_json(item)?);
            }
            serde_json::Value::Object(object)
        }
    })
}

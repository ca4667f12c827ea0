//! Row-level comparison between source and target datasets.
//!
//! Values are normalized before comparison so that the "same" value
//! arriving in different native representations compares equal: decimals
//! lose trailing zeros, UUID strings match typed UUIDs, and numeric types
//! compare by magnitude under a tolerance.

use recon_core::{Row, RowValue};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Tolerance applied to floating-point and decimal comparison when the
/// caller does not supply one.
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1e-4;

/// Per-call comparison options.
///
/// Tolerance is call-scoped and never stored on the comparer; a call
/// without an explicit tolerance always uses the default.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Field names excluded from comparison.
    pub ignore_fields: Vec<String>,

    /// Whether field names match case-sensitively.
    pub case_sensitive: bool,

    /// Tolerance for float/decimal comparison; `None` means
    /// [`DEFAULT_FLOAT_TOLERANCE`].
    pub float_tolerance: Option<f64>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            ignore_fields: Vec::new(),
            case_sensitive: true,
            float_tolerance: None,
        }
    }
}

impl CompareOptions {
    /// Options ignoring the given fields.
    pub fn ignoring<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompareOptions {
            ignore_fields: fields.into_iter().map(Into::into).collect(),
            ..CompareOptions::default()
        }
    }

    /// Set an explicit float tolerance for this call.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.float_tolerance = Some(tolerance);
        self
    }

    /// Match field names case-insensitively.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    fn tolerance(&self) -> f64 {
        self.float_tolerance.unwrap_or(DEFAULT_FLOAT_TOLERANCE)
    }
}

/// Values of one field that differ between the two sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDifference {
    pub source: RowValue,
    pub target: RowValue,
}

/// Field-level result of a detailed row comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowComparison {
    pub is_equal: bool,
    pub matching_fields: Vec<String>,
    pub differing_fields: Vec<String>,
    pub differences: BTreeMap<String, FieldDifference>,
}

/// Compares rows from the source and target datasets.
///
/// Stateless: one instance may be shared freely across threads, and no
/// call mutates shared configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowComparer;

impl RowComparer {
    pub fn new() -> Self {
        RowComparer
    }

    /// Normalize a row for comparison.
    pub fn normalize_row(&self, row: &Row) -> Row {
        row.iter()
            .map(|(field, value)| (field.clone(), normalize_value(value)))
            .collect()
    }

    /// Compare two rows for equality over the fields common to both,
    /// excluding the ignore list.
    pub fn compare_rows(&self, source: &Row, target: &Row, options: &CompareOptions) -> bool {
        let source = self.normalize_row(source);
        let target = self.normalize_row(target);
        let tolerance = options.tolerance();

        for (source_field, target_field) in common_fields(&source, &target, options) {
            let source_value = &source[&source_field];
            let target_value = &target[&target_field];
            if !values_equal(source_value, target_value, tolerance) {
                tracing::debug!(
                    field = %source_field,
                    source = ?source_value,
                    target = ?target_value,
                    "field mismatch"
                );
                return false;
            }
        }
        true
    }

    /// Compare two rows and report matching fields, differing fields, and
    /// the differing values themselves.
    pub fn compare_rows_detailed(
        &self,
        source: &Row,
        target: &Row,
        options: &CompareOptions,
    ) -> RowComparison {
        let source = self.normalize_row(source);
        let target = self.normalize_row(target);
        let tolerance = options.tolerance();

        let mut matching_fields = Vec::new();
        let mut differing_fields = Vec::new();
        let mut differences = BTreeMap::new();

        for (source_field, target_field) in common_fields(&source, &target, options) {
            let source_value = &source[&source_field];
            let target_value = &target[&target_field];
            if values_equal(source_value, target_value, tolerance) {
                matching_fields.push(source_field);
            } else {
                differences.insert(
                    source_field.clone(),
                    FieldDifference {
                        source: source_value.clone(),
                        target: target_value.clone(),
                    },
                );
                differing_fields.push(source_field);
            }
        }

        matching_fields.sort();
        differing_fields.sort();
        RowComparison {
            is_equal: differing_fields.is_empty(),
            matching_fields,
            differing_fields,
            differences,
        }
    }

    /// The fields that differ between two rows, with both values.
    pub fn differing_fields(
        &self,
        source: &Row,
        target: &Row,
        options: &CompareOptions,
    ) -> BTreeMap<String, FieldDifference> {
        self.compare_rows_detailed(source, target, options).differences
    }
}

/// Pair up the field names present in both rows, honoring case
/// sensitivity and the ignore list. Returns (source name, target name)
/// pairs; the names differ only under case-insensitive matching.
fn common_fields(source: &Row, target: &Row, options: &CompareOptions) -> Vec<(String, String)> {
    let ignored: BTreeSet<String> = options
        .ignore_fields
        .iter()
        .map(|field| {
            if options.case_sensitive {
                field.clone()
            } else {
                field.to_lowercase()
            }
        })
        .collect();

    if options.case_sensitive {
        source
            .keys()
            .filter(|field| target.contains_key(*field) && !ignored.contains(*field))
            .map(|field| (field.clone(), field.clone()))
            .collect()
    } else {
        let target_by_lower: BTreeMap<String, &String> = target
            .keys()
            .map(|field| (field.to_lowercase(), field))
            .collect();
        source
            .keys()
            .filter_map(|field| {
                let lower = field.to_lowercase();
                if ignored.contains(&lower) {
                    return None;
                }
                target_by_lower
                    .get(&lower)
                    .map(|target_field| (field.clone(), (*target_field).clone()))
            })
            .collect()
    }
}

fn normalize_value(value: &RowValue) -> RowValue {
    match value {
        RowValue::Decimal(d) => RowValue::Decimal(d.normalize()),
        RowValue::Array(items) => RowValue::Array(items.iter().map(normalize_value).collect()),
        RowValue::Object(map) => RowValue::Object(
            map.iter()
                .map(|(field, value)| (field.clone(), normalize_value(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Equality of two normalized values under the given tolerance.
///
/// Numeric variants (integer, float, decimal) compare by magnitude across
/// representations; a string compares equal to a UUID iff it parses to the
/// same canonical UUID; any other cross-category pairing is unequal, never
/// an error.
pub(crate) fn values_equal(a: &RowValue, b: &RowValue, tolerance: f64) -> bool {
    use RowValue::*;

    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Float(x), Float(y)) => (x - y).abs() < tolerance,
        (Decimal(x), Decimal(y)) => decimal_eq(*x, *y, tolerance),
        (Int(i), Float(f)) | (Float(f), Int(i)) => (*i as f64 - *f).abs() < tolerance,
        (Int(i), Decimal(d)) | (Decimal(d), Int(i)) => {
            decimal_eq(rust_decimal::Decimal::from(*i), *d, tolerance)
        }
        (Float(f), Decimal(d)) | (Decimal(d), Float(f)) => match d.to_f64() {
            Some(value) => (value - *f).abs() < tolerance,
            None => false,
        },
        (Timestamp(x), Timestamp(y)) => x == y,
        (Duration(x), Duration(y)) => x == y,
        (Uuid(x), Uuid(y)) => x == y,
        (String(s), Uuid(u)) | (Uuid(u), String(s)) => {
            uuid::Uuid::parse_str(s).map(|parsed| parsed == *u).unwrap_or(false)
        }
        (Bytes(x), Bytes(y)) => x == y,
        (Array(x), Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(v, w)| values_equal(v, w, tolerance))
        }
        (Object(x), Object(y)) => {
            x.len() == y.len()
                && x.keys().eq(y.keys())
                && x.iter().all(|(k, v)| values_equal(v, &y[k], tolerance))
        }
        _ => false,
    }
}

fn decimal_eq(x: Decimal, y: Decimal, tolerance: f64) -> bool {
    match Decimal::from_f64(tolerance) {
        Some(t) => (x - y).abs() < t,
        None => x.normalize() == y.normalize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;
    use uuid::Uuid;

    fn row(fields: Vec<(&str, RowValue)>) -> Row {
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn test_identical_rows_are_equal() {
        let comparer = RowComparer::new();
        let a = row(vec![
            ("id", RowValue::Int(1)),
            ("name", RowValue::from("alice")),
            ("active", RowValue::Bool(true)),
        ]);
        assert!(comparer.compare_rows(&a, &a.clone(), &CompareOptions::default()));
    }

    #[test]
    fn test_different_values_are_not_equal() {
        let comparer = RowComparer::new();
        let a = row(vec![("id", RowValue::Int(1)), ("name", RowValue::from("alice"))]);
        let b = row(vec![("id", RowValue::Int(1)), ("name", RowValue::from("bob"))]);
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_only_common_fields_are_compared() {
        let comparer = RowComparer::new();
        let a = row(vec![("id", RowValue::Int(1)), ("extra", RowValue::from("x"))]);
        let b = row(vec![("id", RowValue::Int(1))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_null_comparison() {
        let comparer = RowComparer::new();
        let both_null = row(vec![("v", RowValue::Null)]);
        assert!(comparer.compare_rows(&both_null, &both_null.clone(), &CompareOptions::default()));

        let value = row(vec![("v", RowValue::from("x"))]);
        assert!(!comparer.compare_rows(&both_null, &value, &CompareOptions::default()));
    }

    #[test]
    fn test_float_tolerance_is_call_scoped() {
        let comparer = RowComparer::new();
        let a = row(vec![("x", RowValue::Float(1.0))]);
        let b = row(vec![("x", RowValue::Float(1.0009))]);

        let loose = CompareOptions::default().with_tolerance(0.001);
        assert!(comparer.compare_rows(&a, &b, &loose));

        let tight = CompareOptions::default().with_tolerance(0.00001);
        assert!(!comparer.compare_rows(&a, &b, &tight));

        // A later call without an explicit tolerance must use the default,
        // unaffected by the loose tolerance of the earlier call.
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_decimal_precision_normalization() {
        let comparer = RowComparer::new();
        let a = row(vec![("amount", RowValue::Decimal(Decimal::from_str("10.50").unwrap()))]);
        let b = row(vec![("amount", RowValue::Decimal(Decimal::from_str("10.5000").unwrap()))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_decimal_vs_float() {
        let comparer = RowComparer::new();
        let a = row(vec![("amount", RowValue::Decimal(Decimal::from_str("10.5").unwrap()))]);
        let b = row(vec![("amount", RowValue::Float(10.5))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));

        let c = row(vec![("amount", RowValue::Float(10.6))]);
        assert!(!comparer.compare_rows(&a, &c, &CompareOptions::default()));
    }

    #[test]
    fn test_int_vs_float() {
        let comparer = RowComparer::new();
        let a = row(vec![("n", RowValue::Int(1))]);
        let b = row(vec![("n", RowValue::Float(1.0))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_uuid_string_comparison() {
        let comparer = RowComparer::new();
        let uuid = Uuid::from_str("a1b2c3d4-e5f6-7890-abcd-ef1234567890").unwrap();
        let a = row(vec![("id", RowValue::Uuid(uuid))]);
        let b = row(vec![("id", RowValue::from("A1B2C3D4-E5F6-7890-ABCD-EF1234567890"))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));

        let c = row(vec![("id", RowValue::from("not-a-uuid"))]);
        assert!(!comparer.compare_rows(&a, &c, &CompareOptions::default()));
    }

    #[test]
    fn test_string_vs_number_is_unequal_not_error() {
        let comparer = RowComparer::new();
        let a = row(vec![("v", RowValue::from("1"))]);
        let b = row(vec![("v", RowValue::Int(1))]);
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_timestamp_comparison() {
        let comparer = RowComparer::new();
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let a = row(vec![("at", RowValue::Timestamp(ts))]);
        assert!(comparer.compare_rows(&a, &a.clone(), &CompareOptions::default()));

        let later = row(vec![(
            "at",
            RowValue::Timestamp(ts + chrono::Duration::seconds(1)),
        )]);
        assert!(!comparer.compare_rows(&a, &later, &CompareOptions::default()));
    }

    #[test]
    fn test_list_comparison_order_matters() {
        let comparer = RowComparer::new();
        let a = row(vec![(
            "tags",
            RowValue::Array(vec![RowValue::Int(1), RowValue::Int(2)]),
        )]);
        let b = row(vec![(
            "tags",
            RowValue::Array(vec![RowValue::Int(2), RowValue::Int(1)]),
        )]);
        assert!(comparer.compare_rows(&a, &a.clone(), &CompareOptions::default()));
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_list_different_length() {
        let comparer = RowComparer::new();
        let a = row(vec![("tags", RowValue::Array(vec![RowValue::Int(1)]))]);
        let b = row(vec![(
            "tags",
            RowValue::Array(vec![RowValue::Int(1), RowValue::Int(2)]),
        )]);
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_nested_object_comparison() {
        let comparer = RowComparer::new();
        let nested = |city: &str| {
            RowValue::Object(
                [("city".to_string(), RowValue::from(city))]
                    .into_iter()
                    .collect(),
            )
        };
        let a = row(vec![("address", nested("paris"))]);
        let b = row(vec![("address", nested("lyon"))]);
        assert!(comparer.compare_rows(&a, &a.clone(), &CompareOptions::default()));
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_nested_float_uses_tolerance() {
        let comparer = RowComparer::new();
        let a = row(vec![("v", RowValue::Array(vec![RowValue::Float(1.0)]))]);
        let b = row(vec![("v", RowValue::Array(vec![RowValue::Float(1.00001)]))]);
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::default()));
    }

    #[test]
    fn test_ignore_fields() {
        let comparer = RowComparer::new();
        let a = row(vec![
            ("id", RowValue::Int(1)),
            ("updated_at", RowValue::from("2024-01-01")),
        ]);
        let b = row(vec![
            ("id", RowValue::Int(1)),
            ("updated_at", RowValue::from("2024-06-01")),
        ]);
        assert!(!comparer.compare_rows(&a, &b, &CompareOptions::default()));
        assert!(comparer.compare_rows(&a, &b, &CompareOptions::ignoring(["updated_at"])));
    }

    #[test]
    fn test_case_insensitive_field_names() {
        let comparer = RowComparer::new();
        let a = row(vec![("UserId", RowValue::Int(1))]);
        let b = row(vec![("userid", RowValue::Int(1))]);
        let c = row(vec![("userid", RowValue::Int(2))]);

        // Case-sensitive: no common fields, vacuously equal.
        assert!(comparer.compare_rows(&a, &c, &CompareOptions::default()));

        let insensitive = CompareOptions::default().case_insensitive();
        assert!(comparer.compare_rows(&a, &b, &insensitive));
        assert!(!comparer.compare_rows(&a, &c, &insensitive));
    }

    #[test]
    fn test_empty_rows_are_equal() {
        let comparer = RowComparer::new();
        assert!(comparer.compare_rows(&Row::new(), &Row::new(), &CompareOptions::default()));
    }

    #[test]
    fn test_compare_rows_detailed() {
        let comparer = RowComparer::new();
        let a = row(vec![
            ("id", RowValue::Int(1)),
            ("name", RowValue::from("alice")),
            ("age", RowValue::Int(30)),
        ]);
        let b = row(vec![
            ("id", RowValue::Int(1)),
            ("name", RowValue::from("bob")),
            ("age", RowValue::Int(30)),
        ]);

        let comparison = comparer.compare_rows_detailed(&a, &b, &CompareOptions::default());
        assert!(!comparison.is_equal);
        assert_eq!(comparison.matching_fields, vec!["age", "id"]);
        assert_eq!(comparison.differing_fields, vec!["name"]);
        assert_eq!(
            comparison.differences["name"],
            FieldDifference {
                source: RowValue::from("alice"),
                target: RowValue::from("bob"),
            }
        );
    }

    #[test]
    fn test_normalize_row_strips_decimal_zeros() {
        let comparer = RowComparer::new();
        let raw = row(vec![("amount", RowValue::Decimal(Decimal::from_str("1.100").unwrap()))]);
        let normalized = comparer.normalize_row(&raw);
        assert_eq!(
            normalized["amount"],
            RowValue::Decimal(Decimal::from_str("1.1").unwrap())
        );
    }
}

//! Column-level privacy filtering applied to accepted post-images before SQL
//! synthesis.

use serde_json::{Map, Value};

use crate::temporal;

/// Identity and contact columns that never cross regions. These are removed
/// outright and never appear in a synthesized column list.
pub const REMOVED_COLUMNS: [&str; 13] = [
    "username",
    "email",
    "full_name",
    "phone",
    "user_email",
    "user_phone",
    "user_name",
    "creator_name",
    "creator_email",
    "creator_phone",
    "salesperson_name",
    "salesperson_email",
    "salesperson_phone",
];

/// Foreign keys referencing users in the origin region. Kept in the column
/// list so the row shape survives, but always written as NULL.
pub const NULLED_COLUMNS: [&str; 2] = ["created_by_user_id", "salesperson_user_id"];

/// One surviving column with its normalized value.
pub type FilteredColumn = (String, Value);

/// Apply privacy rules and temporal normalization to a post-image.
///
/// Surviving columns come out in alphabetical column-name order (the parsed
/// map's iteration order), so the statement synthesized downstream is stable
/// for a given payload shape.
pub fn filter_after(after: &Map<String, Value>) -> Vec<FilteredColumn> {
    let mut out = Vec::with_capacity(after.len());
    for (column, value) in after {
        if column.starts_with('_') || REMOVED_COLUMNS.contains(&column.as_str()) {
            continue;
        }
        if NULLED_COLUMNS.contains(&column.as_str()) {
            out.push((column.clone(), Value::Null));
            continue;
        }
        out.push((column.clone(), normalize_value(column, value)));
    }
    out
}

fn normalize_value(column: &str, value: &Value) -> Value {
    if let Some(n) = value.as_i64() {
        if temporal::is_instant_column(column) {
            return Value::from(temporal::to_epoch_millis(n));
        }
        if temporal::is_date_column(column) && n < temporal::EPOCH_DAY_BOUND {
            if let Some(iso) = temporal::epoch_day_to_iso(n) {
                return Value::String(iso);
            }
        }
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> Vec<FilteredColumn> {
        filter_after(value.as_object().expect("object payload"))
    }

    fn columns(filtered: &[FilteredColumn]) -> Vec<&str> {
        filtered.iter().map(|(c, _)| c.as_str()).collect()
    }

    #[test]
    fn private_columns_never_survive() {
        let filtered = filter(json!({
            "id": 7,
            "username": "alice",
            "creator_email": "a@example.com",
            "salesperson_phone": "+86 1",
            "stock_quantity": 8
        }));
        assert_eq!(columns(&filtered), vec!["id", "stock_quantity"]);
    }

    #[test]
    fn cross_region_fks_are_nulled_in_place() {
        let filtered = filter(json!({
            "id": 7,
            "created_by_user_id": 42,
            "salesperson_user_id": 9
        }));
        assert_eq!(
            filtered,
            vec![
                ("created_by_user_id".to_string(), Value::Null),
                ("id".to_string(), json!(7)),
                ("salesperson_user_id".to_string(), Value::Null),
            ]
        );
    }

    #[test]
    fn metadata_columns_are_stripped() {
        let filtered = filter(json!({"id": 1, "_sync_origin": "india", "_ts_ms": 1}));
        assert_eq!(columns(&filtered), vec!["id"]);
    }

    #[test]
    fn instant_columns_normalize_to_milliseconds() {
        let filtered = filter(json!({"id": 1, "updated_at": 1_704_067_205_000_000_i64}));
        assert_eq!(filtered[1].1, json!(1_704_067_205_000_i64));
    }

    #[test]
    fn epoch_day_dates_render_iso() {
        let filtered = filter(json!({"id": 9, "sale_date": 19723}));
        assert_eq!(filtered[1].1, json!("2024-01-04"));
    }

    #[test]
    fn large_date_integers_pass_through() {
        // Already a timestamp, not an epoch-day offset.
        let filtered = filter(json!({"id": 9, "sale_date": 1_704_067_200_000_i64}));
        assert_eq!(filtered[1].1, json!(1_704_067_200_000_i64));
    }

    #[test]
    fn ordinary_values_pass_through_untouched() {
        let filtered = filter(json!({
            "id": 7,
            "product_name": "Tea",
            "price": 12.5,
            "is_active": true,
            "description": null
        }));
        assert_eq!(
            filtered,
            vec![
                ("description".to_string(), Value::Null),
                ("id".to_string(), json!(7)),
                ("is_active".to_string(), json!(true)),
                ("price".to_string(), json!(12.5)),
                ("product_name".to_string(), json!("Tea")),
            ]
        );
    }
}

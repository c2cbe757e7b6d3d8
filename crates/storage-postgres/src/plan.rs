//! Parameterized statement synthesis from filtered change columns.
//!
//! Statements use `$n` placeholders for every value; identifiers come only
//! from the static schema whitelist. NULLs are rendered as the SQL literal so
//! parameter types never fight the target column type.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use regionsync_core::privacy::FilteredColumn;
use regionsync_core::temporal;

use crate::schema::TableSchema;

/// Columns a conflict update never touches: the key, the recorded origin,
/// and `updated_at`, which is set to server time instead.
const UPDATE_FROZEN_COLUMNS: [&str; 3] = ["id", "sync_source", "updated_at"];

/// A typed parameter value ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    BigInt(i64),
    Double(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl SqlValue {
    /// Convert a normalized payload value for `column`.
    ///
    /// Event-time integers become timestamps, ISO strings in date columns
    /// become dates, compound values are stored serialized.
    pub fn from_column_value(column: &str, value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if temporal::is_instant_column(column) {
                        return match DateTime::from_timestamp_millis(i) {
                            Some(ts) => SqlValue::Timestamp(ts),
                            None => SqlValue::BigInt(i),
                        };
                    }
                    SqlValue::BigInt(i)
                } else {
                    SqlValue::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => {
                if temporal::is_date_column(column) {
                    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                        return SqlValue::Date(date);
                    }
                }
                SqlValue::Text(s.clone())
            }
            Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }

    /// Convert a primary-key scalar.
    pub fn from_key(value: &Value) -> SqlValue {
        SqlValue::from_column_value("id", value)
    }
}

/// One synthesized statement with its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Result of planning an UPSERT.
#[derive(Debug)]
pub struct UpsertPlan {
    pub statement: SqlStatement,
    /// Payload columns absent from the local schema, dropped at plan time.
    pub dropped_columns: Vec<String>,
}

/// Synthesize `INSERT … ON CONFLICT (id) DO UPDATE` for the filtered columns.
///
/// The conflict update covers the inserted columns minus the frozen set and
/// stamps `updated_at` with the server clock. The key column is injected
/// when the post-image does not carry it.
pub fn build_upsert(
    schema: &TableSchema,
    primary_key: &Value,
    filtered: &[FilteredColumn],
) -> UpsertPlan {
    let mut fields: Vec<(&str, SqlValue)> = Vec::with_capacity(filtered.len() + 1);
    let mut dropped_columns = Vec::new();

    if !filtered.iter().any(|(column, _)| column == "id") {
        fields.push(("id", SqlValue::from_key(primary_key)));
    }
    for (column, value) in filtered {
        if !schema.has_column(column) {
            dropped_columns.push(column.clone());
            continue;
        }
        fields.push((column.as_str(), SqlValue::from_column_value(column, value)));
    }

    let mut params = Vec::new();
    let mut placeholders = Vec::with_capacity(fields.len());
    for (_, value) in &fields {
        if *value == SqlValue::Null {
            placeholders.push("NULL".to_string());
        } else {
            params.push(value.clone());
            placeholders.push(format!("${}", params.len()));
        }
    }

    let columns = fields
        .iter()
        .map(|(column, _)| *column)
        .collect::<Vec<_>>()
        .join(", ");
    let mut updates = fields
        .iter()
        .map(|(column, _)| *column)
        .filter(|column| !UPDATE_FROZEN_COLUMNS.contains(column))
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>();
    updates.push("updated_at = NOW()".to_string());

    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({}) ON CONFLICT (id) DO UPDATE SET {}",
        schema.name(),
        placeholders.join(", "),
        updates.join(", "),
    );

    UpsertPlan {
        statement: SqlStatement { sql, params },
        dropped_columns,
    }
}

/// Synthesize a delete addressing the row by primary key.
pub fn build_delete(schema: &TableSchema, primary_key: &Value) -> SqlStatement {
    SqlStatement {
        sql: format!("DELETE FROM {} WHERE id = $1", schema.name()),
        params: vec![SqlValue::from_key(primary_key)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionsync_core::privacy::filter_after;
    use regionsync_core::SyncTable;
    use serde_json::json;

    use crate::schema::schema_for;

    fn products() -> &'static TableSchema {
        schema_for(SyncTable::Products).unwrap()
    }

    fn sales() -> &'static TableSchema {
        schema_for(SyncTable::Sales).unwrap()
    }

    #[test]
    fn upsert_strips_private_columns_and_nulls_foreign_keys() {
        // Post-image as decoded from a peer stock update.
        let after = json!({
            "id": 7,
            "stock_quantity": 8,
            "updated_at": 1_704_067_205_000_000_i64,
            "version": 2,
            "created_by_user_id": 42,
            "username": "alice"
        });
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(products(), &json!(7), &filtered);
        let sql = &plan.statement.sql;

        assert_eq!(
            sql,
            "INSERT INTO products (created_by_user_id, id, stock_quantity, updated_at, version) \
             VALUES (NULL, $1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
             created_by_user_id = EXCLUDED.created_by_user_id, \
             stock_quantity = EXCLUDED.stock_quantity, version = EXCLUDED.version, \
             updated_at = NOW()"
        );
        assert!(!sql.contains("username"));
        assert_eq!(
            plan.statement.params,
            vec![
                SqlValue::BigInt(7),
                SqlValue::BigInt(8),
                SqlValue::Timestamp(DateTime::from_timestamp_millis(1_704_067_205_000).unwrap()),
                SqlValue::BigInt(2),
            ]
        );
        assert!(plan.dropped_columns.is_empty());
    }

    #[test]
    fn unknown_payload_columns_are_dropped_not_fatal() {
        let after = json!({"id": 1, "warehouse_shelf": "B2"});
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(products(), &json!(1), &filtered);

        assert_eq!(plan.dropped_columns, vec!["warehouse_shelf".to_string()]);
        assert!(!plan.statement.sql.contains("warehouse_shelf"));
    }

    #[test]
    fn key_column_is_injected_when_absent_from_the_image() {
        let after = json!({"stock_quantity": 3});
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(products(), &json!(11), &filtered);

        assert!(plan.statement.sql.starts_with("INSERT INTO products (id, stock_quantity)"));
        assert_eq!(plan.statement.params[0], SqlValue::BigInt(11));
    }

    #[test]
    fn sync_source_survives_insert_but_not_update() {
        let after = json!({"id": 5, "sync_source": "india", "category": "tea"});
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(products(), &json!(5), &filtered);
        let sql = &plan.statement.sql;

        assert!(sql.contains("INSERT INTO products (category, id, sync_source)"));
        assert!(sql.contains("category = EXCLUDED.category"));
        assert!(!sql.contains("sync_source = EXCLUDED.sync_source"));
        assert!(sql.ends_with("updated_at = NOW()"));
    }

    #[test]
    fn sale_dates_bind_as_dates() {
        let after = json!({"id": 9, "sale_date": 19723, "quantity": 2});
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(sales(), &json!(9), &filtered);

        let date = NaiveDate::parse_from_str("2024-01-04", "%Y-%m-%d").unwrap();
        assert!(plan.statement.params.contains(&SqlValue::Date(date)));
    }

    #[test]
    fn delete_addresses_by_key_only() {
        let stmt = build_delete(sales(), &json!("s-9"));
        assert_eq!(stmt.sql, "DELETE FROM sales WHERE id = $1");
        assert_eq!(stmt.params, vec![SqlValue::Text("s-9".to_string())]);
    }

    #[test]
    fn boolean_and_float_values_bind_natively() {
        let after = json!({"id": 2, "price": 12.5, "description": "x"});
        let filtered = filter_after(after.as_object().unwrap());
        let plan = build_upsert(products(), &json!(2), &filtered);
        assert!(plan.statement.params.contains(&SqlValue::Double(12.5)));
    }
}

//! Decoding of raw bus messages into normalized change records.

use serde_json::{Map, Value};

use crate::regions::Region;
use crate::tables::SyncTable;
use crate::temporal;

/// Row-level operation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl ChangeOp {
    /// Parse the single-letter wire code used by the CDC producer.
    pub fn from_wire(code: &str) -> Option<Self> {
        match code {
            "c" => Some(ChangeOp::Create),
            "u" => Some(ChangeOp::Update),
            "d" => Some(ChangeOp::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

/// Normalized change record produced by the decoder.
#[derive(Debug, Clone)]
pub struct Change {
    pub table: SyncTable,
    pub primary_key: Value,
    pub op: ChangeOp,
    pub after: Option<Map<String, Value>>,
    pub sync_origin: Region,
    /// Event time in ms, from `after.updated_at` (else `created_at`).
    pub source_timestamp_ms: Option<i64>,
}

/// Why the decoder set a message aside instead of producing a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSkip {
    Tombstone,
    MalformedJson,
    UnknownTable,
    UnknownOp,
    MissingOrigin,
    MissingId,
}

impl DecodeSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeSkip::Tombstone => "tombstone",
            DecodeSkip::MalformedJson => "malformed_json",
            DecodeSkip::UnknownTable => "unknown_table",
            DecodeSkip::UnknownOp => "unknown_op",
            DecodeSkip::MissingOrigin => "missing_sync_origin",
            DecodeSkip::MissingId => "missing_id",
        }
    }
}

/// Decode outcome: either a normalized change or a deliberate skip.
#[derive(Debug)]
pub enum Decoded {
    Change(Change),
    Skip(DecodeSkip),
}

/// Decode one raw bus message into a [`Decoded`] variant.
///
/// Accepts both envelope layouts the producer emits: wrapped
/// (`{"payload": {"op", "after", "_sync_origin"}}`) and flat. Each field is
/// read from the wrapper when present, falling back to the top level.
pub fn decode_message(topic: &str, key: Option<&[u8]>, value: Option<&[u8]>) -> Decoded {
    let table = match SyncTable::from_topic(topic) {
        Some(table) => table,
        None => return Decoded::Skip(DecodeSkip::UnknownTable),
    };

    let raw = match value {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Decoded::Skip(DecodeSkip::Tombstone),
    };
    let parsed: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(_) => return Decoded::Skip(DecodeSkip::MalformedJson),
    };
    let root = match parsed.as_object() {
        Some(object) => object,
        None => return Decoded::Skip(DecodeSkip::MalformedJson),
    };
    let payload = root.get("payload").and_then(Value::as_object);
    let field = |name: &str| payload.and_then(|p| p.get(name)).or_else(|| root.get(name));

    let op = match field("op").and_then(Value::as_str).and_then(ChangeOp::from_wire) {
        Some(op) => op,
        None => return Decoded::Skip(DecodeSkip::UnknownOp),
    };

    // Loop-origin must be explicit; a message without it cannot be trusted.
    let sync_origin = match field("_sync_origin").and_then(Value::as_str) {
        Some(tag) => Region::new(tag),
        None => return Decoded::Skip(DecodeSkip::MissingOrigin),
    };

    let after = field("after").and_then(Value::as_object).cloned();

    // Non-deletes must carry a post-image with the row in it.
    if op != ChangeOp::Delete && after.as_ref().map_or(true, |a| a.is_empty()) {
        return Decoded::Skip(DecodeSkip::MissingId);
    }

    let key_value: Option<Value> = key.and_then(|bytes| serde_json::from_slice(bytes).ok());
    let key_id = key_value.as_ref().and_then(|k| k.get("id")).cloned();
    let primary_key = match key_id
        .filter(|id| !id.is_null())
        .or_else(|| after.as_ref().and_then(|a| a.get("id")).cloned())
    {
        Some(id) if !id.is_null() => id,
        _ => return Decoded::Skip(DecodeSkip::MissingId),
    };

    let source_timestamp_ms = after
        .as_ref()
        .and_then(|a| a.get("updated_at").or_else(|| a.get("created_at")))
        .and_then(Value::as_i64)
        .map(temporal::to_epoch_millis);

    Decoded::Change(Change {
        table,
        primary_key,
        op,
        after,
        sync_origin,
        source_timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(topic: &str, key: Option<&str>, value: Option<&str>) -> Decoded {
        decode_message(topic, key.map(str::as_bytes), value.map(str::as_bytes))
    }

    fn expect_change(decoded: Decoded) -> Change {
        match decoded {
            Decoded::Change(change) => change,
            Decoded::Skip(reason) => panic!("expected change, got skip {:?}", reason),
        }
    }

    fn expect_skip(decoded: Decoded) -> DecodeSkip {
        match decoded {
            Decoded::Skip(reason) => reason,
            Decoded::Change(change) => panic!("expected skip, got {:?}", change),
        }
    }

    #[test]
    fn decodes_wrapped_envelope() {
        let value = json!({
            "payload": {
                "op": "u",
                "after": {"id": 7, "stock_quantity": 8, "updated_at": 1_704_067_205_000_000_i64},
                "_sync_origin": "india"
            }
        })
        .to_string();
        let change = expect_change(decode(
            "sync.products",
            Some(r#"{"id": 7}"#),
            Some(&value),
        ));

        assert_eq!(change.table, SyncTable::Products);
        assert_eq!(change.op, ChangeOp::Update);
        assert_eq!(change.primary_key, json!(7));
        assert_eq!(change.sync_origin, Region::new("india"));
        assert_eq!(change.source_timestamp_ms, Some(1_704_067_205_000));
    }

    #[test]
    fn decodes_flat_envelope() {
        let value = json!({
            "op": "c",
            "after": {"id": "s-1", "total_amount": 12.5, "created_at": 1_700_000_000_000_000_i64},
            "_sync_origin": "india"
        })
        .to_string();
        let change = expect_change(decode("sync.sales", None, Some(&value)));

        assert_eq!(change.op, ChangeOp::Create);
        assert_eq!(change.primary_key, json!("s-1"));
        assert_eq!(change.source_timestamp_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn key_id_is_preferred_over_after_id() {
        let value = json!({"op": "u", "after": {"id": 2}, "_sync_origin": "india"}).to_string();
        let change = expect_change(decode("sync.products", Some(r#"{"id": 1}"#), Some(&value)));
        assert_eq!(change.primary_key, json!(1));
    }

    #[test]
    fn missing_value_is_a_tombstone() {
        assert_eq!(
            expect_skip(decode("sync.products", Some(r#"{"id": 1}"#), None)),
            DecodeSkip::Tombstone
        );
        assert_eq!(
            expect_skip(decode("sync.products", None, Some(""))),
            DecodeSkip::Tombstone
        );
    }

    #[test]
    fn malformed_json_is_skipped() {
        assert_eq!(
            expect_skip(decode("sync.products", None, Some("{not json"))),
            DecodeSkip::MalformedJson
        );
        assert_eq!(
            expect_skip(decode("sync.products", None, Some("42"))),
            DecodeSkip::MalformedJson
        );
    }

    #[test]
    fn unknown_table_is_skipped() {
        let value = json!({"op": "u", "after": {"id": 1}, "_sync_origin": "india"}).to_string();
        assert_eq!(
            expect_skip(decode("sync.orders", None, Some(&value))),
            DecodeSkip::UnknownTable
        );
    }

    #[test]
    fn missing_origin_is_skipped() {
        let value = json!({"op": "u", "after": {"id": 1}}).to_string();
        assert_eq!(
            expect_skip(decode("sync.products", None, Some(&value))),
            DecodeSkip::MissingOrigin
        );
    }

    #[test]
    fn create_with_empty_after_is_skipped() {
        let value = json!({"op": "c", "after": {}, "_sync_origin": "india"}).to_string();
        assert_eq!(
            expect_skip(decode("sync.products", None, Some(&value))),
            DecodeSkip::MissingId
        );
        // A keyed update without a post-image has nothing to write either.
        let value = json!({"op": "u", "_sync_origin": "india"}).to_string();
        assert_eq!(
            expect_skip(decode("sync.products", Some(r#"{"id": 3}"#), Some(&value))),
            DecodeSkip::MissingId
        );
    }

    #[test]
    fn delete_addresses_row_through_the_key() {
        let value = json!({"payload": {"op": "d", "_sync_origin": "india"}}).to_string();
        let change = expect_change(decode("sync.products", Some(r#"{"id": 7}"#), Some(&value)));
        assert_eq!(change.op, ChangeOp::Delete);
        assert!(change.after.is_none());
        assert_eq!(change.source_timestamp_ms, None);
    }

    #[test]
    fn delete_without_key_id_is_skipped() {
        let value = json!({"op": "d", "_sync_origin": "india"}).to_string();
        assert_eq!(
            expect_skip(decode("sync.products", None, Some(&value))),
            DecodeSkip::MissingId
        );
    }

    #[test]
    fn unknown_op_code_is_skipped() {
        let value = json!({"op": "r", "after": {"id": 1}, "_sync_origin": "india"}).to_string();
        assert_eq!(
            expect_skip(decode("sync.products", None, Some(&value))),
            DecodeSkip::UnknownOp
        );
    }
}

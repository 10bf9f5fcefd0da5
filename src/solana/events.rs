use serde_json::Value;

/// Turns an `accountChanged` payload into an account list.
///
/// A key becomes a one-element list and `null` an empty one. Bindings may
/// also hand over the `PublicKey` object serialized as `{ "publicKey": .. }`.
pub fn parse_account_changed(payload: &Value) -> Option<Vec<String>> {
    match payload {
        Value::Null => Some(Vec::new()),
        Value::String(key) if key.is_empty() => Some(Vec::new()),
        Value::String(key) => Some(vec![key.clone()]),
        Value::Object(fields) => fields.get("publicKey").and_then(parse_account_changed),
        _ => None,
    }
}

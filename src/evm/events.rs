use serde_json::Value;

/// Reads an `accountsChanged` / `eth_accounts` payload.
///
/// Entries keep provider order. Anything but an array of strings is rejected.
pub fn parse_accounts(payload: &Value) -> Result<Vec<String>, String> {
    let entries = payload
        .as_array()
        .ok_or_else(|| format!("expected an account list, got {payload}"))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("expected an account string, got {entry}"))
        })
        .collect()
}

/// Reads a `net_version` result, which providers return as a decimal string
/// (some older ones as a number).
pub fn parse_net_version(payload: &Value) -> Option<String> {
    match payload {
        Value::String(version) if !version.is_empty() => Some(version.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Normalizes a `chainChanged` payload to the decimal form `net_version` uses.
///
/// `"0x89"` becomes `"137"`. Strings that are not hex quantities pass through
/// unchanged.
pub fn normalize_chain_id(payload: &Value) -> Option<String> {
    match payload {
        Value::String(raw) => {
            let decimal = raw
                .strip_prefix("0x")
                .or_else(|| raw.strip_prefix("0X"))
                .and_then(|digits| u64::from_str_radix(digits, 16).ok())
                .map(|id| id.to_string());
            Some(decimal.unwrap_or_else(|| raw.clone()))
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Hex-encodes a UTF-8 message the way `personal_sign` expects it.
pub fn encode_personal_message(message: &str) -> String {
    format!("0x{}", hex::encode(message.as_bytes()))
}

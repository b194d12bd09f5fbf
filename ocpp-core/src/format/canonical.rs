//! Deterministic JSON used as the input of message signatures.
//!
//! Object members are written in lexicographic key order at every depth and
//! without whitespace, independent of how the `Value` was built. The
//! top-level `signatures` member is never part of the signed bytes.

use serde_json::{Map, Value};

use crate::v21::types::Signature;

pub const SIGNATURES_KEY: &str = "signatures";

pub fn to_canonical_bytes(payload: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    match payload {
        Value::Object(map) => write_object(map, true, &mut out),
        other => write_value(other, &mut out),
    }
    out
}

pub fn canonicalize<T: serde::Serialize>(payload: &T) -> Result<Vec<u8>, serde_json::Error> {
    Ok(to_canonical_bytes(&serde_json::to_value(payload)?))
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map, false, out),
    }
}

fn write_object(map: &Map<String, Value>, skip_signatures: bool, out: &mut Vec<u8>) {
    let mut keys: Vec<&String> = map
        .keys()
        .filter(|k| !(skip_signatures && k.as_str() == SIGNATURES_KEY))
        .collect();
    keys.sort();
    out.push(b'{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_string(key, out);
        out.push(b':');
        write_value(&map[key.as_str()], out);
    }
    out.push(b'}');
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    // a string always serializes, the escaping is serde_json's
    out.extend_from_slice(Value::String(s.to_string()).to_string().as_bytes());
}

/// Detaches the wire `signatures` member from a payload.
///
/// Entries that do not parse as a signature are kept as `None` so a
/// verifier can reject them instead of silently ignoring them. An explicit
/// `null` means unsigned.
pub fn split_signatures(payload: &mut Value) -> Vec<Option<Signature>> {
    let raw = match payload.as_object_mut().and_then(|m| m.remove(SIGNATURES_KEY)) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Vec::new(),
        Some(_) => return vec![None],
    };
    raw.into_iter()
        .map(|item| serde_json::from_value::<Signature>(item).ok())
        .collect()
}

pub fn attach_signatures(payload: &mut Value, signatures: &[Signature]) {
    if let Some(map) = payload.as_object_mut() {
        if signatures.is_empty() {
            map.remove(SIGNATURES_KEY);
        } else {
            let list = signatures
                .iter()
                .filter_map(|s| serde_json::to_value(s).ok())
                .collect();
            map.insert(SIGNATURES_KEY.to_string(), Value::Array(list));
        }
    }
}

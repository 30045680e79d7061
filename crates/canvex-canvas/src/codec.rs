//! Batch codec: operation sequences to JSON payloads and back.
//!
//! A payload is a JSON array of `{ "isProperty", "methodName", "args" }`
//! entries. Decoding is all-or-nothing: the first malformed entry fails the
//! whole batch with its index, so a half-applied frame never reaches the
//! surface. Decoded batches are memoized by SHA-256 of the payload.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use canvex_core::error::{CanvexError, Result};
use canvex_core::protocol::{Handle, HandleId, Method, Operation, Property, Value, WireOperation};

type PayloadDigest = [u8; 32];

#[derive(Debug)]
struct DecodeMemo {
    capacity: usize,
    order: VecDeque<PayloadDigest>,
    entries: HashMap<PayloadDigest, Arc<[Operation]>>,
}

impl DecodeMemo {
    fn get(&self, digest: &PayloadDigest) -> Option<Arc<[Operation]>> {
        self.entries.get(digest).cloned()
    }

    fn insert(&mut self, digest: PayloadDigest, ops: Arc<[Operation]>) {
        if self.capacity == 0 || self.entries.contains_key(&digest) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(digest);
        self.entries.insert(digest, ops);
    }
}

#[derive(Debug)]
pub struct BatchCodec {
    memo: Mutex<DecodeMemo>,
}

impl Default for BatchCodec {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BatchCodec {
    /// `cache_capacity` of 0 disables decode memoization.
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            memo: Mutex::new(DecodeMemo {
                capacity: cache_capacity,
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Encode a batch. An entry that cannot be represented fails the whole
    /// batch, the same way decoding does.
    pub fn encode(&self, ops: &[Operation]) -> Result<String> {
        let wire = ops
            .iter()
            .enumerate()
            .map(|(index, op)| {
                op.to_wire().map_err(|e| CanvexError::Codec {
                    index,
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<WireOperation>>>()?;
        Ok(serde_json::to_string(&wire)?)
    }

    pub fn decode(&self, payload: &str) -> Result<Arc<[Operation]>> {
        let digest: PayloadDigest = Sha256::digest(payload.as_bytes()).into();

        if let Some(hit) = self.memo.lock().unwrap_or_else(|e| e.into_inner()).get(&digest) {
            debug!(operations = hit.len(), "Batch decode served from memo");
            return Ok(hit);
        }

        let ops: Arc<[Operation]> = decode_entries(payload)?.into();
        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(digest, ops.clone());
        Ok(ops)
    }

    /// Number of memoized batches.
    pub fn cached(&self) -> usize {
        self.memo.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }
}

fn decode_entries(payload: &str) -> Result<Vec<Operation>> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(payload).map_err(|e| CanvexError::Codec {
            index: 0,
            message: format!("payload is not a JSON array: {e}"),
        })?;

    let mut ops = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(entry) {
            Ok(op) => ops.push(op),
            Err(message) => {
                warn!(index, %message, "Rejecting malformed batch");
                return Err(CanvexError::Codec { index, message });
            }
        }
    }
    Ok(ops)
}

fn decode_entry(entry: serde_json::Value) -> std::result::Result<Operation, String> {
    let wire: WireOperation = serde_json::from_value(entry).map_err(|e| e.to_string())?;

    if wire.is_property {
        let property = Property::from_name(&wire.method_name)
            .ok_or_else(|| format!("unknown property '{}'", wire.method_name))?;
        let value = unwrap_property_value(wire.args)?;
        return Ok(Operation::Set { property, value });
    }

    let method = Method::from_name(&wire.method_name)
        .ok_or_else(|| format!("unknown method '{}'", wire.method_name))?;
    let args = match wire.args {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(_) => {
            serde_json::from_value(wire.args).map_err(|e| format!("{method}: {e}"))?
        }
        other => return Err(format!("{method}: args must be an array, got {other}")),
    };
    Ok(Operation::Call { method, args })
}

/// Property values may arrive as `{ "value": x }`, `{ "result": x }` or
/// `{ "id": n }`; reduce them to a primitive or handle.
fn unwrap_property_value(raw: serde_json::Value) -> std::result::Result<Value, String> {
    let serde_json::Value::Object(mut map) = raw else {
        return serde_json::from_value(raw).map_err(|e| e.to_string());
    };

    if map.contains_key("isElementRef") {
        let handle: Handle =
            serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| e.to_string())?;
        return Ok(Value::Handle(handle));
    }
    if let Some(inner) = map.remove("value").or_else(|| map.remove("result")) {
        return unwrap_property_value(inner);
    }
    if let Some(id) = map.get("id") {
        let id = id
            .as_u64()
            .and_then(|n| HandleId::try_from(n).ok())
            .ok_or_else(|| format!("invalid handle id {id}"))?;
        return Ok(Value::Handle(Handle::composite(id)));
    }
    Err("unrecognized property value wrapper".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Operation> {
        vec![
            Operation::call(Method::FillRect, vec![0.into(), 0.into(), 10.into(), 10.into()]),
            Operation::set(Property::FillStyle, "red"),
            Operation::call(
                Method::SetLineDash,
                vec![Value::Array(vec![4.into(), 2.into()])],
            ),
            Operation::set(Property::ImageSmoothingEnabled, false),
            Operation::call(
                Method::DrawImage,
                vec![Value::Handle(Handle::element(3)), 5.5.into(), 6.into()],
            ),
            Operation::call(Method::BeginPath, vec![]),
        ]
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = BatchCodec::default();
        let ops = sample();
        let payload = codec.encode(&ops).unwrap();
        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(&decoded[..], &ops[..]);
    }

    #[test]
    fn test_encoded_shape() {
        let codec = BatchCodec::default();
        let payload = codec
            .encode(&[Operation::set(Property::Font, "12px serif")])
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"isProperty": true, "methodName": "font", "args": "12px serif"}])
        );
    }

    #[test]
    fn test_decode_unwraps_property_wrappers() {
        let codec = BatchCodec::new(0);
        let payload = r#"[
            {"isProperty": true, "methodName": "lineWidth", "args": {"value": 4}},
            {"isProperty": true, "methodName": "fillStyle", "args": {"id": 9}},
            {"isProperty": true, "methodName": "font", "args": {"result": {"value": "bold 9px mono"}}}
        ]"#;
        let ops = codec.decode(payload).unwrap();
        assert_eq!(ops[0], Operation::set(Property::LineWidth, 4.0));
        assert_eq!(ops[1], Operation::set(Property::FillStyle, Handle::composite(9)));
        assert_eq!(ops[2], Operation::set(Property::Font, "bold 9px mono"));
    }

    #[test]
    fn test_decode_aborts_on_malformed_entry() {
        let codec = BatchCodec::default();
        let payload = r#"[
            {"isProperty": false, "methodName": "beginPath", "args": []},
            {"isProperty": false, "methodName": "teleport", "args": []},
            {"isProperty": false, "methodName": "stroke", "args": []}
        ]"#;
        match codec.decode(payload) {
            Err(CanvexError::Codec { index, message }) => {
                assert_eq!(index, 1);
                assert!(message.contains("teleport"));
            }
            other => panic!("expected codec error, got {other:?}"),
        }
        assert_eq!(codec.cached(), 0);
    }

    #[test]
    fn test_encode_rejects_non_finite_numbers() {
        let codec = BatchCodec::default();
        let ops = vec![
            Operation::call(Method::Save, vec![]),
            Operation::call(Method::Rotate, vec![f64::INFINITY.into()]),
        ];
        match codec.encode(&ops) {
            Err(CanvexError::Codec { index, message }) => {
                assert_eq!(index, 1);
                assert!(message.contains("rotate"), "{message}");
            }
            other => panic!("expected codec error, got {other:?}"),
        }

        let nan_alpha = [Operation::set(Property::GlobalAlpha, f64::NAN)];
        assert!(codec.encode(&nan_alpha).is_err());
    }

    #[test]
    fn test_decode_rejects_non_array_payload() {
        let codec = BatchCodec::default();
        assert!(matches!(
            codec.decode(r#"{"methodName": "fill"}"#),
            Err(CanvexError::Codec { index: 0, .. })
        ));
    }

    #[test]
    fn test_decode_memo_returns_same_batch() {
        let codec = BatchCodec::new(2);
        let payload = codec.encode(&sample()).unwrap();
        let first = codec.decode(&payload).unwrap();
        let second = codec.decode(&payload).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_decode_memo_is_bounded() {
        let codec = BatchCodec::new(2);
        for n in 0..5 {
            let payload = codec
                .encode(&[Operation::set(Property::LineWidth, n)])
                .unwrap();
            codec.decode(&payload).unwrap();
        }
        assert_eq!(codec.cached(), 2);
    }

    #[test]
    fn test_memo_disabled() {
        let codec = BatchCodec::new(0);
        let payload = codec.encode(&sample()).unwrap();
        let first = codec.decode(&payload).unwrap();
        let second = codec.decode(&payload).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(codec.cached(), 0);
    }
}

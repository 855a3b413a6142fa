use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("canonical encoding expects a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// Encode a record as canonical JSON: object keys sorted at every level,
/// compact separators, serde_json's textual form for scalars.
///
/// The output depends only on the record's logical key/value content, so two
/// records built in a different field or insertion order encode identically.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(record)?;
    canonical_value_bytes(&value)
}

pub fn canonical_value_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    if !value.is_object() {
        return Err(CanonicalError::NotAnObject {
            kind: kind_of(value),
        });
    }
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            // Map iteration order depends on serde_json's `preserve_order` feature.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

use crate::utils::error::Result;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

/// Serializes a `Value` with object keys in byte order at every level,
/// independent of how the underlying map orders its entries.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

/// Pretty-printed, key-sorted JSON with a trailing newline.
pub fn to_canonical_bytes(value: &Value, indent: usize) -> Result<Vec<u8>> {
    let indent_bytes = vec![b' '; indent];
    let formatter = PrettyFormatter::with_indent(&indent_bytes);
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    Canonical(value).serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "m": [{"y": 1, "x": 2}]}});
        let text = String::from_utf8(to_canonical_bytes(&value, 2).unwrap()).unwrap();
        let a = text.find("\"a\"").unwrap();
        let b = text.find("\"b\"").unwrap();
        assert!(a < b);
        assert!(text.find("\"m\"").unwrap() < text.find("\"z\"").unwrap());
        assert!(text.find("\"x\"").unwrap() < text.find("\"y\"").unwrap());
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_indent_width() {
        let value = json!({"a": 1});
        let text = String::from_utf8(to_canonical_bytes(&value, 4).unwrap()).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}\n");
    }
}

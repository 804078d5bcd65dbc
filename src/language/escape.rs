use serde::Serialize;

use crate::error::Result;

/// Encode `value` as a quoted string literal holding its JSON text.
///
/// The result is a double-quoted literal using only JSON string escapes, which
/// Python and JavaScript read identically. It never contains a raw newline or
/// an unescaped quote, so it can be spliced directly into generated source;
/// passing it to `json.loads` / `JSON.parse` rebuilds the value.
pub fn escape_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let document = serde_json::to_string(value)?;
    Ok(serde_json::to_string(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptletError;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn decode(literal: &str) -> Value {
        let document: String = serde_json::from_str(literal).unwrap();
        serde_json::from_str(&document).unwrap()
    }

    fn assert_splice_safe(literal: &str) {
        assert!(literal.len() >= 2);
        assert!(literal.starts_with('"') && literal.ends_with('"'));
        assert!(!literal.contains('\n') && !literal.contains('\r'));

        let inner = &literal[1..literal.len() - 1];
        let mut escaped = false;
        for c in inner.chars() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                assert_ne!(c, '"', "unescaped quote in {literal}");
            }
        }
        assert!(!escaped, "dangling backslash in {literal}");
    }

    #[test]
    fn test_round_trip() {
        let values = [
            Value::Null,
            json!(true),
            json!(-12.5),
            json!("plain"),
            json!([]),
            json!({}),
            json!({"nested": {"list": [1, "two", null, {"three": 3.0}]}}),
            json!(["\"\"\"", "'''", "\\", "line\nbreak", "tab\tend", "\u{0}"]),
            json!({"</script>": "`${x}`", "é": "日本語", "emoji": "🦀"}),
        ];

        for value in values {
            let literal = escape_json(&value).unwrap();
            assert_splice_safe(&literal);
            assert_eq!(decode(&literal), value);
        }
    }

    #[test]
    fn test_null_literal() {
        assert_eq!(escape_json(&Value::Null).unwrap(), r#""null""#);
        assert_eq!(escape_json(&json!({"a": 1})).unwrap(), r#""{\"a\":1}""#);
    }

    #[test]
    fn test_injection_attempt_stays_data() {
        let value = json!("\"); import os; os.system(\"id\"); (\"");
        let literal = escape_json(&value).unwrap();
        assert_splice_safe(&literal);
        assert_eq!(decode(&literal), value);
    }

    #[test]
    fn test_non_representable_value() {
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "tuple keys");

        let err = escape_json(&map).unwrap_err();
        assert!(matches!(err, ScriptletError::Serialization(_)));
    }
}

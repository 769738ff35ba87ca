//! Bottom-up removal of empty values from JSON trees.

use serde_json::{Map, Value};

/// Strip empty values from a JSON tree. Empty means null, `""`, `[]`, or
/// `{}`; the predicate is applied bottom-up, so a container whose children
/// all clean away is itself dropped. Returns `None` when nothing is left.
/// Zero and `false` are values, not emptiness.
pub fn clean_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.iter().filter_map(clean_value).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Array(cleaned))
            }
        }
        Value::Object(fields) => {
            let cleaned: Map<String, Value> = fields
                .iter()
                .filter_map(|(k, v)| clean_value(v).map(|v| (k.clone(), v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_survive() {
        assert_eq!(clean_value(&json!(0)), Some(json!(0)));
        assert_eq!(clean_value(&json!(false)), Some(json!(false)));
        assert_eq!(clean_value(&json!("x")), Some(json!("x")));
    }

    #[test]
    fn empties_are_dropped() {
        assert_eq!(clean_value(&Value::Null), None);
        assert_eq!(clean_value(&json!("")), None);
        assert_eq!(clean_value(&json!([])), None);
        assert_eq!(clean_value(&json!({})), None);
    }

    #[test]
    fn emptiness_cascades_upward() {
        let v = json!({"a": {"b": [null, "", {}]}, "c": []});
        assert_eq!(clean_value(&v), None);
    }

    #[test]
    fn mixed_trees_keep_only_the_living() {
        let v = json!({
            "uuid": "abc",
            "date": null,
            "meta": {"info": "", "count": 0},
            "tags": ["x", "", null],
        });
        assert_eq!(
            clean_value(&v),
            Some(json!({"uuid": "abc", "meta": {"count": 0}, "tags": ["x"]}))
        );
    }
}

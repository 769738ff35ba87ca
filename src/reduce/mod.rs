//! Keep-list reduction of raw feed events.
//!
//! A raw event is an arbitrarily nested export; reduction keeps a fixed set
//! of analyst-relevant fields, masks digest values, truncates blob values,
//! and drops everything else. The transformation is a pure function of the
//! input document and the reduce options.

mod clean;
mod dataset;
mod value;

pub use clean::clean_value;
pub use dataset::{reduce_directory, ReduceRecord, ReduceSummary};
pub use value::normalize_value;

use crate::config::ReduceConfig;
use serde_json::{json, Map, Value};

/// Event-level scalar keys that survive reduction.
const EVENT_KEYS: [&str; 6] = [
    "date",
    "info",
    "publish_timestamp",
    "threat_level_id",
    "timestamp",
    "published",
];

/// Base attribute keys; `to_ids` joins the list when configured.
const ATTRIBUTE_KEYS: [&str; 5] = ["category", "comment", "timestamp", "type", "value"];
const TO_IDS_KEY: &str = "to_ids";

/// Object-level scalar keys.
const OBJECT_KEYS: [&str; 5] = ["comment", "description", "meta-category", "name", "timestamp"];

const PUBLISH_KEY: &str = "publish_timestamp";
const LEGACY_PUBLISH_KEY: &str = "published_timestamp";

/// Some exports carry a bare object where a list belongs; treat it as a
/// one-element list. Null and absent are both empty.
fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Verbatim string form of a scalar severity id (strings trimmed). Validity
/// is the label normalizer's concern; containers pass through untouched.
fn coerce_severity_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags keep only a non-empty `name`.
fn reduce_tag(tag: &Value) -> Option<Value> {
    let name = tag.get("name")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    Some(json!({ "name": name }))
}

pub struct EventReducer {
    options: ReduceConfig,
}

impl EventReducer {
    pub fn new(options: ReduceConfig) -> Self {
        Self { options }
    }

    /// Reduce one raw event document. `None` when the document carries no
    /// `Event` object: that is a rejection, not an error.
    pub fn reduce(&self, raw: &Value) -> Option<Value> {
        let event = raw.get("Event")?.as_object()?;
        let mut out = Map::new();

        for key in EVENT_KEYS {
            // publish_timestamp used to ship under a legacy name; the
            // back-fill is one-directional.
            let source = event.get(key).or_else(|| {
                (key == PUBLISH_KEY)
                    .then(|| event.get(LEGACY_PUBLISH_KEY))
                    .flatten()
            });
            if let Some(v) = source {
                out.insert(key.to_string(), v.clone());
            }
        }
        if let Some(coerced) = out.get("threat_level_id").and_then(coerce_severity_id) {
            out.insert("threat_level_id".to_string(), Value::String(coerced));
        }

        let tags: Vec<Value> = as_list(event.get("Tag"))
            .into_iter()
            .filter_map(reduce_tag)
            .collect();
        if !tags.is_empty() {
            out.insert("Tag".to_string(), Value::Array(tags));
        }

        let attributes: Vec<Value> = as_list(event.get("Attribute"))
            .into_iter()
            .filter_map(|a| self.reduce_attribute(a))
            .collect();
        if !attributes.is_empty() {
            out.insert("Attribute".to_string(), Value::Array(attributes));
        }

        let objects: Vec<Value> = as_list(event.get("Object"))
            .into_iter()
            .filter_map(|o| self.reduce_object(o))
            .collect();
        if !objects.is_empty() {
            out.insert("Object".to_string(), Value::Array(objects));
        }

        Some(json!({ "Event": out }))
    }

    /// Keep-list one attribute. Requires a non-empty string `type` and a
    /// non-null `value`; the kept value is masked/truncated and a missing
    /// comment becomes `""`.
    fn reduce_attribute(&self, attr: &Value) -> Option<Value> {
        let attr = attr.as_object()?;
        let mut kept = Map::new();
        for key in ATTRIBUTE_KEYS {
            if let Some(v) = attr.get(key) {
                kept.insert(key.to_string(), v.clone());
            }
        }
        if self.options.keep_to_ids {
            if let Some(v) = attr.get(TO_IDS_KEY) {
                kept.insert(TO_IDS_KEY.to_string(), v.clone());
            }
        }

        let attr_type = kept.get("type").and_then(Value::as_str).filter(|t| !t.is_empty())?;
        let value = kept.get("value").filter(|v| !v.is_null())?;
        let normalized = normalize_value(attr_type, value, self.options.truncate_long);

        kept.insert("value".to_string(), normalized);
        kept.entry("comment".to_string())
            .or_insert_with(|| Value::String(String::new()));
        Some(Value::Object(kept))
    }

    /// Keep-list one object. Retained only if the original had at least one
    /// kept scalar field or at least one surviving inner attribute.
    fn reduce_object(&self, object: &Value) -> Option<Value> {
        let object = object.as_object()?;
        let mut kept = Map::new();
        for key in OBJECT_KEYS {
            if let Some(v) = object.get(key) {
                kept.insert(key.to_string(), v.clone());
            }
        }
        let had_scalar_fields = !kept.is_empty();
        kept.entry("comment".to_string())
            .or_insert_with(|| Value::String(String::new()));

        let attributes: Vec<Value> = as_list(object.get("Attribute"))
            .into_iter()
            .filter_map(|a| self.reduce_attribute(a))
            .collect();

        if !had_scalar_fields && attributes.is_empty() {
            return None;
        }
        if !attributes.is_empty() {
            kept.insert("Attribute".to_string(), Value::Array(attributes));
        }
        Some(Value::Object(kept))
    }
}

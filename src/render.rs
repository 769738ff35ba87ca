//! Markdown rendering of reduced events, used for the textual twin of every
//! kept document.
//!
//! Rendering is lossy and presentation-only. The JSON copy stays the source
//! of truth; this view exists so analysts can skim a report without a JSON
//! viewer.

use crate::labels::ThreatLevel;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Values that render nothing: null, blank strings, zero, false, and empty
/// containers.
fn non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Strings render bare, everything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn embedded_level(event: &Map<String, Value>) -> Option<ThreatLevel> {
    ["threat_level_id", "threat_level"]
        .iter()
        .filter_map(|key| event.get(*key))
        .find(|v| non_empty(v))
        .and_then(ThreatLevel::from_raw)
}

fn tags_line(tags: Option<&Value>) -> Option<String> {
    let names: Vec<String> = tags?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|tag| tag.get("name"))
        .filter(|name| non_empty(name))
        .map(value_text)
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn comment_suffix(comment: Option<&Value>) -> String {
    let Some(comment) = comment.filter(|v| non_empty(v)) else {
        return String::new();
    };
    let text = value_text(comment);
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else {
        format!(" — {text}")
    }
}

fn category_of(attr: &Map<String, Value>) -> String {
    attr.get("category")
        .filter(|v| non_empty(v))
        .map(value_text)
        .unwrap_or_else(|| String::from("Uncategorized"))
}

/// `{type}: {value}` with an optional comment suffix; shared by top-level and
/// object attribute bullets.
fn attribute_bullet(attr: &Map<String, Value>) -> String {
    let attr_type = attr
        .get("type")
        .map(value_text)
        .unwrap_or_else(|| String::from("unknown"));
    let value = attr.get("value").map(value_text).unwrap_or_default();
    format!(
        "{attr_type}: {value}{}",
        comment_suffix(attr.get("comment"))
    )
}

/// Top-level attributes grouped by category, preserving document order
/// within each group. BTreeMap keeps the category headings sorted.
fn group_by_category(attrs: Option<&Value>) -> BTreeMap<String, Vec<&Map<String, Value>>> {
    let mut grouped: BTreeMap<String, Vec<&Map<String, Value>>> = BTreeMap::new();
    for attr in attrs.and_then(Value::as_array).into_iter().flatten() {
        let Some(attr) = attr.as_object() else {
            continue;
        };
        grouped.entry(category_of(attr)).or_default().push(attr);
    }
    grouped
}

fn object_heading(object: &Map<String, Value>) -> String {
    let name = object
        .get("name")
        .filter(|v| non_empty(v))
        .map(value_text)
        .unwrap_or_default();
    let name = name.trim();
    let name = if name.is_empty() { "object" } else { name };

    let desc = object
        .get("description")
        .filter(|v| non_empty(v))
        .map(value_text)
        .unwrap_or_default();
    let desc = desc.trim();
    if desc.is_empty() {
        name.to_string()
    } else {
        format!("{name} — {desc}")
    }
}

/// Render one reduced event document as a Markdown threat report.
///
/// Sections: a title line built from date and info, a key-intelligence
/// block, top-level indicators grouped by category, and one block per
/// object. Absent sections render their placeholder rather than vanishing,
/// so every report has the same skeleton.
pub fn render_markdown(document: &Value) -> String {
    let empty = Map::new();
    let event = document
        .get("Event")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let date = event
        .get("date")
        .filter(|v| !v.is_null())
        .map(value_text)
        .unwrap_or_default();
    let date = date.trim();
    let info = event
        .get("info")
        .filter(|v| !v.is_null())
        .map(value_text)
        .unwrap_or_default();
    let info = info.trim();
    let title = if date.is_empty() && info.is_empty() {
        String::from("Threat Report")
    } else {
        format!("{date}: {info}")
    };

    let mut lines: Vec<String> = vec![format!("# Threat Report: {title}"), String::new(), String::new()];

    lines.push("## Key Intelligence".into());
    if !date.is_empty() {
        lines.push(format!("* Date: {date}"));
    }
    if let Some(level) = embedded_level(event) {
        lines.push(format!("* Threat Level: {} ({})", level.id(), level.name()));
    }
    if let Some(tags) = tags_line(event.get("Tag")) {
        lines.push(format!("* Tags: {tags}"));
    }
    lines.extend(["", "---", ""].map(String::from));

    lines.push("## Indicators of Compromise (IOCs)".into());
    let grouped = group_by_category(event.get("Attribute"));
    if grouped.is_empty() {
        lines.push("_No top-level indicators._".into());
        lines.push(String::new());
    } else {
        for (category, attrs) in &grouped {
            lines.push(format!("### {category}"));
            for attr in attrs {
                lines.push(format!("* {}", attribute_bullet(attr)));
            }
            lines.push(String::new());
        }
    }

    let objects = event.get("Object").and_then(Value::as_array);
    if let Some(objects) = objects.filter(|objs| !objs.is_empty()) {
        lines.push("## Objects".into());
        for object in objects.iter().filter_map(Value::as_object) {
            lines.push(format!("### {}", object_heading(object)));
            let attrs: Vec<&Map<String, Value>> = object
                .get("Attribute")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_object)
                .collect();
            if attrs.is_empty() {
                lines.push("* _No attributes_".into());
            } else {
                for attr in attrs {
                    lines.push(format!("* [{}] {}", category_of(attr), attribute_bullet(attr)));
                }
            }
            lines.push(String::new());
        }
    }

    format!("{}\n", lines.join("\n").trim_end())
}

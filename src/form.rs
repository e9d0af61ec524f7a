//! Read-only traversals over a KoboToolbox form definition (an asset's
//! `content` document). Malformed entries are skipped rather than failing the
//! whole extraction.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Metadata for one option of a choice list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    /// Display label; falls back to the option value when absent.
    pub label: String,
    /// Position of the option within the form definition, counted across all
    /// choice lists.
    pub sequence: usize,
}

/// Lookup structure for option labels: list name → option value → metadata.
pub type ChoiceLists = BTreeMap<String, BTreeMap<String, Choice>>;

/// Extracts the choice lists from an asset's form definition. Entries missing
/// a `list_name` or `name` are omitted.
pub fn choices(asset: &Value) -> ChoiceLists {
    let mut lists = ChoiceLists::new();
    let Some(entries) = asset.pointer("/content/choices").and_then(Value::as_array) else {
        return lists;
    };

    let mut sequence = 0;
    for entry in entries {
        let Some(list_name) = entry.get("list_name").and_then(Value::as_str) else {
            continue;
        };
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let label = first_label(entry).unwrap_or_else(|| name.to_string());

        lists
            .entry(list_name.to_string())
            .or_default()
            .insert(name.to_string(), Choice { label, sequence });
        sequence += 1;
    }

    lists
}

/// Question kinds supported by XLSForm. `select_one <list>` and
/// `select_multiple <list>` collapse onto their base kind; unknown types
/// degrade to [`QuestionKind::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Integer,
    Decimal,
    Date,
    SelectOne,
    SelectMultiple,
    Calculate,
    Note,
    Geopoint,
    Image,
    Audio,
    Video,
    File,
    Barcode,
    Acknowledge,
    Hidden,
}

impl QuestionKind {
    fn from_type(raw: &str) -> Self {
        match raw {
            "text" => QuestionKind::Text,
            "integer" => QuestionKind::Integer,
            "decimal" => QuestionKind::Decimal,
            "date" => QuestionKind::Date,
            "calculate" => QuestionKind::Calculate,
            "note" => QuestionKind::Note,
            "geopoint" => QuestionKind::Geopoint,
            "image" => QuestionKind::Image,
            "audio" => QuestionKind::Audio,
            "video" => QuestionKind::Video,
            "file" => QuestionKind::File,
            "barcode" => QuestionKind::Barcode,
            "acknowledge" => QuestionKind::Acknowledge,
            "hidden" => QuestionKind::Hidden,
            other if other.starts_with("select_one") => QuestionKind::SelectOne,
            other if other.starts_with("select_multiple") => QuestionKind::SelectMultiple,
            _ => QuestionKind::Text,
        }
    }
}

/// One survey item, with the group path needed to disambiguate same-named
/// questions in different repeating groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub kind: QuestionKind,
    pub name: String,
    /// First translation of the label; empty when the item has none.
    pub label: String,
    /// Names of the enclosing groups and repeats, outermost first.
    pub group_path: Vec<String>,
    pub required: bool,
}

/// Extracts the ordered question descriptors from an asset's form definition.
///
/// `begin_group`/`begin_repeat` and their `end_*` markers maintain the group
/// path and do not themselves appear in the output; items without a usable
/// `name` are skipped.
pub fn questions(asset: &Value) -> Vec<Question> {
    let Some(survey) = asset.pointer("/content/survey").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut path: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for item in survey {
        let Some(type_name) = item.get("type").and_then(Value::as_str) else {
            continue;
        };
        match type_name {
            "begin_group" | "begin_repeat" => {
                // Unnamed groups still push a placeholder so the matching
                // end marker pops the right level.
                let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
                path.push(name.to_string());
            }
            "end_group" | "end_repeat" => {
                path.pop();
            }
            _ => {
                let Some(name) = item.get("name").and_then(Value::as_str) else {
                    continue;
                };
                out.push(Question {
                    kind: QuestionKind::from_type(type_name),
                    name: name.to_string(),
                    label: first_label(item).unwrap_or_default(),
                    group_path: path.iter().filter(|p| !p.is_empty()).cloned().collect(),
                    required: item.get("required").map(is_truthy).unwrap_or(false),
                });
            }
        }
    }

    out
}

/// Labels come as a translation array or occasionally a bare string.
fn first_label(item: &Value) -> Option<String> {
    match item.get("label") {
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
        Some(Value::String(value)) => Some(value.clone()),
        _ => None,
    }
}

/// XLSForm encodes `required` as the string `"yes"`; newer exports use a
/// plain boolean.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text == "yes" || text == "true",
        _ => false,
    }
}

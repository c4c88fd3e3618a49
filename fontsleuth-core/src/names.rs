//! Name-table value resolution across the shapes decoders hand us (made by FontLab https://www.fontlab.com/)
//!
//! A name table arrives either keyed by nameID (each value a plain string or a
//! language-keyed map) or as the flat list of raw records. Each shape has its
//! own resolver; [`NameTable::get`] dispatches on the shape.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const COPYRIGHT: u16 = 0;
pub const FAMILY: u16 = 1;
pub const UNIQUE_ID: u16 = 3;
pub const FULL_NAME: u16 = 4;
pub const VERSION: u16 = 5;
pub const MANUFACTURER: u16 = 8;
pub const DESIGNER: u16 = 9;
pub const VENDOR_URL: u16 = 11;
pub const LICENSE: u16 = 13;
pub const LICENSE_URL: u16 = 14;
pub const TYPOGRAPHIC_FAMILY: u16 = 16;

pub const PLATFORM_MICROSOFT: u16 = 3;
pub const LANGUAGE_EN_US: u16 = 0x0409;

/// Language keys tried in order before falling back to the first string value.
const PREFERRED_KEYS: [&str; 6] = ["en", "en-US", "en-us", "1033", "0", "default"];

/// A single raw name record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRecordEntry {
    #[serde(rename = "nameID")]
    pub name_id: u16,
    #[serde(rename = "platformID")]
    pub platform_id: u16,
    #[serde(rename = "languageID")]
    pub language_id: u16,
    pub text: String,
}

/// Value stored under one nameID in a keyed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameValue {
    Plain(String),
    Localized(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NameTable {
    Keyed(BTreeMap<u16, NameValue>),
    Records(Vec<NameRecordEntry>),
}

// Buffered untagged enums cannot parse integer map keys from JSON strings,
// so the shape is picked from the decoded value instead.
impl<'de> Deserialize<'de> for NameTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<NameRecordEntry>, _>>()
                .map(NameTable::Records)
                .map_err(de::Error::custom),
            Value::Object(entries) => {
                let mut keyed = BTreeMap::new();
                for (key, value) in entries {
                    let id: u16 = key
                        .parse()
                        .map_err(|_| de::Error::custom(format!("invalid nameID key: {key}")))?;
                    let value: NameValue =
                        serde_json::from_value(value).map_err(de::Error::custom)?;
                    keyed.insert(id, value);
                }
                Ok(NameTable::Keyed(keyed))
            }
            other => Err(de::Error::custom(format!(
                "expected name table object or record list, got {other}"
            ))),
        }
    }
}

impl Default for NameTable {
    fn default() -> Self {
        NameTable::Records(Vec::new())
    }
}

impl NameTable {
    /// Resolve the cleaned text for `name_id`, or `None` when absent or blank.
    pub fn get(&self, name_id: u16) -> Option<String> {
        match self {
            NameTable::Keyed(map) => map.get(&name_id).and_then(resolve_value),
            NameTable::Records(records) => resolve_records(records, name_id),
        }
    }

    /// First present entry among `ids`, in order.
    pub fn first_of(&self, ids: &[u16]) -> Option<String> {
        ids.iter().find_map(|id| self.get(*id))
    }
}

fn resolve_value(value: &NameValue) -> Option<String> {
    match value {
        NameValue::Plain(text) => clean_name_text(text),
        NameValue::Localized(map) => resolve_localized(map),
    }
}

fn resolve_localized(map: &Map<String, Value>) -> Option<String> {
    PREFERRED_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .find_map(clean_name_text)
        .or_else(|| {
            map.values()
                .filter_map(Value::as_str)
                .find_map(clean_name_text)
        })
}

fn resolve_records(records: &[NameRecordEntry], name_id: u16) -> Option<String> {
    let preferred = records.iter().find(|rec| {
        rec.name_id == name_id
            && rec.platform_id == PLATFORM_MICROSOFT
            && (rec.language_id == LANGUAGE_EN_US || rec.language_id == 0)
    });

    preferred
        .and_then(|rec| clean_name_text(&rec.text))
        .or_else(|| {
            records
                .iter()
                .filter(|rec| rec.name_id == name_id)
                .find_map(|rec| clean_name_text(&rec.text))
        })
}

/// Strip embedded NULs and collapse whitespace runs; blank input yields `None`.
pub fn clean_name_text(raw: &str) -> Option<String> {
    let without_nul = raw.replace('\0', "");
    let collapsed = without_nul.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name_id: u16, platform_id: u16, language_id: u16, text: &str) -> NameRecordEntry {
        NameRecordEntry {
            name_id,
            platform_id,
            language_id,
            text: text.to_string(),
        }
    }

    #[test]
    fn plain_values_are_cleaned() {
        let mut map = BTreeMap::new();
        map.insert(FAMILY, NameValue::Plain("  Nanum\0 \t Gothic ".to_string()));
        let table = NameTable::Keyed(map);

        assert_eq!(table.get(FAMILY).as_deref(), Some("Nanum Gothic"));
        assert_eq!(table.get(COPYRIGHT), None);
    }

    #[test]
    fn localized_prefers_english_keys_over_insertion_order() {
        let table: NameTable = serde_json::from_value(json!({
            "1": {"ko": "나눔고딕", "en-US": "Nanum Gothic"}
        }))
        .expect("keyed table");

        assert_eq!(table.get(FAMILY).as_deref(), Some("Nanum Gothic"));
    }

    #[test]
    fn localized_falls_back_to_first_string_value() {
        let table: NameTable = serde_json::from_value(json!({
            "1": {"meta": 7, "ko": "나눔고딕", "ja": "ナヌム"}
        }))
        .expect("keyed table");

        assert_eq!(table.get(FAMILY).as_deref(), Some("나눔고딕"));
    }

    #[test]
    fn records_prefer_microsoft_english() {
        let table = NameTable::Records(vec![
            record(FAMILY, 1, 0, "Mac Name"),
            record(FAMILY, 3, 0x0412, "Korean Name"),
            record(FAMILY, 3, LANGUAGE_EN_US, "Windows Name"),
        ]);

        assert_eq!(table.get(FAMILY).as_deref(), Some("Windows Name"));
    }

    #[test]
    fn records_fall_back_to_first_matching_id() {
        let table = NameTable::Records(vec![
            record(VERSION, 1, 0, "Version 1.0"),
            record(FAMILY, 1, 0, "Mac Name"),
            record(FAMILY, 3, 0x0412, "Korean Name"),
        ]);

        assert_eq!(table.get(FAMILY).as_deref(), Some("Mac Name"));
    }

    #[test]
    fn blank_preferred_record_does_not_hide_others() {
        let table = NameTable::Records(vec![
            record(FAMILY, 3, LANGUAGE_EN_US, "\0\0"),
            record(FAMILY, 1, 0, "Fallback"),
        ]);

        assert_eq!(table.get(FAMILY).as_deref(), Some("Fallback"));
    }

    #[test]
    fn records_shape_deserializes_from_list() {
        let table: NameTable = serde_json::from_value(json!([
            {"nameID": 4, "platformID": 3, "languageID": 1033, "text": "Alpha Bold"}
        ]))
        .expect("records table");

        assert_eq!(table.first_of(&[FAMILY, FULL_NAME]).as_deref(), Some("Alpha Bold"));
    }
}

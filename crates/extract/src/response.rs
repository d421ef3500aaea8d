use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::schema::{Extraction, ExtractionStatus, MeetingRecord, PersonRecord, RelationshipRecord};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*(?:```|\z)").expect("static regex")
});

pub const UNKNOWN_MEETING: &str = "Unknown Meeting";

/// Remove a surrounding ```json ... ``` block if the model added one.
/// Anything after the closing fence is dropped.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}

/// Turn a raw model reply into a validated extraction.
pub fn parse_reply(reply: &str) -> Result<Extraction, ExtractError> {
    let cleaned = strip_code_fence(reply);
    if cleaned.is_empty() {
        return Err(ExtractError::EmptyReply);
    }
    let value: Value = serde_json::from_str(cleaned)?;
    validate(value)
}

/// Map a JSON object onto typed records. Absent sections and records that
/// do not fit the schema make the result `Partial` instead of failing it.
pub fn validate(value: Value) -> Result<Extraction, ExtractError> {
    let Value::Object(mut map) = value else {
        return Err(ExtractError::NotAnObject);
    };

    let mut missing = Vec::new();
    let mut dropped = 0;

    let people: Vec<PersonRecord> = records(&mut map, "people", &mut missing, &mut dropped)
        .into_iter()
        .filter_map(|mut p: PersonRecord| {
            p.name = p.name.trim().to_string();
            if p.name.is_empty() {
                dropped += 1;
                return None;
            }
            p.skills = clean_strings(p.skills);
            Some(p)
        })
        .collect();

    let organizations = strings(&mut map, "organizations", &mut missing, &mut dropped);
    let technologies = strings(&mut map, "technologies", &mut missing, &mut dropped);
    let topics = strings(&mut map, "topics", &mut missing, &mut dropped);

    let meetings: Vec<MeetingRecord> = records(&mut map, "meetings", &mut missing, &mut dropped)
        .into_iter()
        .map(|mut m: MeetingRecord| {
            m.title = m.title.trim().to_string();
            if m.title.is_empty() {
                m.title = UNKNOWN_MEETING.to_string();
            }
            m.date = m.date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
            m.attendees = clean_strings(m.attendees);
            m.topics = clean_strings(m.topics);
            m
        })
        .collect();

    let relationships: Vec<RelationshipRecord> =
        records(&mut map, "relationships", &mut missing, &mut dropped)
            .into_iter()
            .filter_map(|mut r: RelationshipRecord| {
                r.source = r.source.trim().to_string();
                r.target = r.target.trim().to_string();
                if r.source.is_empty() || r.target.is_empty() {
                    dropped += 1;
                    return None;
                }
                Some(r)
            })
            .collect();

    let status = if missing.is_empty() && dropped == 0 {
        ExtractionStatus::Complete
    } else {
        ExtractionStatus::Partial {
            missing_sections: missing,
            dropped_records: dropped,
        }
    };

    Ok(Extraction {
        people,
        organizations,
        technologies,
        topics,
        meetings,
        relationships,
        status,
    })
}

/// Parse the `{"technologies": [...]}` reply of a consolidation call.
pub fn parse_consolidation(reply: &str) -> Result<Vec<String>, ExtractError> {
    let cleaned = strip_code_fence(reply);
    if cleaned.is_empty() {
        return Err(ExtractError::EmptyReply);
    }
    let value: Value = serde_json::from_str(cleaned)?;
    let Value::Object(mut map) = value else {
        return Err(ExtractError::NotAnObject);
    };
    match map.remove("technologies") {
        Some(Value::Array(items)) => Ok(clean_strings(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )),
        _ => Err(ExtractError::MissingField("technologies")),
    }
}

fn section(
    map: &mut Map<String, Value>,
    key: &str,
    missing: &mut Vec<String>,
    dropped: &mut usize,
) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => {
            missing.push(key.to_string());
            Vec::new()
        }
        Some(_) => {
            // present but not a list: nothing in it is usable
            missing.push(key.to_string());
            *dropped += 1;
            Vec::new()
        }
    }
}

fn records<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
    missing: &mut Vec<String>,
    dropped: &mut usize,
) -> Vec<T> {
    section(map, key, missing, dropped)
        .into_iter()
        .filter_map(|item| match serde_json::from_value(normalize_record(item)) {
            Ok(record) => Some(record),
            Err(_) => {
                *dropped += 1;
                None
            }
        })
        .collect()
}

fn strings(
    map: &mut Map<String, Value>,
    key: &str,
    missing: &mut Vec<String>,
    dropped: &mut usize,
) -> Vec<String> {
    let mut out = Vec::new();
    for item in section(map, key, missing, dropped) {
        match item {
            Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            _ => *dropped += 1,
        }
    }
    out
}

/// Nulls become absent fields; relationship types are lower-snake-cased.
fn normalize_record(item: Value) -> Value {
    match item {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| match (k.as_str(), v) {
                    ("type", Value::String(s)) => {
                        let kind = s.trim().to_lowercase().replace([' ', '-'], "_");
                        (k, Value::String(kind))
                    }
                    (_, v) => (k, v),
                })
                .collect(),
        ),
        other => other,
    }
}

fn clean_strings(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value as Yaml;
use tracing::debug;

/// A front-matter value as the query layer sees it. Everything is kept as
/// text; nothing is type-coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Records(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    /// Every string inside the value.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            FieldValue::Text(text) => vec![text.as_str()],
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
            FieldValue::Records(records) => records
                .iter()
                .flat_map(|r| r.values().map(String::as_str))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontMatterFormat {
    Yaml,
    /// Line-oriented `key: value` fallback for files that are not valid YAML.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontMatter {
    pub fields: BTreeMap<String, FieldValue>,
    pub format: FrontMatterFormat,
}

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Scalar value of `key`, if it is one and is not blank.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Text(text)) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    /// List value of `key`. A scalar counts as a one-item list.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(text)) if !text.trim().is_empty() => vec![text.clone()],
            _ => Vec::new(),
        }
    }

    /// Display name: `name`, or `title` for meetings.
    pub fn display_name(&self) -> Option<&str> {
        self.text("name").or_else(|| self.text("title"))
    }

    pub fn relationships(&self) -> Vec<Relationship> {
        let Some(FieldValue::Records(records)) = self.fields.get("relationships") else {
            return Vec::new();
        };
        records
            .iter()
            .filter_map(|r| {
                Some(Relationship {
                    kind: r.get("type")?.clone(),
                    source: r.get("source")?.clone(),
                    target: r.get("target")?.clone(),
                })
            })
            .collect()
    }
}

/// Split a markdown file into its front matter and body. The file must open
/// with a `---` line and the block must be closed by another `---` line.
///
/// The block is read as YAML. If that fails, each line is split on its
/// first colon instead: values stay raw trimmed strings (quotes included),
/// `[a, b]` becomes a list, and nested or multi-line values are lost. Values
/// read through that fallback do not always match what was written.
pub fn parse_front_matter(text: &str) -> Option<(FrontMatter, String)> {
    let (block, body) = split_block(text)?;

    let front = match serde_yaml::from_str::<Yaml>(block) {
        Ok(Yaml::Mapping(mapping)) => FrontMatter {
            fields: mapping
                .into_iter()
                .filter_map(|(k, v)| Some((scalar(&k)?, field(v))))
                .collect(),
            format: FrontMatterFormat::Yaml,
        },
        Ok(_) => legacy(block),
        Err(e) => {
            debug!(error = %e, "Front matter is not YAML, using line parser");
            legacy(block)
        }
    };

    Some((front, body.to_string()))
}

fn split_block(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return Some((&rest[..offset], body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    None
}

fn scalar(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Null => Some(String::new()),
        _ => None,
    }
}

fn field(value: Yaml) -> FieldValue {
    match value {
        Yaml::Sequence(items) if items.iter().all(|i| matches!(i, Yaml::Mapping(_))) && !items.is_empty() => {
            FieldValue::Records(items.into_iter().filter_map(record).collect())
        }
        Yaml::Sequence(items) => FieldValue::List(items.iter().filter_map(scalar).collect()),
        Yaml::Mapping(_) => FieldValue::Records(record(value).into_iter().collect()),
        Yaml::Tagged(tagged) => field(tagged.value),
        other => FieldValue::Text(scalar(&other).unwrap_or_default()),
    }
}

fn record(value: Yaml) -> Option<BTreeMap<String, String>> {
    let Yaml::Mapping(mapping) = value else {
        return None;
    };
    Some(
        mapping
            .iter()
            .filter_map(|(k, v)| Some((scalar(k)?, scalar(v)?)))
            .collect(),
    )
}

fn legacy(block: &str) -> FrontMatter {
    let mut fields = BTreeMap::new();

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();

        let parsed = match value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            Some(inner) => FieldValue::List(
                inner
                    .split(',')
                    .map(|item| item.trim().trim_matches(['\'', '"']).to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            ),
            None => FieldValue::Text(value.to_string()),
        };
        fields.insert(key.to_string(), parsed);
    }

    FrontMatter {
        fields,
        format: FrontMatterFormat::Legacy,
    }
}

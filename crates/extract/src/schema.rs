use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Set by the aggregator, never by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PersonRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    #[serde(default)]
    pub title: String,
    /// Free-form: "2025-01-14", "Q4 2025", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    WorksFor,
    Uses,
    Attended,
    DiscussedIn,
    MentionedWith,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::WorksFor => "works_for",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Attended => "attended",
            RelationshipKind::DiscussedIn => "discussed_in",
            RelationshipKind::MentionedWith => "mentioned_with",
        }
    }
}

/// A typed edge between two entity names. Never validated against the
/// entity lists it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipRecord {
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub source: String,
    pub target: String,
}

impl RelationshipRecord {
    pub fn new(kind: RelationshipKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn involves(&self, name: &str) -> bool {
        self.source.eq_ignore_ascii_case(name) || self.target.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    Complete,
    /// The reply parsed, but sections were absent or records were unusable.
    Partial {
        missing_sections: Vec<String>,
        dropped_records: usize,
    },
    Failed {
        reason: String,
    },
}

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub people: Vec<PersonRecord>,
    pub organizations: Vec<String>,
    pub technologies: Vec<String>,
    pub topics: Vec<String>,
    pub meetings: Vec<MeetingRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub status: ExtractionStatus,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            people: Vec::new(),
            organizations: Vec::new(),
            technologies: Vec::new(),
            topics: Vec::new(),
            meetings: Vec::new(),
            relationships: Vec::new(),
            status: ExtractionStatus::Complete,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Failed {
                reason: reason.into(),
            },
            ..Self::empty()
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.status, ExtractionStatus::Partial { .. })
    }

    pub fn record_count(&self) -> usize {
        self.people.len()
            + self.organizations.len()
            + self.technologies.len()
            + self.topics.len()
            + self.meetings.len()
            + self.relationships.len()
    }
}

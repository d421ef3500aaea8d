use std::collections::{BTreeMap, HashMap, HashSet};

use extract::{Extraction, Extractor, MeetingRecord, PersonRecord, RelationshipRecord};
use ingest::{Artifact, DocumentKind};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const LINKEDIN_TAG: &str = "linkedin-profile";
pub const UNKNOWN_DATE: &str = "Unknown";

/// Knobs for `AggregationContext::finalize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// A technology must be mentioned at least this often to survive...
    pub min_mentions: usize,
    /// ...unless its lowercase form is in this list.
    pub technology_allow_list: Vec<String>,
    /// Ask the model to merge names when more than this many remain.
    pub consolidation_threshold: usize,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            min_mentions: 2,
            technology_allow_list: [
                "azure",
                "microsoft copilot",
                "dynamics 365",
                "power bi",
                "databricks",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            consolidation_threshold: 50,
        }
    }
}

/// Records accumulated across every processed document. Passed through the
/// pipeline by value; nothing is held on a builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationContext {
    pub people: Vec<PersonRecord>,
    pub organizations: Vec<String>,
    /// Raw mentions, repeats included; counted by `finalize`.
    pub technology_mentions: Vec<String>,
    pub topics: Vec<String>,
    pub meetings: Vec<MeetingRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub documents: BTreeMap<DocumentKind, usize>,
}

/// Aggregated, deduplicated and filtered records ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSet {
    pub people: Vec<PersonRecord>,
    pub organizations: Vec<String>,
    pub technologies: Vec<String>,
    pub topics: Vec<String>,
    pub meetings: Vec<MeetingRecord>,
    pub relationships: Vec<RelationshipRecord>,
}

impl AggregationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one document's extraction in. Which sections are kept depends on
    /// what kind of document it came from.
    pub fn absorb(&mut self, artifact: &Artifact, extraction: Extraction) {
        *self.documents.entry(artifact.kind).or_insert(0) += 1;
        let source = artifact.source_str();

        let Extraction {
            people,
            organizations,
            technologies,
            topics,
            meetings,
            relationships,
            ..
        } = extraction;

        match artifact.kind {
            DocumentKind::LinkedInProfile => {
                for mut person in people {
                    person.source = Some(source.clone());
                    if !person.tags.iter().any(|t| t == LINKEDIN_TAG) {
                        person.tags.push(LINKEDIN_TAG.to_string());
                    }
                    self.people.push(person);
                }
                self.organizations.extend(organizations);
                self.technology_mentions.extend(technologies);
            }
            DocumentKind::MeetingNotes | DocumentKind::MeetingTranscript => {
                for mut meeting in meetings {
                    meeting.source = Some(source.clone());
                    if meeting.date.as_deref().is_none_or(|d| d.trim().is_empty()) {
                        meeting.date = Some(
                            artifact
                                .temporal_context
                                .clone()
                                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
                        );
                    }
                    self.meetings.push(meeting);
                }
                self.topics.extend(topics);
                self.technology_mentions.extend(technologies);
            }
            DocumentKind::DecisionMakersList => {
                self.organizations.extend(organizations);
                self.technology_mentions.extend(technologies);
            }
            DocumentKind::AnnualReport
            | DocumentKind::StrategicPlan
            | DocumentKind::TechnicalDocument
            | DocumentKind::Document => {
                self.organizations.extend(organizations);
                self.technology_mentions.extend(technologies);
                self.topics.extend(topics);
            }
        }

        self.relationships.extend(relationships);
    }

    /// Dedup, filter, optionally consolidate technologies, and resolve
    /// meeting attendees' first names.
    pub async fn finalize(self, extractor: &Extractor, policy: &AggregationPolicy) -> KnowledgeSet {
        let mut technologies = filter_by_mentions(
            &self.technology_mentions,
            policy.min_mentions,
            &policy.technology_allow_list,
        );
        info!(
            mentions = self.technology_mentions.len(),
            kept = technologies.len(),
            "Filtered technologies by mention count"
        );

        if technologies.len() > policy.consolidation_threshold {
            technologies = dedup_exact(extractor.consolidate_technologies(&technologies).await);
        }

        let mut meetings = self.meetings;
        let resolved = resolve_attendees(&self.people, &mut meetings);
        info!(resolved, "Resolved attendee first names");

        KnowledgeSet {
            people: self.people,
            organizations: dedup_exact(self.organizations),
            technologies,
            topics: dedup_exact(self.topics),
            meetings,
            relationships: self.relationships,
        }
    }
}

/// Exact, case-sensitive dedup. First occurrence wins the position.
pub fn dedup_exact(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Distinct names mentioned at least `min_mentions` times, plus any whose
/// lowercase form is allow-listed. Counting is exact-string.
pub fn filter_by_mentions(mentions: &[String], min_mentions: usize, allow_list: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in mentions {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }

    let allowed: HashSet<String> = allow_list.iter().map(|a| a.to_lowercase()).collect();

    dedup_exact(
        mentions
            .iter()
            .filter(|name| counts[name.as_str()] >= min_mentions || allowed.contains(&name.to_lowercase()))
            .cloned()
            .collect(),
    )
}

/// Replace single-token attendees ("Jane") with the first person whose name
/// starts with that token ("Jane Doe"). Returns how many were replaced.
pub fn resolve_attendees(people: &[PersonRecord], meetings: &mut [MeetingRecord]) -> usize {
    let mut by_first_name: HashMap<String, &str> = HashMap::new();
    for person in people {
        if let Some(first) = person.name.split_whitespace().next() {
            by_first_name
                .entry(first.to_lowercase())
                .or_insert(person.name.as_str());
        }
    }

    let mut replaced = 0;
    for meeting in meetings.iter_mut() {
        for attendee in meeting.attendees.iter_mut() {
            if attendee.contains(' ') {
                continue;
            }
            if let Some(full) = by_first_name.get(&attendee.to_lowercase()) {
                if attendee != full {
                    *attendee = full.to_string();
                    replaced += 1;
                }
            }
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(kind: DocumentKind, text: &str) -> Artifact {
        Artifact::new(PathBuf::from("in/doc.md"), kind, text.to_string())
    }

    #[test]
    fn test_dedup_exact_is_case_sensitive() {
        let deduped = dedup_exact(vec![
            "Azure".to_string(),
            "azure".to_string(),
            "Azure".to_string(),
        ]);
        assert_eq!(deduped, vec!["Azure", "azure"]);
    }

    #[test]
    fn test_filter_by_mentions() {
        let mentions: Vec<String> = ["A", "B", "B", "C", "C", "C"].iter().map(|s| s.to_string()).collect();

        let mut kept = filter_by_mentions(&mentions, 2, &[]);
        kept.sort();
        assert_eq!(kept, vec!["B", "C"]);
    }

    #[test]
    fn test_allow_list_rescues_single_mentions() {
        let mentions = vec!["Power BI".to_string(), "Obscure Tool".to_string()];
        let kept = filter_by_mentions(&mentions, 2, &AggregationPolicy::default().technology_allow_list);
        assert_eq!(kept, vec!["Power BI"]);
    }

    #[test]
    fn test_resolve_attendees() {
        let people = vec![PersonRecord::named("Jane Doe"), PersonRecord::named("Jane Smith")];
        let mut meetings = vec![MeetingRecord {
            title: "Sync".to_string(),
            attendees: vec!["Jane".into(), "Unknownperson".into(), "Bob Stone".into()],
            ..Default::default()
        }];

        let replaced = resolve_attendees(&people, &mut meetings);

        assert_eq!(replaced, 1);
        // first person aggregated wins the first name
        assert_eq!(meetings[0].attendees, vec!["Jane Doe", "Unknownperson", "Bob Stone"]);
    }

    #[test]
    fn test_absorb_routes_by_kind() {
        let mut ctx = AggregationContext::new();

        let mut profile = Extraction::empty();
        profile.people.push(PersonRecord::named("Jane Doe"));
        profile.topics.push("ignored for profiles".into());
        profile.technologies.push("Azure".into());
        ctx.absorb(&artifact(DocumentKind::LinkedInProfile, "profile"), profile);

        let mut notes = Extraction::empty();
        notes.meetings.push(MeetingRecord {
            title: "Kickoff".into(),
            ..Default::default()
        });
        notes.people.push(PersonRecord::named("ignored for meetings"));
        notes.topics.push("AI roadmap".into());
        ctx.absorb(&artifact(DocumentKind::MeetingNotes, "held in Q1 2025"), notes);

        let mut keys = Extraction::empty();
        keys.topics.push("ignored for decision lists".into());
        keys.organizations.push("Proximus".into());
        ctx.absorb(&artifact(DocumentKind::DecisionMakersList, ""), keys);

        assert_eq!(ctx.people.len(), 1);
        assert_eq!(ctx.people[0].tags, vec![LINKEDIN_TAG]);
        assert_eq!(ctx.people[0].source.as_deref(), Some("in/doc.md"));
        assert_eq!(ctx.topics, vec!["AI roadmap"]);
        assert_eq!(ctx.organizations, vec!["Proximus"]);
        assert_eq!(ctx.meetings[0].date.as_deref(), Some("Q1 2025"));
        assert_eq!(ctx.documents[&DocumentKind::MeetingNotes], 1);
    }

    #[test]
    fn test_meeting_without_any_date_is_unknown() {
        let mut ctx = AggregationContext::new();
        let mut notes = Extraction::empty();
        notes.meetings.push(MeetingRecord {
            title: "Sync".into(),
            date: Some("  ".into()),
            ..Default::default()
        });

        ctx.absorb(
            &Artifact::new(PathBuf::from("in/sync.md"), DocumentKind::MeetingNotes, "no date".into()),
            notes,
        );
        assert_eq!(ctx.meetings[0].date.as_deref(), Some(UNKNOWN_DATE));
    }
}

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use extract::{MeetingRecord, PersonRecord, RelationshipKind, RelationshipRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{KnowledgeSet, UNKNOWN_DATE};
use crate::layout::{Category, INDEX_FILE, KnowledgeLayout};
use crate::slug::{meeting_slug, slugify, wiki_link};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    pub people: usize,
    pub organizations: usize,
    pub technologies: usize,
    pub topics: usize,
    pub meetings: usize,
    pub skipped_organizations: usize,
    /// Files written more than once in this run because two names shared a slug.
    pub overwritten: usize,
    /// Records and index files that could not be written. The rest of the
    /// render goes on without them.
    pub failed: usize,
}

impl RenderReport {
    pub fn total(&self) -> usize {
        self.people + self.organizations + self.technologies + self.topics + self.meetings
    }
}

#[derive(Serialize)]
struct PersonFrontMatter<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    role: &'a str,
    organization: &'a str,
    location: &'a str,
    skills: &'a [String],
    tags: Vec<String>,
    relationships: Vec<RelationshipRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    created: &'a str,
}

#[derive(Serialize)]
struct EntityFrontMatter<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    tags: Vec<String>,
    relationships: Vec<RelationshipRecord>,
    created: &'a str,
}

#[derive(Serialize)]
struct MeetingFrontMatter<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    date: &'a str,
    attendees: &'a [String],
    topics: &'a [String],
    tags: Vec<String>,
    relationships: Vec<RelationshipRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    created: &'a str,
}

/// Writes one markdown file per aggregated record, plus a category index.
pub struct Renderer {
    layout: KnowledgeLayout,
    created: String,
    organization_blocklist: Vec<String>,
}

impl Renderer {
    pub fn new(layout: KnowledgeLayout, organization_blocklist: Vec<String>) -> Self {
        Self {
            layout,
            created: chrono::Local::now().format("%Y-%m-%d").to_string(),
            organization_blocklist: organization_blocklist.iter().map(|b| b.to_lowercase()).collect(),
        }
    }

    /// Fix the `created` stamp instead of using today's date.
    pub fn with_created(mut self, created: impl Into<String>) -> Self {
        self.created = created.into();
        self
    }

    pub fn layout(&self) -> &KnowledgeLayout {
        &self.layout
    }

    pub fn render(&self, set: &KnowledgeSet) -> RenderReport {
        let mut report = RenderReport::default();
        let mut written: HashSet<PathBuf> = HashSet::new();

        let mut indexed: Vec<(Category, Vec<String>)> = Vec::new();

        let mut names = Vec::new();
        for person in &set.people {
            let path = self.layout.entity_path(Category::People, &slugify(&person.name));
            if self.emit(&path, self.person_file(person, set), &mut written, &mut report) {
                report.people += 1;
                names.push(person.name.clone());
            }
        }
        indexed.push((Category::People, names));

        let mut names = Vec::new();
        for org in &set.organizations {
            if org.trim().is_empty() || self.organization_blocklist.contains(&org.to_lowercase()) {
                report.skipped_organizations += 1;
                continue;
            }
            let path = self.layout.entity_path(Category::Organizations, &slugify(org));
            if self.emit(&path, self.organization_file(org, set), &mut written, &mut report) {
                report.organizations += 1;
                names.push(org.clone());
            }
        }
        indexed.push((Category::Organizations, names));

        let mut names = Vec::new();
        for tech in set.technologies.iter().filter(|t| !t.trim().is_empty()) {
            let path = self.layout.entity_path(Category::Technologies, &slugify(tech));
            if self.emit(&path, self.technology_file(tech, set), &mut written, &mut report) {
                report.technologies += 1;
                names.push(tech.clone());
            }
        }
        indexed.push((Category::Technologies, names));

        let mut names = Vec::new();
        for topic in set.topics.iter().filter(|t| !t.trim().is_empty()) {
            let path = self.layout.entity_path(Category::Topics, &slugify(topic));
            if self.emit(&path, self.topic_file(topic, set), &mut written, &mut report) {
                report.topics += 1;
                names.push(topic.clone());
            }
        }
        indexed.push((Category::Topics, names));

        let mut titles = Vec::new();
        for meeting in &set.meetings {
            let path = self.layout.entity_path(Category::Meetings, &meeting_slug(&meeting.title));
            if self.emit(&path, self.meeting_file(meeting, set), &mut written, &mut report) {
                report.meetings += 1;
                titles.push(meeting.title.clone());
            }
        }
        indexed.push((Category::Meetings, titles));

        for (category, names) in indexed {
            if names.is_empty() {
                continue;
            }
            if let Err(e) = self.write_index(category, names) {
                warn!(%category, error = %format!("{:#}", e), "Skipping category index");
                report.failed += 1;
            }
        }

        info!(
            files = report.total(),
            overwritten = report.overwritten,
            failed = report.failed,
            "Rendered knowledge base"
        );
        report
    }

    /// Write one record file. A failure is logged and counted, never raised.
    fn emit(
        &self,
        path: &Path,
        content: Result<String>,
        written: &mut HashSet<PathBuf>,
        report: &mut RenderReport,
    ) -> bool {
        match content.and_then(|content| self.write(path, &content, written, report)) {
            Ok(()) => true,
            Err(e) => {
                warn!(?path, error = %format!("{:#}", e), "Skipping record");
                report.failed += 1;
                false
            }
        }
    }

    fn write(
        &self,
        path: &Path,
        content: &str,
        written: &mut HashSet<PathBuf>,
        report: &mut RenderReport,
    ) -> Result<()> {
        if !written.insert(path.to_path_buf()) {
            debug!(?path, "Slug collision, overwriting earlier file");
            report.overwritten += 1;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
    }

    fn write_index(&self, category: Category, mut names: Vec<String>) -> Result<()> {
        names.sort_by_key(|n| n.to_lowercase());
        names.dedup();

        let mut content = format!("# {}\n\n", category.title());
        for name in &names {
            let slug = match category {
                Category::Meetings => meeting_slug(name),
                _ => slugify(name),
            };
            content.push_str(&format!("- [[{}|{}]]\n", slug, name));
        }

        let dir = self.layout.category_dir(category);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        let path = dir.join(INDEX_FILE);
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))
    }

    fn person_file(&self, person: &PersonRecord, set: &KnowledgeSet) -> Result<String> {
        let role = known(person.role.as_deref());
        let company = known(person.company.as_deref());
        let location = known(person.location.as_deref());

        let mut derived = Vec::new();
        if company != UNKNOWN {
            derived.push(RelationshipRecord::new(RelationshipKind::WorksFor, &person.name, company));
        }
        let attended: Vec<&MeetingRecord> = set
            .meetings
            .iter()
            .filter(|m| m.attendees.iter().any(|a| a.eq_ignore_ascii_case(&person.name)))
            .collect();
        for meeting in &attended {
            derived.push(RelationshipRecord::new(
                RelationshipKind::Attended,
                &person.name,
                &meeting.title,
            ));
        }

        let mut tags = person.tags.clone();
        if company != UNKNOWN {
            tags.push(slugify(company));
        }

        let front = PersonFrontMatter {
            kind: Category::People.entity_type(),
            name: &person.name,
            role,
            organization: company,
            location,
            skills: &person.skills,
            tags,
            relationships: relationships_for(&person.name, derived, &set.relationships),
            source: person.source.as_deref(),
            created: &self.created,
        };

        let mut body = format!("# {}\n\n**{}** at **{}**\n\n", person.name, role, company);
        body.push_str(&format!("## Contact Information\n- Location: {}\n\n", location));
        body.push_str("## Expertise\n");
        body.push_str(&bullets(person.skills.iter().cloned()));
        body.push_str("\n## Connections\n");
        if company != UNKNOWN {
            body.push_str(&format!("- Organization: {}\n", wiki_link(company)));
        } else {
            body.push_str("- (None listed)\n");
        }
        if !attended.is_empty() {
            body.push_str("\n## Meetings\n");
            for meeting in attended {
                body.push_str(&format!(
                    "- [[{}|{}]] ({})\n",
                    meeting_slug(&meeting.title),
                    meeting.title,
                    meeting.date.as_deref().unwrap_or(UNKNOWN_DATE)
                ));
            }
        }

        document(&front, &body)
    }

    fn organization_file(&self, org: &str, set: &KnowledgeSet) -> Result<String> {
        let members: Vec<&PersonRecord> = set
            .people
            .iter()
            .filter(|p| p.company.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(org)))
            .collect();

        let derived = members
            .iter()
            .map(|p| RelationshipRecord::new(RelationshipKind::WorksFor, &p.name, org))
            .collect();

        // technologies the org uses directly, or that its people list as skills
        let mut technologies: Vec<String> = set
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Uses && r.source.eq_ignore_ascii_case(org))
            .map(|r| r.target.clone())
            .collect();
        for tech in &set.technologies {
            let skilled = members
                .iter()
                .any(|p| p.skills.iter().any(|s| s.eq_ignore_ascii_case(tech)));
            if skilled {
                technologies.push(tech.clone());
            }
        }
        let technologies = unique_ignore_case(technologies);

        let front = EntityFrontMatter {
            kind: Category::Organizations.entity_type(),
            name: org,
            tags: vec!["organization".to_string()],
            relationships: relationships_for(org, derived, &set.relationships),
            created: &self.created,
        };

        let mut body = format!(
            "# {}\n\n## Overview\n{} organization in the knowledge base.\n\n## People\n",
            org, org
        );
        body.push_str(&bullets(members.iter().map(|p| wiki_link(&p.name))));
        body.push_str("\n## Technologies\n");
        body.push_str(&bullets(technologies.iter().map(|t| wiki_link(t))));

        document(&front, &body)
    }

    fn technology_file(&self, tech: &str, set: &KnowledgeSet) -> Result<String> {
        let needle = tech.to_lowercase();
        let users: Vec<&PersonRecord> = set
            .people
            .iter()
            .filter(|p| p.skills.iter().any(|s| s.to_lowercase().contains(&needle)))
            .collect();

        let derived = users
            .iter()
            .map(|p| RelationshipRecord::new(RelationshipKind::Uses, &p.name, tech))
            .collect();
        let relationships = relationships_for(tech, derived, &set.relationships);

        let related = unique_ignore_case(
            relationships
                .iter()
                .filter(|r| r.kind == RelationshipKind::Uses)
                .map(|r| other_end(r, tech).to_string())
                .collect(),
        );

        let front = EntityFrontMatter {
            kind: Category::Technologies.entity_type(),
            name: tech,
            tags: vec!["technology".to_string()],
            relationships,
            created: &self.created,
        };

        let mut body = format!(
            "# {}\n\n## Overview\n{} technology referenced in the knowledge base.\n\n## Related People\n",
            tech, tech
        );
        body.push_str(&bullets(related.iter().map(|n| wiki_link(n))));

        document(&front, &body)
    }

    fn topic_file(&self, topic: &str, set: &KnowledgeSet) -> Result<String> {
        let meetings: Vec<&MeetingRecord> = set
            .meetings
            .iter()
            .filter(|m| m.topics.iter().any(|t| t.eq_ignore_ascii_case(topic)))
            .collect();

        let derived = meetings
            .iter()
            .map(|m| RelationshipRecord::new(RelationshipKind::DiscussedIn, topic, &m.title))
            .collect();
        let relationships = relationships_for(topic, derived, &set.relationships);

        let front = EntityFrontMatter {
            kind: Category::Topics.entity_type(),
            name: topic,
            tags: vec!["topic".to_string()],
            relationships,
            created: &self.created,
        };

        let mut body = format!(
            "# {}\n\n## Overview\n{} topic in the knowledge base.\n\n## Discussed In\n",
            topic, topic
        );
        body.push_str(&bullets(meetings.iter().map(|m| {
            format!(
                "[[{}|{}]] ({})",
                meeting_slug(&m.title),
                m.title,
                m.date.as_deref().unwrap_or(UNKNOWN_DATE)
            )
        })));

        document(&front, &body)
    }

    fn meeting_file(&self, meeting: &MeetingRecord, set: &KnowledgeSet) -> Result<String> {
        let date = meeting.date.as_deref().unwrap_or(UNKNOWN_DATE);

        let mut derived: Vec<RelationshipRecord> = meeting
            .attendees
            .iter()
            .map(|a| RelationshipRecord::new(RelationshipKind::Attended, a, &meeting.title))
            .collect();
        derived.extend(
            meeting
                .topics
                .iter()
                .map(|t| RelationshipRecord::new(RelationshipKind::DiscussedIn, t, &meeting.title)),
        );

        let front = MeetingFrontMatter {
            kind: Category::Meetings.entity_type(),
            title: &meeting.title,
            date,
            attendees: &meeting.attendees,
            topics: &meeting.topics,
            tags: vec!["meeting".to_string()],
            relationships: relationships_for(&meeting.title, derived, &set.relationships),
            source: meeting.source.as_deref(),
            created: &self.created,
        };

        let known_person = |name: &str| set.people.iter().any(|p| p.name.eq_ignore_ascii_case(name));
        let known_topic = |name: &str| set.topics.iter().any(|t| t.eq_ignore_ascii_case(name));

        let mut body = format!("# {}\n\n**Date:** {}\n\n## Attendees\n", meeting.title, date);
        body.push_str(&bullets(meeting.attendees.iter().map(|a| {
            if known_person(a) { wiki_link(a) } else { a.clone() }
        })));
        body.push_str("\n## Topics Discussed\n");
        body.push_str(&bullets(meeting.topics.iter().map(|t| {
            if known_topic(t) { wiki_link(t) } else { t.clone() }
        })));
        if let Some(source) = &meeting.source {
            body.push_str(&format!("\n## Source\n- {}\n", source));
        }

        document(&front, &body)
    }
}

fn document<T: Serialize>(front: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(front).context("Failed to serialize front matter")?;
    Ok(format!("---\n{}---\n\n{}", yaml, body))
}

fn known(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
}

fn bullets(items: impl Iterator<Item = String>) -> String {
    let lines: Vec<String> = items.map(|item| format!("- {}\n", item)).collect();
    if lines.is_empty() {
        "- (None listed)\n".to_string()
    } else {
        lines.concat()
    }
}

fn other_end<'a>(relationship: &'a RelationshipRecord, name: &str) -> &'a str {
    if relationship.source.eq_ignore_ascii_case(name) {
        &relationship.target
    } else {
        &relationship.source
    }
}

fn unique_ignore_case(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Derived relationships first, then every extracted relationship touching
/// `name`, with exact duplicates removed.
fn relationships_for(
    name: &str,
    derived: Vec<RelationshipRecord>,
    extracted: &[RelationshipRecord],
) -> Vec<RelationshipRecord> {
    let mut seen = HashSet::new();
    derived
        .into_iter()
        .chain(extracted.iter().filter(|r| r.involves(name)).cloned())
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> KnowledgeSet {
        KnowledgeSet {
            people: vec![PersonRecord {
                name: "Jane Doe".into(),
                role: Some("CTO".into()),
                company: Some("Proximus".into()),
                location: None,
                skills: vec!["Azure".into(), "Power BI dashboards".into()],
                source: Some("in/jane.md".into()),
                tags: vec!["linkedin-profile".into()],
            }],
            organizations: vec!["Proximus".into(), "Microsoft".into(), "".into()],
            technologies: vec!["Azure".into(), "Power BI".into()],
            topics: vec!["AI roadmap".into()],
            meetings: vec![MeetingRecord {
                title: "Q1 Sync: 10:00 standup".into(),
                date: Some("2025-01-14".into()),
                attendees: vec!["Jane Doe".into(), "Bob".into()],
                topics: vec!["AI roadmap".into()],
                source: Some("in/sync.md".into()),
            }],
            relationships: vec![RelationshipRecord::new(
                RelationshipKind::Uses,
                "Proximus",
                "Databricks",
            )],
        }
    }

    fn render_sample() -> (tempfile::TempDir, RenderReport) {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(
            KnowledgeLayout::new(dir.path()),
            vec!["microsoft".into(), "unknown".into()],
        )
        .with_created("2026-01-01");
        let report = renderer.render(&sample_set());
        (dir, report)
    }

    #[test]
    fn test_report_counts() {
        let (_dir, report) = render_sample();

        assert_eq!(report.people, 1);
        assert_eq!(report.organizations, 1);
        assert_eq!(report.skipped_organizations, 2);
        assert_eq!(report.technologies, 2);
        assert_eq!(report.topics, 1);
        assert_eq!(report.meetings, 1);
        assert_eq!(report.overwritten, 0);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_person_file() {
        let (dir, _) = render_sample();
        let text = fs::read_to_string(dir.path().join("entities/people/jane-doe.md")).unwrap();

        assert!(text.starts_with("---\ntype: person\nname: Jane Doe\n"));
        assert!(text.contains("location: Unknown\n"));
        assert!(text.contains("created:") && text.contains("2026-01-01"));
        assert!(text.contains("**CTO** at **Proximus**"));
        assert!(text.contains("- Organization: [[proximus|Proximus]]"));
        assert!(text.contains("- [[q1-sync-1000-standup|Q1 Sync: 10:00 standup]] (2025-01-14)"));
    }

    #[test]
    fn test_front_matter_is_yaml() {
        let (dir, _) = render_sample();
        let text = fs::read_to_string(dir.path().join("events/meetings/q1-sync-1000-standup.md")).unwrap();

        let yaml = text
            .strip_prefix("---\n")
            .and_then(|rest| rest.split_once("\n---\n"))
            .map(|(front, _)| front)
            .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(value["title"].as_str(), Some("Q1 Sync: 10:00 standup"));
        assert_eq!(value["attendees"][1].as_str(), Some("Bob"));
        assert_eq!(value["relationships"][0]["type"].as_str(), Some("attended"));
        assert!(text.contains("- [[jane-doe|Jane Doe]]\n- Bob\n"));
    }

    #[test]
    fn test_cross_links() {
        let (dir, _) = render_sample();

        let org = fs::read_to_string(dir.path().join("entities/organizations/proximus.md")).unwrap();
        assert!(org.contains("## People\n- [[jane-doe|Jane Doe]]"));
        assert!(org.contains("- [[databricks|Databricks]]\n- [[azure|Azure]]"));

        let tech = fs::read_to_string(dir.path().join("entities/technologies/power-bi.md")).unwrap();
        assert!(tech.contains("## Related People\n- [[jane-doe|Jane Doe]]"));

        let topic = fs::read_to_string(dir.path().join("entities/topics/ai-roadmap.md")).unwrap();
        assert!(topic.contains("type: discussed_in"));

        let index = fs::read_to_string(dir.path().join("entities/technologies/INDEX.md")).unwrap();
        assert_eq!(index, "# Technologies\n\n- [[azure|Azure]]\n- [[power-bi|Power BI]]\n");
        assert!(!dir.path().join("entities/organizations/microsoft.md").exists());
    }

    #[test]
    fn test_slug_collision_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(KnowledgeLayout::new(dir.path()), Vec::new());
        let set = KnowledgeSet {
            topics: vec!["AI Roadmap".into(), "AI roadmap!".into()],
            ..Default::default()
        };

        let report = renderer.render(&set);

        assert_eq!(report.overwritten, 1);
        let text = fs::read_to_string(dir.path().join("entities/topics/ai-roadmap.md")).unwrap();
        assert!(text.contains("name: AI roadmap!"));
    }

    #[test]
    fn test_failed_write_does_not_stop_render() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the topic file should go makes that write fail
        fs::create_dir_all(dir.path().join("entities/topics/blocked.md")).unwrap();

        let renderer = Renderer::new(KnowledgeLayout::new(dir.path()), Vec::new());
        let set = KnowledgeSet {
            topics: vec!["Blocked".into(), "AI roadmap".into()],
            meetings: vec![MeetingRecord {
                title: "Kickoff".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let report = renderer.render(&set);

        assert_eq!(report.failed, 1);
        assert_eq!(report.topics, 1);
        assert_eq!(report.meetings, 1);
        assert!(dir.path().join("events/meetings/kickoff.md").exists());

        let index = fs::read_to_string(dir.path().join("entities/topics/INDEX.md")).unwrap();
        assert_eq!(index, "# Topics\n\n- [[ai-roadmap|AI roadmap]]\n");
    }

    #[test]
    fn test_awkward_names_stay_readable() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(KnowledgeLayout::new(dir.path()), Vec::new());
        let long = "x".repeat(300);
        let set = KnowledgeSet {
            topics: vec![long.clone(), "???".into()],
            ..Default::default()
        };

        let report = renderer.render(&set);

        assert_eq!(report.topics, 2);
        assert_eq!(report.failed, 0);
        let topics = dir.path().join("entities/topics");
        assert!(topics.join(format!("{}.md", "x".repeat(crate::slug::MAX_SLUG_BYTES))).exists());
        let fallback = fs::read_to_string(topics.join("untitled.md")).unwrap();
        assert!(fallback.contains("# ???"));
        assert!(!topics.join(".md").exists());
    }
}

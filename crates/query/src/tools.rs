use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use knowledge::Category;
use serde::Serialize;
use thiserror::Error;

use crate::files::{FileError, MarkdownFiles};
use crate::store::{KnowledgeStore, Record};

const LIST_CAP: usize = 10;
const SEARCH_CAP: usize = 5;
const SNIPPET_RADIUS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ToolParam {
    pub name: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ToolParam],
}

const fn required(name: &'static str) -> ToolParam {
    ToolParam { name, required: true }
}

const fn optional_param(name: &'static str) -> ToolParam {
    ToolParam { name, required: false }
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "list_knowledge_categories",
        description: "List the knowledge categories and how many records each holds.",
        parameters: &[],
    },
    ToolSpec {
        name: "query_knowledge_category",
        description: "List the records of one category (people, organizations, technologies, topics, meetings).",
        parameters: &[required("category")],
    },
    ToolSpec {
        name: "search_knowledge",
        description: "Search all records for a piece of text, optionally within one category.",
        parameters: &[required("query"), optional_param("category")],
    },
    ToolSpec {
        name: "query_temporal_knowledge",
        description: "Find records dated within a time period, e.g. '2025', 'Q1 2025' or '2025-01'.",
        parameters: &[required("time_period")],
    },
    ToolSpec {
        name: "find_entity_knowledge",
        description: "Find an entity by type and (partial) name and show its details.",
        parameters: &[required("entity_type"), required("entity_name")],
    },
    ToolSpec {
        name: "find_related_entities",
        description: "List relationships that mention an entity.",
        parameters: &[required("entity_name")],
    },
    ToolSpec {
        name: "get_person_network",
        description: "Show a person's organization, colleagues, meetings and relationships.",
        parameters: &[required("person_name")],
    },
    ToolSpec {
        name: "get_knowledge_summary",
        description: "Summarize the whole knowledge base.",
        parameters: &[],
    },
    ToolSpec {
        name: "list_markdown_files",
        description: "List every markdown file in the knowledge base by relative path.",
        parameters: &[],
    },
    ToolSpec {
        name: "read_markdown_file",
        description: "Read a markdown file in full, e.g. 'entities/people/jane-doe.md'.",
        parameters: &[required("filename")],
    },
    ToolSpec {
        name: "create_markdown_file",
        description: "Create a new markdown file. Fails if the file already exists.",
        parameters: &[required("filename"), optional_param("content")],
    },
    ToolSpec {
        name: "update_markdown_file",
        description: "Replace the content of an existing markdown file.",
        parameters: &[required("filename"), optional_param("content")],
    },
    ToolSpec {
        name: "append_to_markdown_file",
        description: "Append content to an existing markdown file.",
        parameters: &[required("filename"), required("content")],
    },
    ToolSpec {
        name: "delete_markdown_file",
        description: "Delete a markdown file.",
        parameters: &[required("filename")],
    },
    ToolSpec {
        name: "search_markdown_files",
        description: "Search every markdown file for text and list the matching line numbers.",
        parameters: &[required("query")],
    },
];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {tool} requires argument '{argument}'")]
    MissingArgument { tool: String, argument: &'static str },
}

/// The string-returning tool surface an agent runtime calls. Every answer,
/// including "nothing found" and read failures, is human-readable text.
#[derive(Debug, Clone)]
pub struct KnowledgeTools {
    store: KnowledgeStore,
    files: MarkdownFiles,
}

impl KnowledgeTools {
    pub fn new(store: KnowledgeStore) -> Self {
        let files = MarkdownFiles::new(store.root());
        Self { store, files }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn files(&self) -> &MarkdownFiles {
        &self.files
    }

    /// Dispatch a tool by name with string arguments.
    pub fn call(&self, name: &str, args: &HashMap<String, String>) -> Result<String, ToolError> {
        let spec = TOOLS
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        for param in spec.parameters.iter().filter(|p| p.required) {
            if args.get(param.name).is_none_or(|v| v.trim().is_empty()) {
                return Err(ToolError::MissingArgument {
                    tool: name.to_string(),
                    argument: param.name,
                });
            }
        }
        let arg = |key: &str| args.get(key).map(String::as_str).unwrap_or_default();
        let optional = |key: &str| args.get(key).map(String::as_str).filter(|v| !v.trim().is_empty());

        Ok(match spec.name {
            "list_knowledge_categories" => self.list_knowledge_categories(),
            "query_knowledge_category" => self.query_knowledge_category(arg("category")),
            "search_knowledge" => self.search_knowledge(arg("query"), optional("category")),
            "query_temporal_knowledge" => self.query_temporal_knowledge(arg("time_period")),
            "find_entity_knowledge" => self.find_entity_knowledge(arg("entity_type"), arg("entity_name")),
            "find_related_entities" => self.find_related_entities(arg("entity_name")),
            "get_person_network" => self.get_person_network(arg("person_name")),
            "get_knowledge_summary" => self.get_knowledge_summary(),
            "list_markdown_files" => self.list_markdown_files(),
            "read_markdown_file" => self.read_markdown_file(arg("filename")),
            "create_markdown_file" => self.create_markdown_file(arg("filename"), arg("content")),
            "update_markdown_file" => self.update_markdown_file(arg("filename"), arg("content")),
            "append_to_markdown_file" => self.append_to_markdown_file(arg("filename"), arg("content")),
            "delete_markdown_file" => self.delete_markdown_file(arg("filename")),
            "search_markdown_files" => self.search_markdown_files(arg("query")),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        })
    }

    pub fn list_knowledge_categories(&self) -> String {
        render(|| {
            let counts = self.store.categories()?;
            if counts.iter().all(|(_, n)| *n == 0) {
                return Ok(empty_message());
            }
            let mut out = vec![format!("Knowledge Base Categories ({} total):\n", counts.len())];
            for (category, count) in counts {
                out.push(format!("  • {}: {} records", category, count));
            }
            Ok(out.join("\n"))
        })
    }

    pub fn query_knowledge_category(&self, category: &str) -> String {
        let Some(parsed) = Category::parse(category) else {
            return unknown_category(category);
        };
        render(|| {
            let records = self.store.load(parsed)?;
            if records.is_empty() {
                return Ok(format!("No records found in category '{}'", parsed));
            }
            let mut out = vec![format!("Category: {} ({} records)\n", parsed, records.len())];
            for (i, record) in records.iter().take(LIST_CAP).enumerate() {
                out.push(format!("{}. {}", i + 1, summary_line(record)));
            }
            out.extend(more(records.len(), LIST_CAP, ""));
            Ok(out.join("\n"))
        })
    }

    pub fn search_knowledge(&self, query: &str, category: Option<&str>) -> String {
        let scope = match category {
            Some(name) => match Category::parse(name) {
                Some(parsed) => Some(parsed),
                None => return unknown_category(name),
            },
            None => None,
        };
        render(|| {
            let hits = self.store.search(query, scope, SNIPPET_RADIUS)?;
            if hits.is_empty() {
                return Ok(format!("No results found for '{}'", query));
            }
            let mut out = vec![format!("Search: '{}' ({} matches)\n", query, hits.len())];
            for (i, hit) in hits.iter().take(SEARCH_CAP).enumerate() {
                out.push(format!("{}. [{}] {}", i + 1, hit.record.category, hit.record.file_name()));
                out.push(format!("   ...{}...", hit.snippet));
                out.push(String::new());
            }
            out.extend(more(hits.len(), SEARCH_CAP, " matches"));
            Ok(out.join("\n"))
        })
    }

    pub fn query_temporal_knowledge(&self, time_period: &str) -> String {
        render(|| {
            let records = self.store.by_period(time_period)?;
            if records.is_empty() {
                return Ok(format!("No knowledge found for time period '{}'", time_period));
            }
            let mut out = vec![format!("Time Period: {} ({} records)\n", time_period, records.len())];
            for (i, record) in records.iter().take(LIST_CAP).enumerate() {
                out.push(format!("{}. [{}] {}", i + 1, record.category, summary_line(record)));
            }
            out.extend(more(records.len(), LIST_CAP, ""));
            Ok(out.join("\n"))
        })
    }

    pub fn find_entity_knowledge(&self, entity_type: &str, entity_name: &str) -> String {
        let Some(category) = Category::parse(entity_type) else {
            return unknown_category(entity_type);
        };
        render(|| {
            let records = self.store.find_entity(category, entity_name)?;
            if records.is_empty() {
                return Ok(format!(
                    "No knowledge found for {} entity '{}'",
                    category, entity_name
                ));
            }
            let mut out = vec![format!(
                "Entity: {} ({}) - {} matches\n",
                entity_name,
                category,
                records.len()
            )];
            for (i, record) in records.iter().take(LIST_CAP).enumerate() {
                out.push(format!("{}. {} [{}]", i + 1, record.name(), record.file_name()));
                out.extend(detail_lines(record));
                out.push(String::new());
            }
            out.extend(more(records.len(), LIST_CAP, ""));
            Ok(out.join("\n"))
        })
    }

    pub fn find_related_entities(&self, entity_name: &str) -> String {
        render(|| {
            let related = self.store.related(entity_name)?;
            if related.is_empty() {
                return Ok(format!("No relationships found for '{}'", entity_name));
            }
            let mut out = vec![format!(
                "Related to '{}' ({} relationships)\n",
                entity_name,
                related.len()
            )];
            for (i, r) in related.iter().take(LIST_CAP).enumerate() {
                out.push(format!(
                    "{}. [{}] {}: {} {} {}",
                    i + 1,
                    r.category,
                    r.entity,
                    r.relationship.source,
                    r.relationship.kind,
                    r.relationship.target
                ));
            }
            out.extend(more(related.len(), LIST_CAP, ""));
            Ok(out.join("\n"))
        })
    }

    pub fn get_person_network(&self, person_name: &str) -> String {
        render(|| {
            let Some(network) = self.store.network(person_name)? else {
                return Ok(format!("No person found matching '{}'", person_name));
            };
            let front = &network.person.front;
            let mut out = vec![
                format!("Network: {}", network.person.name()),
                format!("Role: {}", front.text("role").unwrap_or("Unknown")),
                format!("Organization: {}", front.text("organization").unwrap_or("Unknown")),
            ];

            out.push(format!("\nColleagues ({}):", network.colleagues.len()));
            for colleague in network.colleagues.iter().take(LIST_CAP) {
                out.push(format!("  • {}", summary_line(colleague)));
            }
            out.extend(more(network.colleagues.len(), LIST_CAP, ""));

            out.push(format!("\nMeetings ({}):", network.meetings.len()));
            for meeting in network.meetings.iter().take(LIST_CAP) {
                out.push(format!("  • {}", summary_line(meeting)));
            }
            out.extend(more(network.meetings.len(), LIST_CAP, ""));

            out.push(format!("\nRelationships ({}):", network.relationships.len()));
            for r in network.relationships.iter().take(LIST_CAP) {
                out.push(format!("  • {} {} {}", r.source, r.kind, r.target));
            }
            out.extend(more(network.relationships.len(), LIST_CAP, ""));

            Ok(out.join("\n"))
        })
    }

    pub fn get_knowledge_summary(&self) -> String {
        render(|| {
            let mut counts = Vec::new();
            let mut periods: BTreeMap<String, usize> = BTreeMap::new();
            let mut relationships = 0;
            for category in Category::ALL {
                let records = self.store.load(category)?;
                for record in &records {
                    if let Some(date) = record.date() {
                        *periods.entry(date.to_string()).or_insert(0) += 1;
                    }
                    relationships += record.front.relationships().len();
                }
                counts.push((category, records.len()));
            }

            let total: usize = counts.iter().map(|(_, n)| n).sum();
            if total == 0 {
                return Ok(empty_message());
            }

            let mut out = vec![
                "Knowledge Base Summary\n".to_string(),
                format!("Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
                format!("Location: {}", self.store.root().display()),
                format!("Total Records: {}\n", total),
                format!("Categories ({}):", counts.len()),
            ];
            counts.sort_by(|a, b| b.1.cmp(&a.1));
            for (category, count) in &counts {
                out.push(format!("  • {}: {} records", category, count));
            }

            if !periods.is_empty() {
                out.push(format!("\nTime Periods ({}):", periods.len()));
                for (period, count) in periods.iter().take(SEARCH_CAP) {
                    out.push(format!("  • {}: {} records", period, count));
                }
            }

            out.push(format!("\nRelationships: {}", relationships));
            Ok(out.join("\n"))
        })
    }

    pub fn list_markdown_files(&self) -> String {
        let names = self.files.list();
        if names.is_empty() {
            return "No markdown files found in the knowledge base.".to_string();
        }
        let mut out = vec![format!("Found {} markdown file(s):", names.len())];
        out.extend(names.iter().map(|n| format!("- {}", n)));
        out.join("\n")
    }

    pub fn read_markdown_file(&self, filename: &str) -> String {
        file_result(self.files.read(filename).map(|content| {
            format!("Contents of {}:\n\n{}", filename, content)
        }))
    }

    pub fn create_markdown_file(&self, filename: &str, content: &str) -> String {
        file_result(self.files.create(filename, content).map(|chars| {
            format!("Created '{}' with {} characters.", filename, chars)
        }))
    }

    pub fn update_markdown_file(&self, filename: &str, content: &str) -> String {
        file_result(self.files.update(filename, content).map(|chars| {
            format!("Updated '{}' with {} characters.", filename, chars)
        }))
    }

    pub fn append_to_markdown_file(&self, filename: &str, content: &str) -> String {
        file_result(self.files.append(filename, content).map(|chars| {
            format!("Appended {} characters to '{}'.", chars, filename)
        }))
    }

    pub fn delete_markdown_file(&self, filename: &str) -> String {
        file_result(self.files.delete(filename).map(|()| format!("Deleted '{}'.", filename)))
    }

    pub fn search_markdown_files(&self, query: &str) -> String {
        let matches = self.files.search(query);
        if matches.is_empty() {
            return format!("No matches found for '{}'.", query);
        }
        let mut out = vec![format!("Found '{}' in {} file(s):", query, matches.len())];
        for m in &matches {
            let lines: Vec<String> = m.lines.iter().map(|n| n.to_string()).collect();
            out.push(format!("- {} (lines: {})", m.name, lines.join(", ")));
        }
        out.join("\n")
    }
}

fn file_result(result: Result<String, FileError>) -> String {
    result.unwrap_or_else(|e| match e {
        FileError::InvalidPath(_) => format!("Rejected: {}", e),
        _ => format!("Error: {}", e),
    })
}

fn render(body: impl FnOnce() -> Result<String>) -> String {
    body().unwrap_or_else(|e| format!("Error reading knowledge base: {:#}", e))
}

fn empty_message() -> String {
    "Knowledge base is empty. Run the build first.".to_string()
}

fn unknown_category(name: &str) -> String {
    let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!("Unknown category '{}'. Available: {}", name, known.join(", "))
}

fn more(total: usize, shown: usize, noun: &str) -> Option<String> {
    (total > shown).then(|| format!("   ... and {} more{}", total - shown, noun))
}

fn summary_line(record: &Record) -> String {
    let name = record.name();
    match record.category {
        Category::People => format!(
            "{} - {} at {}",
            name,
            record.front.text("role").unwrap_or("Unknown"),
            record.front.text("organization").unwrap_or("Unknown")
        ),
        Category::Meetings => format!("{} ({})", name, record.date().unwrap_or("Unknown")),
        _ => name,
    }
}

fn detail_lines(record: &Record) -> Vec<String> {
    record
        .front
        .fields
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "name" | "title" | "relationships"))
        .filter_map(|(key, value)| {
            let joined = value.texts().join(", ");
            (!joined.trim().is_empty()).then(|| format!("   {}: {}", key, joined))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tools_with(files: &[(&str, &str)]) -> (tempfile::TempDir, KnowledgeTools) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let tools = KnowledgeTools::new(KnowledgeStore::new(dir.path()));
        (dir, tools)
    }

    fn topic(i: usize) -> (String, String) {
        (
            format!("entities/topics/topic-{:02}.md", i),
            format!("---\ntype: topic\nname: Topic {:02}\n---\n\n# Topic\n", i),
        )
    }

    #[test]
    fn test_empty_knowledge_base() {
        let (_dir, tools) = tools_with(&[]);
        assert!(tools.list_knowledge_categories().starts_with("Knowledge base is empty"));
        assert!(tools.get_knowledge_summary().starts_with("Knowledge base is empty"));
        assert_eq!(
            tools.query_knowledge_category("people"),
            "No records found in category 'people'"
        );
    }

    #[test]
    fn test_category_listing_is_capped() {
        let owned: Vec<(String, String)> = (0..13).map(topic).collect();
        let files: Vec<(&str, &str)> = owned.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let (_dir, tools) = tools_with(&files);

        let out = tools.query_knowledge_category("Topic");

        assert!(out.starts_with("Category: topics (13 records)"));
        assert!(out.contains("10. Topic 09"));
        assert!(!out.contains("Topic 10"));
        assert!(out.ends_with("... and 3 more"));
    }

    #[test]
    fn test_unknown_category() {
        let (_dir, tools) = tools_with(&[]);
        assert!(tools.query_knowledge_category("LinkedIn").starts_with("Unknown category 'LinkedIn'"));
        assert!(tools.search_knowledge("x", Some("nope")).starts_with("Unknown category"));
    }

    #[test]
    fn test_call_dispatch() {
        let (_dir, tools) = tools_with(&[(
            "entities/people/jane-doe.md",
            "---\ntype: person\nname: Jane Doe\nrole: CTO\norganization: Proximus\nskills:\n- Azure\n---\n",
        )]);

        let mut args = HashMap::new();
        args.insert("entity_type".to_string(), "person".to_string());
        args.insert("entity_name".to_string(), "jane".to_string());

        let out = tools.call("find_entity_knowledge", &args).unwrap();
        assert!(out.contains("1. Jane Doe [jane-doe.md]"));
        assert!(out.contains("   skills: Azure"));

        assert!(matches!(
            tools.call("find_related_entities", &HashMap::new()),
            Err(ToolError::MissingArgument { argument: "entity_name", .. })
        ));
        assert!(matches!(
            tools.call("drop_tables", &HashMap::new()),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_search_output() {
        let (_dir, tools) = tools_with(&[(
            "events/meetings/kickoff.md",
            "---\ntype: meeting\ntitle: Kickoff\ndate: 2025-01-14\n---\n\nWe discussed the data platform.\n",
        )]);

        let out = tools.search_knowledge("DATA PLATFORM", Some("meetings"));
        assert!(out.starts_with("Search: 'DATA PLATFORM' (1 matches)"));
        assert!(out.contains("1. [meetings] kickoff.md"));

        assert!(tools.query_temporal_knowledge("2025").contains("1. [meetings] Kickoff (2025-01-14)"));
        assert_eq!(tools.search_knowledge("absent", None), "No results found for 'absent'");
    }

    #[test]
    fn test_markdown_file_tools() {
        let (dir, tools) = tools_with(&[(
            "entities/people/jane-doe.md",
            "---\ntype: person\nname: Jane Doe\n---\n\n# Jane Doe\n\n## Expertise\n- Azure\n",
        )]);
        let args = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };

        let out = tools
            .call("read_markdown_file", &args(&[("filename", "entities/people/jane-doe.md")]))
            .unwrap();
        assert!(out.starts_with("Contents of entities/people/jane-doe.md:"));
        assert!(out.contains("## Expertise\n- Azure"));

        let out = tools
            .call(
                "create_markdown_file",
                &args(&[("filename", "notes/followups.md"), ("content", "Call Jane")]),
            )
            .unwrap();
        assert_eq!(out, "Created 'notes/followups.md' with 9 characters.");
        tools.append_to_markdown_file("notes/followups.md", "Send deck");
        assert_eq!(
            fs::read_to_string(dir.path().join("notes/followups.md")).unwrap(),
            "Call Jane\n\nSend deck"
        );

        assert_eq!(
            tools.list_markdown_files(),
            "Found 2 markdown file(s):\n- entities/people/jane-doe.md\n- notes/followups.md"
        );
        assert_eq!(
            tools.search_markdown_files("jane"),
            "Found 'jane' in 2 file(s):\n- entities/people/jane-doe.md (lines: 3, 6)\n- notes/followups.md (lines: 1)"
        );

        assert_eq!(tools.delete_markdown_file("notes/followups.md"), "Deleted 'notes/followups.md'.");
        assert_eq!(
            tools.read_markdown_file("notes/followups.md"),
            "Error: File 'notes/followups.md' not found"
        );
    }

    #[test]
    fn test_file_tools_stay_inside_root() {
        let outer = tempfile::tempdir().unwrap();
        fs::write(outer.path().join("secret.md"), "keep out").unwrap();
        let root = outer.path().join("kb");
        fs::create_dir_all(&root).unwrap();
        let tools = KnowledgeTools::new(KnowledgeStore::new(&root));

        assert!(tools.read_markdown_file("../secret.md").starts_with("Rejected:"));
        assert!(tools.delete_markdown_file("../secret.md").starts_with("Rejected:"));
        assert!(
            tools
                .create_markdown_file(&outer.path().join("new.md").to_string_lossy(), "x")
                .starts_with("Rejected:")
        );
        assert!(outer.path().join("secret.md").exists());
        assert!(!outer.path().join("new.md").exists());
    }
}

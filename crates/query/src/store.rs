use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use knowledge::{Category, INDEX_FILE, KnowledgeLayout, TEMPLATE_FILE};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::frontmatter::{FrontMatter, FrontMatterFormat, Relationship, parse_front_matter};

/// One markdown file of the knowledge base.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub category: Category,
    pub path: PathBuf,
    pub front: FrontMatter,
    pub body: String,
    /// The whole file, front matter included.
    #[serde(skip)]
    pub raw: String,
}

impl Record {
    /// `name`/`title` from the front matter, else the file stem.
    pub fn name(&self) -> String {
        self.front
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn date(&self) -> Option<&str> {
        self.front.text("date")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: Record,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedEntity {
    pub category: Category,
    pub entity: String,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonNetwork {
    pub person: Record,
    pub colleagues: Vec<Record>,
    pub meetings: Vec<Record>,
    pub relationships: Vec<Relationship>,
}

/// Read-only view over a rendered knowledge base. Holds no cache: every
/// call reads the category directories again.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    layout: KnowledgeLayout,
}

impl KnowledgeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: KnowledgeLayout::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Record count for every category, in fixed category order.
    pub fn categories(&self) -> Result<Vec<(Category, usize)>> {
        Category::ALL
            .iter()
            .map(|c| Ok((*c, self.load(*c)?.len())))
            .collect()
    }

    /// All records of one category. A missing directory is an empty category.
    pub fn load(&self, category: Category) -> Result<Vec<Record>> {
        let dir = self.layout.category_dir(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|e| e == "md"))
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n != INDEX_FILE && n != TEMPLATE_FILE)
            })
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(?path, error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            let (front, body) = parse_front_matter(&raw).unwrap_or_else(|| {
                debug!(?path, "No front matter");
                (
                    FrontMatter {
                        fields: Default::default(),
                        format: FrontMatterFormat::Legacy,
                    },
                    raw.clone(),
                )
            });
            records.push(Record {
                category,
                path,
                front,
                body,
                raw,
            });
        }
        Ok(records)
    }

    fn load_all(&self, only: Option<Category>) -> Result<Vec<Record>> {
        let categories: Vec<Category> = match only {
            Some(c) => vec![c],
            None => Category::ALL.to_vec(),
        };
        let mut records = Vec::new();
        for category in categories {
            records.extend(
                self.load(category)
                    .with_context(|| format!("Failed to load {}", category))?,
            );
        }
        Ok(records)
    }

    /// Case-insensitive text search over whole files, each hit with a
    /// context snippet of `radius` characters either side.
    pub fn search(&self, query: &str, category: Option<Category>, radius: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .load_all(category)?
            .into_iter()
            .filter_map(|record| {
                let snippet = snippet(&record.raw, query, radius)?;
                Some(SearchHit { record, snippet })
            })
            .collect())
    }

    /// Records whose `date` contains `period`, ignoring case.
    pub fn by_period(&self, period: &str) -> Result<Vec<Record>> {
        Ok(self
            .load_all(None)?
            .into_iter()
            .filter(|r| r.date().is_some_and(|d| contains_ignore_case(d, period)))
            .collect())
    }

    /// Records of `category` whose name or title contains `name`, ignoring case.
    pub fn find_entity(&self, category: Category, name: &str) -> Result<Vec<Record>> {
        Ok(self
            .load(category)?
            .into_iter()
            .filter(|r| contains_ignore_case(&r.name(), name))
            .collect())
    }

    /// Every relationship, in any file, whose source or target contains `name`.
    /// This is plain substring matching, so "Jan" also finds "Jane Doe".
    pub fn related(&self, name: &str) -> Result<Vec<RelatedEntity>> {
        let mut related = Vec::new();
        for record in self.load_all(None)? {
            let entity = record.name();
            for relationship in record.front.relationships() {
                if contains_ignore_case(&relationship.source, name)
                    || contains_ignore_case(&relationship.target, name)
                {
                    related.push(RelatedEntity {
                        category: record.category,
                        entity: entity.clone(),
                        relationship,
                    });
                }
            }
        }
        Ok(related)
    }

    /// The first person matching `name`, plus colleagues at the same
    /// organization and meetings that list them as an attendee.
    pub fn network(&self, name: &str) -> Result<Option<PersonNetwork>> {
        let people = self.load(Category::People)?;
        let Some(person) = people
            .iter()
            .find(|r| contains_ignore_case(&r.name(), name))
            .cloned()
        else {
            return Ok(None);
        };

        let full_name = person.name();
        let organization = person
            .front
            .text("organization")
            .filter(|o| !o.eq_ignore_ascii_case("unknown"))
            .map(str::to_string);

        let colleagues = match &organization {
            Some(org) => people
                .into_iter()
                .filter(|r| r.path != person.path)
                .filter(|r| r.front.text("organization").is_some_and(|o| o.eq_ignore_ascii_case(org)))
                .collect(),
            None => Vec::new(),
        };

        let meetings = self
            .load(Category::Meetings)?
            .into_iter()
            .filter(|m| {
                m.front
                    .list("attendees")
                    .iter()
                    .any(|a| contains_ignore_case(a, &full_name))
            })
            .collect();

        let relationships = person.front.relationships();
        Ok(Some(PersonNetwork {
            person,
            colleagues,
            meetings,
            relationships,
        }))
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// `radius` characters either side of the first case-insensitive match,
/// newlines flattened. `None` when there is no match.
pub fn snippet(text: &str, query: &str, radius: usize) -> Option<String> {
    let needle: Vec<char> = query.chars().map(lower).collect();
    if needle.is_empty() {
        return None;
    }
    let haystack: Vec<char> = text.chars().collect();
    let position = haystack
        .windows(needle.len())
        .position(|w| w.iter().zip(&needle).all(|(a, b)| lower(*a) == *b))?;

    let start = position.saturating_sub(radius);
    let end = (position + needle.len() + radius).min(haystack.len());
    Some(
        haystack[start..end]
            .iter()
            .map(|c| if *c == '\n' || *c == '\r' { ' ' } else { *c })
            .collect(),
    )
}

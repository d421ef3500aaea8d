use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Generated files the query layer and reset utility treat specially.
pub const INDEX_FILE: &str = "INDEX.md";
pub const TEMPLATE_FILE: &str = "TEMPLATE.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    People,
    Organizations,
    Technologies,
    Topics,
    Meetings,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::People,
        Category::Organizations,
        Category::Technologies,
        Category::Topics,
        Category::Meetings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::People => "people",
            Category::Organizations => "organizations",
            Category::Technologies => "technologies",
            Category::Topics => "topics",
            Category::Meetings => "meetings",
        }
    }

    /// Value of the `type` front-matter key.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Category::People => "person",
            Category::Organizations => "organization",
            Category::Technologies => "technology",
            Category::Topics => "topic",
            Category::Meetings => "meeting",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::People => "People",
            Category::Organizations => "Organizations",
            Category::Technologies => "Technologies",
            Category::Topics => "Topics",
            Category::Meetings => "Meetings",
        }
    }

    /// Path below the knowledge-base root.
    pub fn relative_dir(&self) -> PathBuf {
        match self {
            Category::Meetings => Path::new("events").join("meetings"),
            other => Path::new("entities").join(other.as_str()),
        }
    }

    /// Accepts plural and singular names, case-insensitively.
    pub fn parse(name: &str) -> Option<Category> {
        match name.trim().to_lowercase().as_str() {
            "people" | "person" | "persons" => Some(Category::People),
            "organizations" | "organization" | "organisations" | "organisation" | "orgs" => {
                Some(Category::Organizations)
            }
            "technologies" | "technology" | "tech" => Some(Category::Technologies),
            "topics" | "topic" => Some(Category::Topics),
            "meetings" | "meeting" | "events" => Some(Category::Meetings),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The markdown store's directory tree.
#[derive(Debug, Clone)]
pub struct KnowledgeLayout {
    pub root: PathBuf,
}

impl KnowledgeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.relative_dir())
    }

    pub fn entity_path(&self, category: Category, slug: &str) -> PathBuf {
        self.category_dir(category).join(format!("{}.md", slug))
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::layout::{INDEX_FILE, TEMPLATE_FILE};

const ENTITY_DIRS: [&str; 4] = ["people", "organizations", "technologies", "topics"];
const EVENT_DIRS: [&str; 3] = ["meetings", "decisions", "milestones"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    /// Files removed per `entities/<x>` or `events/<x>` directory.
    pub per_directory: BTreeMap<String, usize>,
    pub index_files: usize,
}

impl ResetReport {
    pub fn deleted(&self) -> usize {
        self.per_directory.values().sum::<usize>() + self.index_files
    }
}

/// Delete every generated markdown file below `root`, keeping templates and
/// the directory tree.
pub fn reset_knowledge_base(root: &Path) -> Result<ResetReport> {
    if !root.is_dir() {
        bail!("Markdown directory not found: {:?}", root);
    }

    let mut report = ResetReport::default();

    for name in ENTITY_DIRS {
        let dir = root.join("entities").join(name);
        let removed = clear_markdown(&dir, &[TEMPLATE_FILE, INDEX_FILE])?;
        report.per_directory.insert(format!("entities/{}", name), removed);
    }

    for name in EVENT_DIRS {
        let dir = root.join("events").join(name);
        let removed = clear_markdown(&dir, &[TEMPLATE_FILE])?;
        report.per_directory.insert(format!("events/{}", name), removed);
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && entry.file_name() == INDEX_FILE {
            fs::remove_file(entry.path())
                .with_context(|| format!("Failed to delete {:?}", entry.path()))?;
            report.index_files += 1;
        }
    }

    info!(deleted = report.deleted(), "Knowledge base reset");
    Ok(report)
}

fn clear_markdown(dir: &Path, keep: &[&str]) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut targets: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let path = entry?.path();
        let is_markdown = path.is_file() && path.extension().is_some_and(|e| e == "md");
        let kept = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| keep.contains(&n));
        if is_markdown && !kept {
            targets.push(path);
        }
    }

    for path in &targets {
        fs::remove_file(path).with_context(|| format!("Failed to delete {:?}", path))?;
    }
    debug!(?dir, removed = targets.len(), "Cleared directory");
    Ok(targets.len())
}

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("'{0}' is not a markdown file inside the knowledge base")]
    InvalidPath(String),

    #[error("File '{0}' not found")]
    NotFound(String),

    #[error("File '{0}' already exists")]
    AlreadyExists(String),

    #[error("{name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// A file with the line numbers (1-based) that matched a search.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMatch {
    pub name: String,
    pub lines: Vec<usize>,
}

/// Plain file access to the markdown tree, confined to its root. Names are
/// relative paths such as `entities/people/jane-doe.md`.
#[derive(Debug, Clone)]
pub struct MarkdownFiles {
    root: PathBuf,
}

impl MarkdownFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a name onto a path below the root. Only plain components are
    /// allowed, so `..`, absolute paths and drive prefixes are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(name.trim());
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        let markdown = relative.extension().is_some_and(|e| e == "md");
        if !plain || !markdown || relative.as_os_str().is_empty() {
            return Err(FileError::InvalidPath(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Every `.md` file below the root, as sorted relative names.
    pub fn list(&self) -> Vec<String> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        names.sort();
        names
    }

    pub fn read(&self, name: &str) -> Result<String, FileError> {
        let path = self.existing(name)?;
        fs::read_to_string(&path).map_err(|e| io_error(name, e))
    }

    /// Returns the number of characters written.
    pub fn create(&self, name: &str, content: &str) -> Result<usize, FileError> {
        let path = self.resolve(name)?;
        if path.exists() {
            return Err(FileError::AlreadyExists(name.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(name, e))?;
        }
        fs::write(&path, content).map_err(|e| io_error(name, e))?;
        info!(file = name, "Created markdown file");
        Ok(content.chars().count())
    }

    pub fn update(&self, name: &str, content: &str) -> Result<usize, FileError> {
        let path = self.existing(name)?;
        fs::write(&path, content).map_err(|e| io_error(name, e))?;
        info!(file = name, "Updated markdown file");
        Ok(content.chars().count())
    }

    /// Appends a blank line and then `content`.
    pub fn append(&self, name: &str, content: &str) -> Result<usize, FileError> {
        let path = self.existing(name)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| io_error(name, e))?;
        write!(file, "\n\n{}", content).map_err(|e| io_error(name, e))?;
        info!(file = name, "Appended to markdown file");
        Ok(content.chars().count())
    }

    pub fn delete(&self, name: &str) -> Result<(), FileError> {
        let path = self.existing(name)?;
        fs::remove_file(&path).map_err(|e| io_error(name, e))?;
        info!(file = name, "Deleted markdown file");
        Ok(())
    }

    /// Case-insensitive search over every file. Unreadable files are skipped.
    pub fn search(&self, query: &str) -> Vec<FileMatch> {
        let needle = query.to_lowercase();
        self.list()
            .into_iter()
            .filter_map(|name| {
                let content = fs::read_to_string(self.root.join(&name)).ok()?;
                let lines: Vec<usize> = content
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| line.to_lowercase().contains(&needle))
                    .map(|(i, _)| i + 1)
                    .collect();
                (!lines.is_empty()).then_some(FileMatch { name, lines })
            })
            .collect()
    }

    fn existing(&self, name: &str) -> Result<PathBuf, FileError> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(FileError::NotFound(name.to_string()));
        }
        Ok(path)
    }
}

fn io_error(name: &str, source: io::Error) -> FileError {
    FileError::Io {
        name: name.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> (tempfile::TempDir, MarkdownFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = MarkdownFiles::new(dir.path());
        (dir, files)
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let (_dir, files) = files();
        for name in ["../secret.md", "/etc/passwd.md", "entities/../../x.md", "notes.txt", "", "./notes.md"] {
            assert!(
                matches!(files.resolve(name), Err(FileError::InvalidPath(_))),
                "{:?}",
                name
            );
        }
        assert!(files.resolve("entities/people/jane-doe.md").is_ok());
    }

    #[test]
    fn test_file_lifecycle() {
        let (dir, files) = files();

        assert_eq!(files.create("notes/todo.md", "# Todo").unwrap(), 6);
        assert!(matches!(
            files.create("notes/todo.md", "again"),
            Err(FileError::AlreadyExists(_))
        ));

        files.append("notes/todo.md", "- call Jane").unwrap();
        assert_eq!(files.read("notes/todo.md").unwrap(), "# Todo\n\n- call Jane");

        files.update("notes/todo.md", "done").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("notes/todo.md")).unwrap(), "done");

        files.delete("notes/todo.md").unwrap();
        assert!(matches!(files.read("notes/todo.md"), Err(FileError::NotFound(_))));
        assert!(matches!(files.update("missing.md", "x"), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_list_and_search() {
        let (_dir, files) = files();
        files.create("entities/people/jane-doe.md", "# Jane Doe\nWorks on Azure\n").unwrap();
        files.create("b.md", "nothing here").unwrap();
        files.create("entities/people/notes.txt.md", "AZURE migration").unwrap();

        assert_eq!(
            files.list(),
            vec!["b.md", "entities/people/jane-doe.md", "entities/people/notes.txt.md"]
        );

        let matches = files.search("azure");
        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[0],
            FileMatch {
                name: "entities/people/jane-doe.md".to_string(),
                lines: vec![2],
            }
        );
        assert!(files.search("absent").is_empty());
    }
}

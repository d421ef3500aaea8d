pub mod files;
pub mod frontmatter;
pub mod store;
pub mod tools;

pub use files::{FileError, FileMatch, MarkdownFiles};
pub use frontmatter::{FieldValue, FrontMatter, FrontMatterFormat, Relationship, parse_front_matter};
pub use store::{KnowledgeStore, PersonNetwork, Record, RelatedEntity, SearchHit};
pub use tools::{KnowledgeTools, TOOLS, ToolError, ToolParam, ToolSpec};

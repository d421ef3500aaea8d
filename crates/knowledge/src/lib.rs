pub mod aggregate;
pub mod layout;
pub mod pipeline;
pub mod render;
pub mod reset;
pub mod slug;

pub use aggregate::{AggregationContext, AggregationPolicy, KnowledgeSet};
pub use layout::{Category, INDEX_FILE, KnowledgeLayout, TEMPLATE_FILE};
pub use pipeline::{BuildOptions, BuildReport, SkippedDocument, build};
pub use render::{RenderReport, Renderer};
pub use reset::{ResetReport, reset_knowledge_base};
pub use slug::{meeting_slug, slugify, wiki_link};

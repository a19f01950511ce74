// Public modules
pub mod config;
pub mod curation;
pub mod extractor;
pub mod models;
pub mod publish;
pub mod read_tracker;
pub mod render;
pub mod share;
pub mod slideshow;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{Config, DataLocation};
pub use curation::{CurationError, Curator, GeminiClient, GenerativeService};
pub use extractor::PageTextExtractor;
pub use models::{prepend_to_latest, Article, Cover, DailyEdition, Headline};
pub use publish::{process_payload, save_edition, update_index};
pub use read_tracker::ReadTracker;
pub use render::{ImageLoader, SourceImageLoader};
pub use share::{EllipsisMode, ShareArtifact, ShareCompositor};
pub use slideshow::{Slide, SlideTracker};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{DirSource, EditionSource, EditionStore, HttpSource};

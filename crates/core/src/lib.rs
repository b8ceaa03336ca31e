pub mod config;
pub mod errors;
pub mod index;
pub mod render;
pub mod summarize;
pub mod urls;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::{AnnotationStage, FlowError};
pub use index::ThreadSectionIndex;
pub use render::{TemplateEngine, TemplateError};
pub use summarize::{SummarizeError, Summarizer};
pub use urls::extract_urls;

//! Orchestration for docs-cloner.
//!
//! - [`paths`] — URL → output file mapping
//! - [`writer`] — per-page files with frontmatter and the `all-pages.md` aggregate
//! - [`processor`] — the per-page work each scheduler worker performs
//! - [`pipeline`] — the end-to-end run with progress reporting

pub mod paths;
pub mod pipeline;
pub mod processor;
pub mod writer;

pub use paths::{map_to_path, relative_path};
pub use pipeline::{ProgressReporter, RunSummary, SilentProgress, run};
pub use processor::PageProcessor;
pub use writer::{AGGREGATE_FILE, OutputWriter, PageRecord, frontmatter, render_aggregate, slugify, yaml_scalar};

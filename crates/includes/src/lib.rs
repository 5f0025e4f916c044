//! # srcgraph includes
//!
//! Best-effort textual include resolution.
//!
//! - [`get_unresolved_include_directives`] validates that every `#include` of a source tree
//!   can be found through the configured search paths.
//! - [`get_header_search_directories`] proposes search paths that would fix the rest.
//!
//! The scan does not run a preprocessor. Directives inside `#if 0` blocks or comments are
//! treated like any other line.

mod directive;
mod error;
mod log_context;
mod progress;
mod resolver;

pub use directive::{read_directives, scan_directives, IncludeDirective};
pub use error::{ResolverError, Result};
pub use log_context::{LogContext, LOG_TARGET};
pub use progress::{progress_granularity, ProgressBatcher};
pub use resolver::{
    get_header_search_directories, get_unresolved_include_directives, resolve_include,
};

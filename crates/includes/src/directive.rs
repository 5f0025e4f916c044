use crate::error::{Result, ResolverError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One `#include`-style line found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IncludeDirective {
    pub including_file: PathBuf,
    /// 1-based.
    pub line_number: u32,
    pub raw_text: String,
    /// Text between the delimiters, e.g. `lib/util.h`.
    pub include_target: String,
    /// `"..."` rather than `<...>`.
    pub uses_quotes: bool,
    /// Set by [`IncludeDirective::resolved`]; `None` straight out of a scan.
    pub resolved_path: Option<PathBuf>,
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*#\s*(?:include_next|include|import)\s*(?:<([^>"]+)>|"([^>"]+)")"#)
            .expect("include directive pattern is valid")
    })
}

/// Textual scan for include directives.
///
/// Block comments and conditional compilation are not interpreted: a directive inside
/// `#if 0` or `/* ... */` is still reported.
#[must_use]
pub fn scan_directives(including_file: &Path, content: &str) -> Vec<IncludeDirective> {
    let pattern = directive_pattern();
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let captures = pattern.captures(line)?;
            let quoted = captures.get(2);
            let target = captures.get(1).or(quoted)?.as_str().trim();
            if target.is_empty() {
                return None;
            }
            Some(IncludeDirective {
                including_file: including_file.to_path_buf(),
                line_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
                raw_text: line.trim().to_string(),
                include_target: target.to_string(),
                uses_quotes: quoted.is_some(),
                resolved_path: None,
            })
        })
        .collect()
}

/// Read `path` (lossy UTF-8) and scan it.
pub fn read_directives(path: &Path) -> Result<Vec<IncludeDirective>> {
    let bytes = fs::read(path).map_err(|source| ResolverError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(scan_directives(path, &String::from_utf8_lossy(&bytes)))
}

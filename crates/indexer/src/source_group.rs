use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a source group can tell about itself. `None` means the group kind has no such
/// setting, which is different from an empty list.
pub trait SourceGroupCapabilities {
    fn name(&self) -> Option<&str>;
    fn source_paths(&self) -> Option<&[PathBuf]>;
    fn exclude_filters(&self) -> Option<&[String]>;
    fn source_extensions(&self) -> Option<&[String]>;
    fn header_search_paths(&self) -> Option<&[PathBuf]>;
}

/// One `[[source_group]]` table of `srcgraph.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceGroup {
    Cxx(CxxSourceGroup),
    Java(JavaSourceGroup),
    Python(PythonSourceGroup),
    Custom(CustomSourceGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CxxSourceGroup {
    #[serde(default)]
    pub name: Option<String>,
    pub source_paths: Vec<PathBuf>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
    #[serde(default = "default_cxx_extensions")]
    pub source_extensions: Vec<String>,
    #[serde(default)]
    pub header_search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaSourceGroup {
    #[serde(default)]
    pub name: Option<String>,
    pub source_paths: Vec<PathBuf>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
    #[serde(default = "default_java_extensions")]
    pub source_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonSourceGroup {
    #[serde(default)]
    pub name: Option<String>,
    pub source_paths: Vec<PathBuf>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
    #[serde(default = "default_python_extensions")]
    pub source_extensions: Vec<String>,
}

/// Files handled by an external indexer; an empty extension list selects every file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSourceGroup {
    #[serde(default)]
    pub name: Option<String>,
    pub source_paths: Vec<PathBuf>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
    #[serde(default)]
    pub source_extensions: Vec<String>,
}

fn default_cxx_extensions() -> Vec<String> {
    [".c", ".cc", ".cpp", ".cxx", ".h", ".hh", ".hpp", ".hxx"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_java_extensions() -> Vec<String> {
    vec![".java".to_string()]
}

fn default_python_extensions() -> Vec<String> {
    vec![".py".to_string()]
}

impl SourceGroup {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cxx(_) => "cxx",
            Self::Java(_) => "java",
            Self::Python(_) => "python",
            Self::Custom(_) => "custom",
        }
    }
}

impl SourceGroupCapabilities for SourceGroup {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Cxx(g) => g.name.as_deref(),
            Self::Java(g) => g.name.as_deref(),
            Self::Python(g) => g.name.as_deref(),
            Self::Custom(g) => g.name.as_deref(),
        }
    }

    fn source_paths(&self) -> Option<&[PathBuf]> {
        Some(match self {
            Self::Cxx(g) => g.source_paths.as_slice(),
            Self::Java(g) => g.source_paths.as_slice(),
            Self::Python(g) => g.source_paths.as_slice(),
            Self::Custom(g) => g.source_paths.as_slice(),
        })
    }

    fn exclude_filters(&self) -> Option<&[String]> {
        Some(match self {
            Self::Cxx(g) => g.exclude_filters.as_slice(),
            Self::Java(g) => g.exclude_filters.as_slice(),
            Self::Python(g) => g.exclude_filters.as_slice(),
            Self::Custom(g) => g.exclude_filters.as_slice(),
        })
    }

    fn source_extensions(&self) -> Option<&[String]> {
        Some(match self {
            Self::Cxx(g) => g.source_extensions.as_slice(),
            Self::Java(g) => g.source_extensions.as_slice(),
            Self::Python(g) => g.source_extensions.as_slice(),
            Self::Custom(g) => g.source_extensions.as_slice(),
        })
    }

    fn header_search_paths(&self) -> Option<&[PathBuf]> {
        match self {
            Self::Cxx(g) => Some(g.header_search_paths.as_slice()),
            Self::Java(_) | Self::Python(_) | Self::Custom(_) => None,
        }
    }
}

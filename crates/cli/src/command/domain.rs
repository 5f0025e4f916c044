use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub meta: ResponseMeta,
    /// Human-readable rendering of `data`.
    #[serde(skip)]
    pub text: Vec<String>,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: CommandStatus::Error,
            hints: classify_error(&message),
            message: Some(message),
            data: Value::Null,
            meta: ResponseMeta::default(),
            text: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone)]
pub struct Hint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub text: String,
}

impl Hint {
    pub fn new(kind: HintKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Info,
    Action,
    Warn,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_updated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// What a service hands back: JSON data plus the lines shown in text mode.
pub struct CommandOutcome {
    pub data: Value,
    pub lines: Vec<String>,
    pub hints: Vec<Hint>,
    pub meta: ResponseMeta,
    /// Set when the command ran but did not achieve what was asked.
    pub failure: Option<String>,
    pub started: Instant,
}

impl CommandOutcome {
    pub fn from_value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(value)?,
            lines: Vec::new(),
            hints: Vec::new(),
            meta: ResponseMeta::default(),
            failure: None,
            started: Instant::now(),
        })
    }

    #[must_use]
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn with_hint(mut self, kind: HintKind, text: impl Into<String>) -> Self {
        self.hints.push(Hint::new(kind, text));
        self
    }
}

pub fn classify_error(message: &str) -> Vec<Hint> {
    let mut hints = Vec::new();

    if message.contains("needs an indexed store") {
        hints.push(Hint::new(
            HintKind::Action,
            "Run `srcgraph index --mode all` to build the store first.",
        ));
    }

    if message.contains("locked") {
        hints.push(Hint::new(
            HintKind::Action,
            "Another indexing run holds the store lock; wait for it or remove a stale lock file.",
        ));
    }

    if message.contains("Config error") || message.contains("TOML error") {
        hints.push(Hint::new(
            HintKind::Action,
            "Check srcgraph.toml in the project root or the file passed with --config.",
        ));
    }

    hints
}

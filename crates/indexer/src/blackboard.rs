use std::collections::HashMap;

/// Keys written by the pipeline stages.
pub mod keys {
    /// Seconds spent clearing stale entries (float).
    pub const CLEAR_TIME: &str = "clear_time";
    /// Seconds spent indexing (float).
    pub const INDEX_TIME: &str = "index_time";
    pub const INDEXED_SOURCE_FILE_COUNT: &str = "indexed_source_file_count";
    pub const SOURCE_FILE_COUNT: &str = "source_file_count";
    pub const INTERRUPTED_INDEXING: &str = "interrupted_indexing";
    pub const SHALLOW_INDEXING: &str = "shallow_indexing";
    pub const KEEP_DATABASE: &str = "keep_database";
    pub const DISCARD_DATABASE: &str = "discard_database";
    pub const REFRESH_DATABASE: &str = "refresh_database";
    pub const UNRESOLVED_INCLUDE_COUNT: &str = "unresolved_include_count";
    pub const INCLUDE_VALIDATION_DONE: &str = "include_validation_done";
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlackboardValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Types that can live on the [`Blackboard`].
pub trait BlackboardType: Sized {
    fn into_value(self) -> BlackboardValue;
    fn from_value(value: &BlackboardValue) -> Option<Self>;
}

impl BlackboardType for bool {
    fn into_value(self) -> BlackboardValue {
        BlackboardValue::Bool(self)
    }

    fn from_value(value: &BlackboardValue) -> Option<Self> {
        match value {
            BlackboardValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl BlackboardType for i64 {
    fn into_value(self) -> BlackboardValue {
        BlackboardValue::Int(self)
    }

    fn from_value(value: &BlackboardValue) -> Option<Self> {
        match value {
            BlackboardValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl BlackboardType for usize {
    fn into_value(self) -> BlackboardValue {
        BlackboardValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }

    fn from_value(value: &BlackboardValue) -> Option<Self> {
        match value {
            BlackboardValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl BlackboardType for f64 {
    fn into_value(self) -> BlackboardValue {
        BlackboardValue::Float(self)
    }

    fn from_value(value: &BlackboardValue) -> Option<Self> {
        match value {
            BlackboardValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl BlackboardType for String {
    fn into_value(self) -> BlackboardValue {
        BlackboardValue::Str(self)
    }

    fn from_value(value: &BlackboardValue) -> Option<Self> {
        match value {
            BlackboardValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Typed key/value scratchpad for one orchestration run.
///
/// Owned by the pipeline and lent to each task while it runs. It is only touched from the
/// controlling thread; workers report back through channels instead.
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    values: HashMap<String, BlackboardValue>,
}

impl Blackboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: BlackboardType>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), value.into_value());
    }

    /// `None` when the key is absent or holds a value of another type.
    #[must_use]
    pub fn get<T: BlackboardType>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_value)
    }

    #[must_use]
    pub fn get_or<T: BlackboardType>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// One step in a [`FieldPath`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Dotted address of a value inside a document, e.g. `ai.backends[1].model`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PathParseError {
    #[error("path is empty")]
    Empty,
    #[error("path '{input}' contains an empty segment")]
    EmptySegment { input: String },
    #[error("path '{input}' has an unterminated index")]
    UnclosedIndex { input: String },
    #[error("path '{input}' has an invalid index '{index}'")]
    InvalidIndex { input: String, index: String },
    #[error("path '{input}' has unexpected characters after an index")]
    Malformed { input: String },
}

impl FieldPath {
    pub fn root() -> Self {
        FieldPath::default()
    }

    /// Path addressing a whole category record.
    pub fn category(name: &str) -> Self {
        FieldPath {
            segments: vec![PathSegment::Key(name.to_owned())],
        }
    }

    /// Path addressing `category.field`.
    pub fn field(category: &str, field: &str) -> Self {
        FieldPath::category(category).key(field)
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Category name, i.e. the leading key.
    pub fn category_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Top-level field name within the category.
    pub fn field_name(&self) -> Option<&str> {
        match self.segments.get(1) {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Last key segment, skipping trailing indices.
    pub fn leaf_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(FieldPath { segments })
    }

    pub fn is_within_category(&self, category: &str) -> bool {
        self.category_name() == Some(category)
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Parse the dotted form produced by [`fmt::Display`].
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathParseError::Empty);
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(PathParseError::EmptySegment {
                    input: input.to_owned(),
                });
            }
            segments.push(PathSegment::Key(name.to_owned()));

            while !rest.is_empty() {
                let Some(open) = rest.strip_prefix('[') else {
                    return Err(PathParseError::Malformed {
                        input: input.to_owned(),
                    });
                };
                let Some(close) = open.find(']') else {
                    return Err(PathParseError::UnclosedIndex {
                        input: input.to_owned(),
                    });
                };
                let raw = &open[..close];
                let index = raw
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex {
                        input: input.to_owned(),
                        index: raw.to_owned(),
                    })?;
                segments.push(PathSegment::Index(index));
                rest = &open[close + 1..];
            }
        }

        Ok(FieldPath { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if idx > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = PathParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(value)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_nested_item_paths() {
        let path = FieldPath::field("ai", "backends").index(2).key("model");
        assert_eq!(path.to_string(), "ai.backends[2].model");
        assert_eq!(path.category_name(), Some("ai"));
        assert_eq!(path.field_name(), Some("backends"));
        assert_eq!(path.leaf_key(), Some("model"));
    }

    #[test]
    fn parses_display_form() {
        let parsed = FieldPath::parse("ai.backends[2].model").unwrap();
        assert_eq!(parsed, FieldPath::field("ai", "backends").index(2).key("model"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(FieldPath::parse("  "), Err(PathParseError::Empty));
        assert!(matches!(
            FieldPath::parse("git..gpgKey"),
            Err(PathParseError::EmptySegment { .. })
        ));
        assert!(matches!(
            FieldPath::parse("ai.backends[x]"),
            Err(PathParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            FieldPath::parse("ai.backends[1"),
            Err(PathParseError::UnclosedIndex { .. })
        ));
        assert!(matches!(
            FieldPath::parse("ai.backends[1]x"),
            Err(PathParseError::Malformed { .. })
        ));
    }
}

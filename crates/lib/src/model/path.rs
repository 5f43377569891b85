//! Path types for addressing nodes and values inside a document.
//!
//! Paths are dot-separated ASCII segments relative to a document's root
//! map. The empty string is the root itself. Parsing is strict: empty
//! segments, control characters and non-ASCII input are rejected rather
//! than normalized away.
//!
//! Whether a segment is a map key or a list index is not decided here.
//! A [`PathBuf`] only holds raw components; the resolver turns each one
//! into a [`Segment`] once it knows the runtime type of the container it
//! is walking through.
//!
//! ```rust
//! # use sharedoc::model::PathBuf;
//! let path = PathBuf::parse("mapOne.list.0")?;
//! assert_eq!(path.components().collect::<Vec<_>>(), vec!["mapOne", "list", "0"]);
//! assert_eq!(path.parent().map(|p| p.to_string()), Some("mapOne.list".to_string()));
//! assert!(PathBuf::parse("a..b").is_err());
//! # Ok::<(), sharedoc::model::PathError>(())
//! ```

use std::{fmt, str::FromStr};

use super::errors::PathError;

/// Separator between path components.
pub const SEPARATOR: char = '.';

/// One resolved step of a path: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            Segment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// Checks a single component: non-empty, printable ASCII, no separator.
pub(crate) fn validate_component(component: &str) -> Result<(), String> {
    if component.is_empty() {
        return Err("empty segment".to_string());
    }
    if let Some(c) = component
        .chars()
        .find(|c| !c.is_ascii() || c.is_ascii_control() || *c == SEPARATOR)
    {
        return Err(format!("invalid character {c:?}"));
    }
    Ok(())
}

/// An owned, validated path relative to a document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathBuf {
    inner: String,
}

impl PathBuf {
    /// The root path.
    pub fn new() -> Self {
        Self {
            inner: String::new(),
        }
    }

    /// Parses and validates a path string.
    ///
    /// # Errors
    /// Returns [`PathError::Malformed`] for empty segments (`a..b`, `.a`,
    /// `a.`) and for control or non-ASCII characters.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Ok(Self::new());
        }
        for component in input.split(SEPARATOR) {
            validate_component(component).map_err(|reason| PathError::Malformed {
                path: input.to_string(),
                reason,
            })?;
        }
        Ok(Self {
            inner: input.to_string(),
        })
    }

    /// Builds a path from already-resolved segments, root first.
    ///
    /// Keys are assumed valid; map keys are checked when they are written.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Self {
        segments
            .into_iter()
            .fold(Self::new(), |path, segment| path.push(segment))
    }

    /// Appends one segment.
    pub fn push(mut self, segment: &Segment) -> Self {
        if !self.inner.is_empty() {
            self.inner.push(SEPARATOR);
        }
        self.inner.push_str(&segment.to_string());
        self
    }

    /// Joins another path onto this one.
    pub fn join(mut self, other: &PathBuf) -> Self {
        if self.inner.is_empty() {
            self.inner = other.inner.clone();
        } else if !other.inner.is_empty() {
            self.inner.push(SEPARATOR);
            self.inner.push_str(&other.inner);
        }
        self
    }

    /// Returns an iterator over the raw components.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.inner.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Returns the number of components in the path.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<PathBuf> {
        if self.inner.is_empty() {
            return None;
        }
        Some(match self.inner.rfind(SEPARATOR) {
            Some(last) => PathBuf {
                inner: self.inner[..last].to_string(),
            },
            None => PathBuf::new(),
        })
    }

    /// Returns the last component, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components().next_back()
    }

    /// Returns true if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &PathBuf) -> bool {
        other.is_root()
            || self.inner == other.inner
            || (self.inner.starts_with(&other.inner)
                && self.inner[other.inner.len()..].starts_with(SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl AsRef<str> for PathBuf {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl FromStr for PathBuf {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for PathBuf {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl fmt::Display for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl serde::Serialize for PathBuf {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> serde::Deserialize<'de> for PathBuf {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PathBuf::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Constructs a [`PathBuf`] from segments.
///
/// - `path!()` - the root path
/// - `path!("a", 0usize, "b")` - keys and indices mixed
///
/// ```rust
/// # use sharedoc::path;
/// let p = path!("list", 2usize, "name");
/// assert_eq!(p.as_str(), "list.2.name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::model::PathBuf::new()
    };
    ($($seg:expr),+ $(,)?) => {{
        let path = $crate::model::PathBuf::new();
        $(let path = path.push(&$crate::model::Segment::from($seg));)+
        path
    }};
}

//! Text node with range annotations.
//!
//! Offsets are character offsets (Unicode scalar values), never bytes.
//! Annotations are half-open `[start, end)` ranges carrying a key and a
//! string value, such as `style/fontWeight = bold` or `link = https://…`.
//!
//! The annotation set is kept normalized at every observable point:
//!
//! - spans with the same key never overlap,
//! - adjacent spans with the same key and value are merged,
//! - empty spans are dropped.
//!
//! Clearing an annotation (setting it to `None`) removes the key from the
//! range, splitting any span that straddles a range boundary. Inserted text
//! starts out unannotated: an insertion inside a span splits it.

use super::errors::ModelError;

/// One annotated range of a text node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Normalized set of annotations, ordered by key then start offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSet {
    spans: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Value of `key` at `offset`, if any span covers it.
    pub fn value_at(&self, offset: usize, key: &str) -> Option<&str> {
        self.spans
            .iter()
            .find(|a| a.key == key && a.contains(offset))
            .map(|a| a.value.as_str())
    }

    /// Sets or clears `key` over `[start, end)`.
    pub fn set(&mut self, start: usize, end: usize, key: &str, value: Option<&str>) {
        if start >= end {
            return;
        }
        let mut kept = Vec::with_capacity(self.spans.len() + 2);
        for span in self.spans.drain(..) {
            if span.key != key || span.end <= start || span.start >= end {
                kept.push(span);
                continue;
            }
            if span.start < start {
                kept.push(Annotation {
                    end: start,
                    ..span.clone()
                });
            }
            if span.end > end {
                kept.push(Annotation { start: end, ..span });
            }
        }
        if let Some(value) = value {
            kept.push(Annotation::new(key, value, start, end));
        }
        self.spans = kept;
        self.normalize();
    }

    /// Shifts spans for `len` characters inserted at `offset`.
    ///
    /// Inserted characters carry no annotations, so a span that straddles
    /// the insertion point is split around them.
    pub fn shift_for_insert(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let mut split = Vec::new();
        for span in &mut self.spans {
            if offset <= span.start {
                span.start += len;
                span.end += len;
            } else if offset < span.end {
                split.push(Annotation {
                    start: offset + len,
                    end: span.end + len,
                    ..span.clone()
                });
                span.end = offset;
            }
        }
        if !split.is_empty() {
            self.spans.extend(split);
            self.normalize();
        }
    }

    /// Shrinks or drops spans for the deletion of `[start, end)`.
    pub fn shift_for_delete(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let removed = end - start;
        let map = |x: usize| {
            if x <= start {
                x
            } else if x >= end {
                x - removed
            } else {
                start
            }
        };
        for span in &mut self.spans {
            span.start = map(span.start);
            span.end = map(span.end);
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.spans.retain(|a| a.start < a.end);
        self.spans
            .sort_by(|a, b| a.key.cmp(&b.key).then(a.start.cmp(&b.start)));
        let mut merged: Vec<Annotation> = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            match merged.last_mut() {
                Some(last)
                    if last.key == span.key
                        && last.value == span.value
                        && span.start <= last.end =>
                {
                    last.end = last.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }
        self.spans = merged;
    }
}

/// A mutable character sequence plus its annotations.
///
/// ```
/// # use sharedoc::model::TextNode;
/// let mut text = TextNode::from("Hello world");
/// text.set_annotation(0, 5, "style/fontWeight", Some("bold")).unwrap();
/// text.insert(5, ",").unwrap();
/// assert_eq!(text.as_str(), "Hello, world");
/// assert_eq!(text.annotation_at(4, "style/fontWeight"), Some("bold"));
/// assert_eq!(text.annotation_at(5, "style/fontWeight"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextNode {
    content: String,
    len: usize,
    annotations: AnnotationSet,
}

impl TextNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.annotations.as_slice()
    }

    pub fn annotation_at(&self, offset: usize, key: &str) -> Option<&str> {
        self.annotations.value_at(offset, key)
    }

    /// Characters in `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<String, ModelError> {
        self.check_range(start, end)?;
        Ok(self.content.chars().skip(start).take(end - start).collect())
    }

    /// Inserts `text` at character `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), ModelError> {
        self.check_range(offset, offset)?;
        let byte = self.byte_offset(offset);
        self.content.insert_str(byte, text);
        let added = text.chars().count();
        self.len += added;
        self.annotations.shift_for_insert(offset, added);
        Ok(())
    }

    /// Deletes `[start, end)` and returns the removed characters.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<String, ModelError> {
        self.check_range(start, end)?;
        let from = self.byte_offset(start);
        let to = self.byte_offset(end);
        let removed: String = self.content.drain(from..to).collect();
        self.len -= end - start;
        self.annotations.shift_for_delete(start, end);
        Ok(removed)
    }

    /// Sets `key` to `value` over `[start, end)`, or clears it for `None`.
    pub fn set_annotation(
        &mut self,
        start: usize,
        end: usize,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), ModelError> {
        self.check_range(start, end)?;
        self.annotations.set(start, end, key, value);
        Ok(())
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), ModelError> {
        if start > end || end > self.len {
            return Err(ModelError::RangeOutOfBounds {
                start,
                end,
                len: self.len,
            });
        }
        Ok(())
    }

    fn byte_offset(&self, offset: usize) -> usize {
        self.content
            .char_indices()
            .nth(offset)
            .map_or(self.content.len(), |(byte, _)| byte)
    }
}

impl From<&str> for TextNode {
    fn from(text: &str) -> Self {
        Self {
            content: text.to_string(),
            len: text.chars().count(),
            annotations: AnnotationSet::new(),
        }
    }
}

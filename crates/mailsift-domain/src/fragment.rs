//! Fragment module - raw, labeled extraction units returned by the backend
//!
//! A fragment is one piece of information the generation backend attributed
//! to the source document: an entity mention, a scalar value, or a bundle of
//! record attributes. Fragments are consumed by reconciliation and never
//! persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Half-open character interval `[start, end)` into the source document
///
/// Offsets count Unicode scalar values, not bytes. Spans are best-effort
/// highlighting hints and carry no correctness guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Inclusive start offset
    pub start: usize,

    /// Exclusive end offset
    pub end: usize,
}

impl SourceSpan {
    /// Create a span, swapping the bounds if they arrive reversed
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the span covers nothing
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shrink the end boundary by `chars`, never moving it before `start`
    pub fn shrink_end(&self, chars: usize) -> Self {
        Self {
            start: self.start,
            end: self.end.saturating_sub(chars).max(self.start),
        }
    }
}

/// An attribute value attached to a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single string
    Text(String),

    /// A list of strings
    List(Vec<String>),
}

impl AttributeValue {
    /// View the value as a list, wrapping a bare string as one element
    ///
    /// Blank strings contribute nothing.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            AttributeValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s.to_string()]
                }
            }
            AttributeValue::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// View the value as a single string, joining lists with ", "
    pub fn to_text(&self) -> String {
        match self {
            AttributeValue::Text(s) => s.trim().to_string(),
            AttributeValue::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(items: Vec<String>) -> Self {
        AttributeValue::List(items)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(items: Vec<&str>) -> Self {
        AttributeValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// One labeled unit of extracted information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFragment {
    /// Semantic role of the fragment (e.g. "person", "header_info")
    pub class_label: String,

    /// Verbatim source text the backend attributed to the fragment
    #[serde(default)]
    pub matched_text: String,

    /// Field name → value
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Highlighting hint into the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_span: Option<SourceSpan>,
}

impl ExtractionFragment {
    /// Create a fragment with matched text and no attributes
    pub fn new(class_label: impl Into<String>, matched_text: impl Into<String>) -> Self {
        Self {
            class_label: class_label.into(),
            matched_text: matched_text.into(),
            attributes: BTreeMap::new(),
            source_span: None,
        }
    }

    /// Attach an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach a source span
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.source_span = Some(SourceSpan::new(start, end));
        self
    }
}

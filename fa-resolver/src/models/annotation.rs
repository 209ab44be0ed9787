//! Annotation documents
//!
//! An annotation page stores one JSON document per file:
//! `{"annotations": [{"content": ..., "x": ..., "y": ..., "width": ..., "height": ...}]}`.
//! Identity of an annotation is its position in that list.

use fa_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// One positioned box of markup over an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Wikitext shown in the box
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Annotation {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            x: None,
            y: None,
            width: None,
            height: None,
        }
    }

    pub fn with_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Check a submitted annotation before it is written
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::InvalidInput("annotation content is empty".to_string()));
        }

        for (name, value) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::InvalidInput(format!("{} is not a finite number", name)));
                }
            }
        }

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if matches!(value, Some(v) if v < 0.0) {
                return Err(Error::InvalidInput(format!("{} is negative", name)));
            }
        }

        Ok(())
    }
}

/// Stored JSON document of an annotation page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotationDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Ordered annotations of one file, with the revision they were read at
///
/// `revision` is `None` for a page that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    pub annotations: Vec<Annotation>,
    pub revision: Option<i64>,
}

impl AnnotationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn document(&self) -> AnnotationDocument {
        AnnotationDocument {
            annotations: self.annotations.clone(),
        }
    }
}

/// One annotation as returned by the batch query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// The stored wikitext
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Position in the owning list
    pub index: usize,
    /// Rendered (and possibly enriched) HTML; present only when parsing was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<String>,
}

impl AnnotationData {
    pub fn from_annotation(index: usize, annotation: &Annotation) -> Self {
        Self {
            text: annotation.content.clone(),
            x: annotation.x,
            y: annotation.y,
            width: annotation.width,
            height: annotation.height,
            index,
            parsed: None,
        }
    }
}

//! Annotation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{MAX_TAGS, MAX_TAG_LEN};
use crate::error::{AppError, Result};

/// Longest note an annotation may carry
pub const MAX_ANNOTATION_TEXT_LEN: usize = 1000;

/// Longest reply text
pub const MAX_REPLY_TEXT_LEN: usize = 500;

/// A page-anchored markup record on a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub document_id: String,
    pub author_id: String,
    /// 1-indexed page the annotation is anchored to
    pub page: i64,
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    pub content: AnnotationContent,
    pub is_private: bool,
    pub is_resolved: bool,
    pub tags: Vec<String>,
    /// Insertion-ordered; append-only unless explicitly deleted
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of annotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    #[default]
    Highlight,
    Text,
    Rectangle,
    Circle,
    Arrow,
    Freehand,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Highlight => "highlight",
            AnnotationType::Text => "text",
            AnnotationType::Rectangle => "rectangle",
            AnnotationType::Circle => "circle",
            AnnotationType::Arrow => "arrow",
            AnnotationType::Freehand => "freehand",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "highlight" => Some(AnnotationType::Highlight),
            "text" => Some(AnnotationType::Text),
            "rectangle" => Some(AnnotationType::Rectangle),
            "circle" => Some(AnnotationType::Circle),
            "arrow" => Some(AnnotationType::Arrow),
            "freehand" => Some(AnnotationType::Freehand),
            _ => None,
        }
    }
}

/// Free-form annotation content
///
/// Which fields are meaningful depends on the annotation type: highlights use
/// a bounding box, freehand a polyline, text a coordinate point. The server
/// stores whatever combination the client sends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<AnnotationStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Visual style for an annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Some("#FFFF00".to_string()),
            opacity: Some(0.5),
            stroke_width: None,
            font_size: None,
        }
    }
}

/// A threaded comment on an annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    /// Create a reply with a server-assigned id and timestamp
    pub fn new(author_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Annotation {
    /// Create a new annotation with server defaults
    pub fn new(document_id: &str, author_id: &str, page: i64, annotation_type: AnnotationType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            author_id: author_id.to_string(),
            page,
            annotation_type,
            content: AnnotationContent::default().with_style_defaults(),
            is_private: false,
            is_resolved: false,
            tags: Vec::new(),
            replies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_content(mut self, content: AnnotationContent) -> Self {
        self.content = content.with_style_defaults();
        self
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    /// Validate page number, text length, tags, and style ranges
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(AppError::Validation(
                "Page number must be a positive integer".to_string(),
            ));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(AppError::Validation(format!(
                "At most {} tags allowed",
                MAX_TAGS
            )));
        }
        for tag in &self.tags {
            if tag.is_empty() || tag.len() > MAX_TAG_LEN {
                return Err(AppError::Validation(format!(
                    "Tags must be 1-{} characters",
                    MAX_TAG_LEN
                )));
            }
        }
        self.content.validate()
    }
}

impl AnnotationContent {
    /// Fill in the server's style defaults when the client sent none
    pub fn with_style_defaults(mut self) -> Self {
        if self.style.is_none() {
            self.style = Some(AnnotationStyle::default());
        }
        self
    }

    /// Shallow merge: fields present in the patch replace, absent fields are
    /// preserved
    pub fn merge(&mut self, patch: AnnotationContent) {
        if patch.text.is_some() {
            self.text = patch.text;
        }
        if patch.coordinates.is_some() {
            self.coordinates = patch.coordinates;
        }
        if patch.bounding_box.is_some() {
            self.bounding_box = patch.bounding_box;
        }
        if patch.points.is_some() {
            self.points = patch.points;
        }
        if patch.style.is_some() {
            self.style = patch.style;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ref text) = self.text {
            if text.len() > MAX_ANNOTATION_TEXT_LEN {
                return Err(AppError::Validation(format!(
                    "Annotation text exceeds {} characters",
                    MAX_ANNOTATION_TEXT_LEN
                )));
            }
        }
        if let Some(ref style) = self.style {
            style.validate()?;
        }
        Ok(())
    }
}

impl AnnotationStyle {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref color) = self.color {
            if !is_valid_hex_color(color) {
                return Err(AppError::Validation(format!(
                    "Invalid color '{}': expected #RGB or #RRGGBB",
                    color
                )));
            }
        }
        if let Some(opacity) = self.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(AppError::Validation(
                    "Opacity must be between 0 and 1".to_string(),
                ));
            }
        }
        if let Some(stroke_width) = self.stroke_width {
            if !(1.0..=10.0).contains(&stroke_width) {
                return Err(AppError::Validation(
                    "Stroke width must be between 1 and 10".to_string(),
                ));
            }
        }
        if let Some(font_size) = self.font_size {
            if !(8.0..=72.0).contains(&font_size) {
                return Err(AppError::Validation(
                    "Font size must be between 8 and 72".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Accepts 3- or 6-digit hex colors with a leading '#'
fn is_valid_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Trim and validate reply text
pub fn validate_reply_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Reply text must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_REPLY_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Reply text exceeds {} characters",
            MAX_REPLY_TEXT_LEN
        )));
    }
    Ok(trimmed.to_string())
}

//! Storage types

use chrono::{DateTime, Utc};

/// Metadata about a stored blob
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: i64,
    /// MIME type, when the backend records one
    pub content_type: Option<String>,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
}

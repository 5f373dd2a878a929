//! Upload types

/// A validated upload, ready to be persisted
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    /// Server-minted blob key, unique per upload
    pub storage_key: String,

    /// File name as the client sent it
    pub original_name: String,

    /// Byte size of the file
    pub size: u64,

    /// The file bytes
    pub data: Vec<u8>,

    /// Sibling form fields
    pub fields: UploadFields,
}

/// Optional document metadata sent alongside the file
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Defaults to false when the form omits the field
    pub is_public: bool,
}

//! SQLite storage for documents
//!
//! The documents table is the authoritative record; blob deletion after a
//! document delete is best-effort and handled by the caller.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;

use super::types::{Document, DocumentMetadata, DocumentStatus};

/// Repository for document persistence
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

/// Optional filters for document listings
#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    /// Case-insensitive substring match over title, description, and tags
    pub search: Option<String>,
    /// Keep documents whose tag set intersects this one
    pub tags: Vec<String>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, title, description, storage_key, file_name, file_size,
           content_type, page_count, owner_id, is_public, tags_json, status,
           metadata_json, access_count, last_accessed_at, created_at, updated_at
    FROM documents
"#;

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document
    pub async fn insert(&self, doc: &Document) -> Result<()> {
        let tags_json = serde_json::to_string(&doc.tags)?;
        let metadata_json = doc
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, description, storage_key, file_name, file_size,
                content_type, page_count, owner_id, is_public, tags_json,
                status, metadata_json, access_count, last_accessed_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(&doc.storage_key)
        .bind(&doc.file_name)
        .bind(doc.file_size)
        .bind(&doc.content_type)
        .bind(doc.page_count)
        .bind(&doc.owner_id)
        .bind(doc.is_public as i64)
        .bind(&tags_json)
        .bind(doc.status.as_str())
        .bind(&metadata_json)
        .bind(doc.access_count)
        .bind(doc.last_accessed_at.map(|t| t.to_rfc3339()))
        .bind(doc.created_at.to_rfc3339())
        .bind(doc.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get a document by ID
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(|r| r.into_document()).transpose()
    }

    /// List a user's documents, newest first, with a total for pagination
    pub async fn list_owned(
        &self,
        owner_id: &str,
        filter: &DocumentFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Document>, i64)> {
        self.list(Some(owner_id), false, filter, page, limit).await
    }

    /// List public documents, newest first, with a total for pagination
    pub async fn list_public(
        &self,
        filter: &DocumentFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Document>, i64)> {
        self.list(None, true, filter, page, limit).await
    }

    async fn list(
        &self,
        owner_id: Option<&str>,
        public_only: bool,
        filter: &DocumentFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Document>, i64)> {
        // Every predicate parameter is a string, so conditions and binds
        // build up side by side
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(owner) = owner_id {
            conditions.push("owner_id = ?".to_string());
            params.push(owner.to_string());
        }
        if public_only {
            conditions.push("is_public = 1".to_string());
        }
        if let Some(ref search) = filter.search {
            conditions.push(
                "(title LIKE '%' || ? || '%' \
                 OR IFNULL(description, '') LIKE '%' || ? || '%' \
                 OR tags_json LIKE '%' || ? || '%')"
                    .to_string(),
            );
            params.extend([search.clone(), search.clone(), search.clone()]);
        }
        if !filter.tags.is_empty() {
            let per_tag: Vec<&str> = filter
                .tags
                .iter()
                .map(|_| "instr(tags_json, ?) > 0")
                .collect();
            conditions.push(format!("({})", per_tag.join(" OR ")));
            for tag in &filter.tags {
                // Tags live in a JSON array, so an exact member match is a
                // quoted-substring check
                params.push(format!("\"{}\"", tag));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        // Total first, with the same predicate, for pagination math
        let count_sql = format!("SELECT COUNT(*) FROM documents{}", where_clause);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let (total,) = count_query.fetch_one(self.pool).await?;

        let offset = (page.max(1) - 1) * limit;
        let list_sql = format!(
            "{}{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );
        let mut list_query = sqlx::query_as::<_, DocumentRow>(&list_sql);
        for param in &params {
            list_query = list_query.bind(param);
        }
        let rows = list_query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let documents = rows
            .into_iter()
            .map(|r| r.into_document())
            .collect::<Result<Vec<_>>>()?;

        Ok((documents, total))
    }

    /// Record one successful authorized read: bump the access counter and
    /// stamp last-accessed in a single atomic update
    pub async fn touch_access(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET access_count = access_count + 1, last_accessed_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Apply the provided subset of mutable fields
    pub async fn update(&self, doc: &Document) -> Result<()> {
        let tags_json = serde_json::to_string(&doc.tags)?;

        sqlx::query(
            r#"
            UPDATE documents
            SET title = ?, description = ?, tags_json = ?, is_public = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(&tags_json)
        .bind(doc.is_public as i64)
        .bind(doc.updated_at.to_rfc3339())
        .bind(&doc.id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a document and all of its annotations in one transaction
    ///
    /// The metadata deletion is authoritative; the caller deletes the blob
    /// afterwards, best-effort.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM annotations WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    description: Option<String>,
    storage_key: String,
    file_name: String,
    file_size: i64,
    content_type: String,
    page_count: Option<i64>,
    owner_id: String,
    is_public: i64,
    tags_json: String,
    status: String,
    metadata_json: Option<String>,
    access_count: i64,
    last_accessed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let tags: Vec<String> = serde_json::from_str(&self.tags_json)?;
        let metadata: Option<DocumentMetadata> = self
            .metadata_json
            .as_ref()
            .map(|s| serde_json::from_str(s))
            .transpose()?;

        let last_accessed_at = self
            .last_accessed_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()?
            .map(|t| t.with_timezone(&Utc));
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);

        Ok(Document {
            id: self.id,
            title: self.title,
            description: self.description,
            storage_key: self.storage_key,
            file_name: self.file_name,
            file_size: self.file_size,
            content_type: self.content_type,
            page_count: self.page_count,
            owner_id: self.owner_id,
            is_public: self.is_public != 0,
            tags,
            status: DocumentStatus::from_str(&self.status),
            metadata,
            access_count: self.access_count,
            last_accessed_at,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, AnnotationRepository, Reply};

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::initialize_schema(&pool).await.unwrap();
        pool
    }

    fn doc(owner: &str, title: &str) -> Document {
        Document::new(
            title,
            &format!("documents/{}.pdf", uuid::Uuid::new_v4()),
            "file.pdf",
            1024,
            owner,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let mut document = doc("user-1", "Thesis");
        document.tags = vec!["research".to_string()];
        document.metadata = Some(DocumentMetadata {
            author: Some("A. Author".to_string()),
            ..Default::default()
        });
        repo.insert(&document).await.unwrap();

        let loaded = repo.get(&document.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Thesis");
        assert_eq!(loaded.tags, vec!["research"]);
        assert_eq!(
            loaded.metadata.unwrap().author.as_deref(),
            Some("A. Author")
        );
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_key_unique() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let a = doc("user-1", "A");
        let mut b = doc("user-1", "B");
        b.storage_key = a.storage_key.clone();

        repo.insert(&a).await.unwrap();
        assert!(repo.insert(&b).await.is_err());
    }

    #[tokio::test]
    async fn test_list_owned_pagination() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        for i in 0..21 {
            repo.insert(&doc("user-1", &format!("Doc {}", i)))
                .await
                .unwrap();
        }
        repo.insert(&doc("user-2", "Other")).await.unwrap();

        let filter = DocumentFilter::default();
        let (page1, total) = repo.list_owned("user-1", &filter, 1, 10).await.unwrap();
        assert_eq!(total, 21);
        assert_eq!(page1.len(), 10);

        let (page3, _) = repo.list_owned("user-1", &filter, 3, 10).await.unwrap();
        assert_eq!(page3.len(), 1);
    }

    #[tokio::test]
    async fn test_list_search_and_tags() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let mut a = doc("user-1", "Quarterly Report");
        a.tags = vec!["finance".to_string()];
        let mut b = doc("user-1", "Holiday photos");
        b.description = Some("scanned REPORT of the trip".to_string());
        let mut c = doc("user-1", "Notes");
        c.tags = vec!["personal".to_string()];

        for d in [&a, &b, &c] {
            repo.insert(d).await.unwrap();
        }

        // Case-insensitive substring over title and description
        let filter = DocumentFilter {
            search: Some("report".to_string()),
            tags: vec![],
        };
        let (found, total) = repo.list_owned("user-1", &filter, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert!(found.iter().any(|d| d.id == a.id));
        assert!(found.iter().any(|d| d.id == b.id));

        // Tag intersection
        let filter = DocumentFilter {
            search: None,
            tags: vec!["finance".to_string(), "legal".to_string()],
        };
        let (found, total) = repo.list_owned("user-1", &filter, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, a.id);
    }

    #[tokio::test]
    async fn test_list_public_ignores_owner() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let mut a = doc("user-1", "Public A");
        a.is_public = true;
        let b = doc("user-2", "Private B");
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        let (found, total) = repo
            .list_public(&DocumentFilter::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, a.id);
    }

    #[tokio::test]
    async fn test_touch_access() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let document = doc("user-1", "Counted");
        repo.insert(&document).await.unwrap();

        repo.touch_access(&document.id).await.unwrap();
        repo.touch_access(&document.id).await.unwrap();

        let loaded = repo.get(&document.id).await.unwrap().unwrap();
        assert_eq!(loaded.access_count, 2);
        assert!(loaded.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn test_update_partial() {
        let pool = setup_test_db().await;
        let repo = DocumentRepository::new(&pool);

        let mut document = doc("user-1", "Before");
        document.description = Some("keep me".to_string());
        repo.insert(&document).await.unwrap();

        document.title = "After".to_string();
        document.is_public = true;
        document.updated_at = Utc::now();
        repo.update(&document).await.unwrap();

        let loaded = repo.get(&document.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "After");
        assert!(loaded.is_public);
        assert_eq!(loaded.description.as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_delete_cascades_annotations_and_replies() {
        let pool = setup_test_db().await;
        let docs = DocumentRepository::new(&pool);
        let annotations = AnnotationRepository::new(&pool);

        let document = doc("user-1", "Doomed");
        docs.insert(&document).await.unwrap();

        for _ in 0..3 {
            let mut ann = Annotation::new(&document.id, "user-2", 1, Default::default());
            ann.replies.push(Reply::new("user-3", "a reply"));
            annotations.insert(&ann).await.unwrap();
        }

        assert!(docs.delete(&document.id).await.unwrap());
        assert!(docs.get(&document.id).await.unwrap().is_none());

        let (remaining,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM annotations WHERE document_id = ?")
                .bind(&document.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(remaining, 0);

        // Deleting again reports not found
        assert!(!docs.delete(&document.id).await.unwrap());
    }
}

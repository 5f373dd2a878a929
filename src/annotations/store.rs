//! SQLite storage for annotations
//!
//! Listing for a document runs the visibility policy per item, so private
//! annotations silently drop out of results the viewer may not see.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::auth::Identity;
use crate::documents::Document;
use crate::error::Result;
use crate::policy;

use super::types::{Annotation, AnnotationContent, AnnotationType, Reply};

/// Repository for annotation persistence
pub struct AnnotationRepository<'a> {
    pool: &'a SqlitePool,
}

/// Optional filters for annotation listings
#[derive(Debug, Default, Clone)]
pub struct AnnotationFilter {
    pub page: Option<i64>,
    pub annotation_type: Option<AnnotationType>,
    pub resolved: Option<bool>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, document_id, author_id, page, annotation_type, content_json,
           is_private, is_resolved, tags_json, replies_json, created_at, updated_at
    FROM annotations
"#;

impl<'a> AnnotationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new annotation
    pub async fn insert(&self, annotation: &Annotation) -> Result<()> {
        let content_json = serde_json::to_string(&annotation.content)?;
        let tags_json = serde_json::to_string(&annotation.tags)?;
        let replies_json = serde_json::to_string(&annotation.replies)?;

        sqlx::query(
            r#"
            INSERT INTO annotations (
                id, document_id, author_id, page, annotation_type, content_json,
                is_private, is_resolved, tags_json, replies_json, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&annotation.id)
        .bind(&annotation.document_id)
        .bind(&annotation.author_id)
        .bind(annotation.page)
        .bind(annotation.annotation_type.as_str())
        .bind(&content_json)
        .bind(annotation.is_private as i64)
        .bind(annotation.is_resolved as i64)
        .bind(&tags_json)
        .bind(&replies_json)
        .bind(annotation.created_at.to_rfc3339())
        .bind(annotation.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get an annotation by ID
    pub async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        let row = sqlx::query_as::<_, AnnotationRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(|r| r.into_annotation()).transpose()
    }

    /// List annotations on a document the viewer is allowed to see
    ///
    /// SQL narrows by page/type/resolved; the visibility predicate then runs
    /// per item. Invisible items are excluded, never an error.
    pub async fn list_for_document(
        &self,
        doc: &Document,
        viewer: Option<&Identity>,
        filter: &AnnotationFilter,
    ) -> Result<Vec<Annotation>> {
        let mut sql = format!("{} WHERE document_id = ?", SELECT_COLUMNS);

        if filter.page.is_some() {
            sql.push_str(" AND page = ?");
        }
        if filter.annotation_type.is_some() {
            sql.push_str(" AND annotation_type = ?");
        }
        if filter.resolved.is_some() {
            sql.push_str(" AND is_resolved = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, AnnotationRow>(&sql).bind(&doc.id);
        if let Some(page) = filter.page {
            query = query.bind(page);
        }
        if let Some(ref annotation_type) = filter.annotation_type {
            query = query.bind(annotation_type.as_str());
        }
        if let Some(resolved) = filter.resolved {
            query = query.bind(resolved as i64);
        }

        let rows = query.fetch_all(self.pool).await?;
        let annotations = rows
            .into_iter()
            .map(|r| r.into_annotation())
            .collect::<Result<Vec<_>>>()?;

        Ok(annotations
            .into_iter()
            .filter(|ann| policy::can_view_annotation(ann, doc, viewer))
            .collect())
    }

    /// List a user's own annotations across documents, newest first,
    /// with a total for pagination
    pub async fn list_for_author(
        &self,
        author_id: &str,
        filter: &AnnotationFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Annotation>, i64)> {
        let mut conditions = vec!["author_id = ?".to_string()];
        if filter.page.is_some() {
            conditions.push("page = ?".to_string());
        }
        if filter.annotation_type.is_some() {
            conditions.push("annotation_type = ?".to_string());
        }
        if filter.resolved.is_some() {
            conditions.push("is_resolved = ?".to_string());
        }
        let where_clause = format!(" WHERE {}", conditions.join(" AND "));

        let count_sql = format!("SELECT COUNT(*) FROM annotations{}", where_clause);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(author_id);
        if let Some(doc_page) = filter.page {
            count_query = count_query.bind(doc_page);
        }
        if let Some(ref annotation_type) = filter.annotation_type {
            count_query = count_query.bind(annotation_type.as_str());
        }
        if let Some(resolved) = filter.resolved {
            count_query = count_query.bind(resolved as i64);
        }
        let (total,) = count_query.fetch_one(self.pool).await?;

        let offset = (page.max(1) - 1) * limit;
        let list_sql = format!(
            "{}{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );
        let mut list_query = sqlx::query_as::<_, AnnotationRow>(&list_sql).bind(author_id);
        if let Some(doc_page) = filter.page {
            list_query = list_query.bind(doc_page);
        }
        if let Some(ref annotation_type) = filter.annotation_type {
            list_query = list_query.bind(annotation_type.as_str());
        }
        if let Some(resolved) = filter.resolved {
            list_query = list_query.bind(resolved as i64);
        }
        let rows = list_query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let annotations = rows
            .into_iter()
            .map(|r| r.into_annotation())
            .collect::<Result<Vec<_>>>()?;

        Ok((annotations, total))
    }

    /// Persist an annotation after an edit
    pub async fn update(&self, annotation: &Annotation) -> Result<()> {
        let content_json = serde_json::to_string(&annotation.content)?;
        let tags_json = serde_json::to_string(&annotation.tags)?;

        sqlx::query(
            r#"
            UPDATE annotations
            SET page = ?, content_json = ?, is_private = ?, is_resolved = ?,
                tags_json = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(annotation.page)
        .bind(&content_json)
        .bind(annotation.is_private as i64)
        .bind(annotation.is_resolved as i64)
        .bind(&tags_json)
        .bind(annotation.updated_at.to_rfc3339())
        .bind(&annotation.id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete an annotation (its replies go with the row)
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist the reply list after an add or delete
    ///
    /// Replies never bump the annotation's own `updated_at`.
    pub async fn set_replies(&self, id: &str, replies: &[Reply]) -> Result<()> {
        let replies_json = serde_json::to_string(replies)?;

        sqlx::query("UPDATE annotations SET replies_json = ? WHERE id = ?")
            .bind(&replies_json)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Count annotations on a document (derived view, never stored)
    pub async fn count_for_document(&self, document_id: &str) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM annotations WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct AnnotationRow {
    id: String,
    document_id: String,
    author_id: String,
    page: i64,
    annotation_type: String,
    content_json: String,
    is_private: i64,
    is_resolved: i64,
    tags_json: String,
    replies_json: String,
    created_at: String,
    updated_at: String,
}

impl AnnotationRow {
    fn into_annotation(self) -> Result<Annotation> {
        let content: AnnotationContent = serde_json::from_str(&self.content_json)?;
        let tags: Vec<String> = serde_json::from_str(&self.tags_json)?;
        let replies: Vec<Reply> = serde_json::from_str(&self.replies_json)?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);

        Ok(Annotation {
            id: self.id,
            document_id: self.document_id,
            author_id: self.author_id,
            page: self.page,
            annotation_type: AnnotationType::parse(&self.annotation_type)
                .unwrap_or(AnnotationType::Highlight),
            content,
            is_private: self.is_private != 0,
            is_resolved: self.is_resolved != 0,
            tags,
            replies,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Point;
    use crate::auth::Role;
    use crate::documents::{Document, DocumentRepository};

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::initialize_schema(&pool).await.unwrap();
        pool
    }

    fn identity(id: &str) -> Identity {
        Identity {
            user_id: id.to_string(),
            role: Role::User,
        }
    }

    async fn make_document(pool: &SqlitePool, owner: &str, is_public: bool) -> Document {
        let doc = Document::new(
            "Doc",
            &format!("documents/{}.pdf", uuid::Uuid::new_v4()),
            "doc.pdf",
            1,
            owner,
        )
        .with_visibility(is_public);
        DocumentRepository::new(pool).insert(&doc).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let content = AnnotationContent {
            text: Some("note".to_string()),
            coordinates: Some(Point { x: 10.0, y: 20.0 }),
            ..Default::default()
        };
        let ann =
            Annotation::new(&doc.id, "author", 2, AnnotationType::Text).with_content(content);
        repo.insert(&ann).await.unwrap();

        let loaded = repo.get(&ann.id).await.unwrap().unwrap();
        assert_eq!(loaded.page, 2);
        assert_eq!(loaded.content.text.as_deref(), Some("note"));
        assert_eq!(loaded.content.coordinates, Some(Point { x: 10.0, y: 20.0 }));
        // Server-assigned style defaults survive the round trip
        let style = loaded.content.style.unwrap();
        assert_eq!(style.color.as_deref(), Some("#FFFF00"));
        assert_eq!(style.opacity, Some(0.5));
    }

    #[tokio::test]
    async fn test_list_for_document_filters_private() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let open = Annotation::new(&doc.id, "author", 1, AnnotationType::Highlight);
        let mut private = Annotation::new(&doc.id, "author", 1, AnnotationType::Highlight);
        private.is_private = true;
        repo.insert(&open).await.unwrap();
        repo.insert(&private).await.unwrap();

        // Document owner sees everything
        let owner_view = repo
            .list_for_document(&doc, Some(&identity("owner")), &AnnotationFilter::default())
            .await
            .unwrap();
        assert_eq!(owner_view.len(), 2);

        // The author sees their own private annotation
        let author_view = repo
            .list_for_document(&doc, Some(&identity("author")), &AnnotationFilter::default())
            .await
            .unwrap();
        assert_eq!(author_view.len(), 2);

        // A third party sees only the non-private one
        let other_view = repo
            .list_for_document(&doc, Some(&identity("other")), &AnnotationFilter::default())
            .await
            .unwrap();
        assert_eq!(other_view.len(), 1);
        assert_eq!(other_view[0].id, open.id);

        // Anonymous on a public document: non-private only
        let anon_view = repo
            .list_for_document(&doc, None, &AnnotationFilter::default())
            .await
            .unwrap();
        assert_eq!(anon_view.len(), 1);
    }

    #[tokio::test]
    async fn test_list_for_document_anonymous_private_document() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", false).await;

        repo.insert(&Annotation::new(&doc.id, "author", 1, AnnotationType::Highlight))
            .await
            .unwrap();

        let anon_view = repo
            .list_for_document(&doc, None, &AnnotationFilter::default())
            .await
            .unwrap();
        assert!(anon_view.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let on_page_1 = Annotation::new(&doc.id, "a", 1, AnnotationType::Highlight);
        let on_page_2 = Annotation::new(&doc.id, "a", 2, AnnotationType::Rectangle);
        let mut resolved = Annotation::new(&doc.id, "a", 2, AnnotationType::Highlight);
        resolved.is_resolved = true;
        for ann in [&on_page_1, &on_page_2, &resolved] {
            repo.insert(ann).await.unwrap();
        }

        let viewer = identity("owner");

        let filter = AnnotationFilter {
            page: Some(2),
            ..Default::default()
        };
        let found = repo
            .list_for_document(&doc, Some(&viewer), &filter)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let filter = AnnotationFilter {
            annotation_type: Some(AnnotationType::Rectangle),
            ..Default::default()
        };
        let found = repo
            .list_for_document(&doc, Some(&viewer), &filter)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, on_page_2.id);

        let filter = AnnotationFilter {
            resolved: Some(true),
            ..Default::default()
        };
        let found = repo
            .list_for_document(&doc, Some(&viewer), &filter)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, resolved.id);
    }

    #[tokio::test]
    async fn test_list_for_author_pagination() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        for i in 0..5 {
            let mut ann = Annotation::new(&doc.id, "author", i + 1, AnnotationType::Highlight);
            // Private annotations still show up in the author's own listing
            ann.is_private = i % 2 == 0;
            repo.insert(&ann).await.unwrap();
        }
        repo.insert(&Annotation::new(&doc.id, "someone-else", 1, AnnotationType::Text))
            .await
            .unwrap();

        let (items, total) = repo
            .list_for_author("author", &AnnotationFilter::default(), 1, 3)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 3);

        let (items, _) = repo
            .list_for_author("author", &AnnotationFilter::default(), 2, 3)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_update_merges_content() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let content = AnnotationContent {
            text: Some("original".to_string()),
            coordinates: Some(Point { x: 1.0, y: 2.0 }),
            ..Default::default()
        };
        let ann =
            Annotation::new(&doc.id, "author", 1, AnnotationType::Text).with_content(content);
        repo.insert(&ann).await.unwrap();

        let mut loaded = repo.get(&ann.id).await.unwrap().unwrap();
        loaded.content.merge(AnnotationContent {
            text: Some("edited".to_string()),
            ..Default::default()
        });
        loaded.is_resolved = true;
        loaded.updated_at = Utc::now();
        repo.update(&loaded).await.unwrap();

        let reloaded = repo.get(&ann.id).await.unwrap().unwrap();
        assert_eq!(reloaded.content.text.as_deref(), Some("edited"));
        assert_eq!(reloaded.content.coordinates, Some(Point { x: 1.0, y: 2.0 }));
        assert!(reloaded.is_resolved);
    }

    #[tokio::test]
    async fn test_replies_preserve_insertion_order() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let ann = Annotation::new(&doc.id, "author", 1, AnnotationType::Highlight);
        repo.insert(&ann).await.unwrap();

        let mut replies = Vec::new();
        for i in 0..3 {
            replies.push(Reply::new("replier", &format!("reply {}", i)));
            repo.set_replies(&ann.id, &replies).await.unwrap();
        }

        let loaded = repo.get(&ann.id).await.unwrap().unwrap();
        assert_eq!(loaded.replies.len(), 3);
        assert_eq!(loaded.replies[0].text, "reply 0");
        assert_eq!(loaded.replies[2].text, "reply 2");

        // Deleting the middle reply keeps the rest in order
        replies.remove(1);
        repo.set_replies(&ann.id, &replies).await.unwrap();
        let loaded = repo.get(&ann.id).await.unwrap().unwrap();
        assert_eq!(loaded.replies.len(), 2);
        assert_eq!(loaded.replies[0].text, "reply 0");
        assert_eq!(loaded.replies[1].text, "reply 2");
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        let ann = Annotation::new(&doc.id, "author", 1, AnnotationType::Highlight);
        repo.insert(&ann).await.unwrap();

        assert!(repo.delete(&ann.id).await.unwrap());
        assert!(repo.get(&ann.id).await.unwrap().is_none());
        assert!(!repo.delete(&ann.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_for_document() {
        let pool = setup_test_db().await;
        let repo = AnnotationRepository::new(&pool);
        let doc = make_document(&pool, "owner", true).await;

        assert_eq!(repo.count_for_document(&doc.id).await.unwrap(), 0);
        repo.insert(&Annotation::new(&doc.id, "a", 1, AnnotationType::Highlight))
            .await
            .unwrap();
        assert_eq!(repo.count_for_document(&doc.id).await.unwrap(), 1);
    }
}

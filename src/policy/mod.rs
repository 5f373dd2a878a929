//! Visibility policy
//!
//! Pure predicates deciding who may see or change documents, annotations,
//! and replies. No I/O: every function works over already-loaded entities so
//! the rules are unit-testable without a live store. Anonymous viewers are
//! `None` and only ever satisfy public-document branches.

use crate::annotations::{Annotation, Reply};
use crate::auth::Identity;
use crate::documents::Document;

/// A viewer may read a document if it is public or they own it
pub fn can_view_document(doc: &Document, viewer: Option<&Identity>) -> bool {
    if doc.is_public {
        return true;
    }
    viewer.is_some_and(|v| v.user_id == doc.owner_id)
}

/// Only the owner or an admin may change or delete a document
pub fn can_mutate_document(doc: &Document, viewer: Option<&Identity>) -> bool {
    viewer.is_some_and(|v| v.user_id == doc.owner_id || v.is_admin())
}

/// A viewer sees an annotation if they can see the document, and the
/// annotation is not private. Document owners and the annotation's own
/// author see it regardless of privacy.
pub fn can_view_annotation(ann: &Annotation, doc: &Document, viewer: Option<&Identity>) -> bool {
    if !can_view_document(doc, viewer) {
        return false;
    }
    if !ann.is_private {
        return true;
    }
    viewer.is_some_and(|v| v.user_id == doc.owner_id || v.user_id == ann.author_id)
}

/// Anyone with document read access may reply, but never on a private
/// annotation
pub fn can_reply(ann: &Annotation, doc: &Document, viewer: Option<&Identity>) -> bool {
    can_view_document(doc, viewer) && !ann.is_private
}

/// Only the author may edit an annotation's content
pub fn can_edit_annotation(ann: &Annotation, viewer: Option<&Identity>) -> bool {
    viewer.is_some_and(|v| v.user_id == ann.author_id)
}

/// The author or an admin may delete an annotation
pub fn can_delete_annotation(ann: &Annotation, viewer: Option<&Identity>) -> bool {
    viewer.is_some_and(|v| v.user_id == ann.author_id || v.is_admin())
}

/// The reply's author, the annotation's author, or an admin may delete a
/// reply
pub fn can_delete_reply(reply: &Reply, ann: &Annotation, viewer: Option<&Identity>) -> bool {
    viewer.is_some_and(|v| {
        v.user_id == reply.author_id || v.user_id == ann.author_id || v.is_admin()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::AnnotationType;
    use crate::auth::Role;

    fn identity(id: &str, role: Role) -> Identity {
        Identity {
            user_id: id.to_string(),
            role,
        }
    }

    fn document(owner: &str, is_public: bool) -> Document {
        Document::new("Doc", "documents/k.pdf", "k.pdf", 1, owner).with_visibility(is_public)
    }

    fn annotation(doc: &Document, author: &str, is_private: bool) -> Annotation {
        let mut ann = Annotation::new(&doc.id, author, 1, AnnotationType::Highlight);
        ann.is_private = is_private;
        ann
    }

    #[test]
    fn test_can_view_document() {
        let owner = identity("owner", Role::User);
        let other = identity("other", Role::User);

        let private_doc = document("owner", false);
        assert!(can_view_document(&private_doc, Some(&owner)));
        assert!(!can_view_document(&private_doc, Some(&other)));
        assert!(!can_view_document(&private_doc, None));

        let public_doc = document("owner", true);
        assert!(can_view_document(&public_doc, Some(&owner)));
        assert!(can_view_document(&public_doc, Some(&other)));
        assert!(can_view_document(&public_doc, None));
    }

    #[test]
    fn test_can_mutate_document() {
        let owner = identity("owner", Role::User);
        let other = identity("other", Role::User);
        let admin = identity("admin", Role::Admin);

        let doc = document("owner", true);
        assert!(can_mutate_document(&doc, Some(&owner)));
        assert!(!can_mutate_document(&doc, Some(&other)));
        assert!(can_mutate_document(&doc, Some(&admin)));
        // Public documents are still not anonymously mutable
        assert!(!can_mutate_document(&doc, None));
    }

    #[test]
    fn test_can_view_annotation_privacy() {
        let owner = identity("owner", Role::User);
        let author = identity("author", Role::User);
        let other = identity("other", Role::User);

        let doc = document("owner", true);
        let public_ann = annotation(&doc, "author", false);
        let private_ann = annotation(&doc, "author", true);

        // Non-private: visible to anyone who can see the document
        assert!(can_view_annotation(&public_ann, &doc, Some(&other)));
        assert!(can_view_annotation(&public_ann, &doc, None));

        // Private: document owner and annotation author only
        assert!(can_view_annotation(&private_ann, &doc, Some(&owner)));
        assert!(can_view_annotation(&private_ann, &doc, Some(&author)));
        assert!(!can_view_annotation(&private_ann, &doc, Some(&other)));
        assert!(!can_view_annotation(&private_ann, &doc, None));
    }

    #[test]
    fn test_annotation_invisible_without_document_access() {
        let other = identity("other", Role::User);

        let doc = document("owner", false);
        let ann = annotation(&doc, "other", false);

        // Even the annotation's author cannot see it once document access
        // is gone
        assert!(!can_view_annotation(&ann, &doc, Some(&other)));
    }

    #[test]
    fn test_can_reply() {
        let owner = identity("owner", Role::User);
        let other = identity("other", Role::User);

        let doc = document("owner", true);
        let open = annotation(&doc, "author", false);
        let private = annotation(&doc, "author", true);

        assert!(can_reply(&open, &doc, Some(&other)));
        assert!(can_reply(&open, &doc, None));
        // Private annotations accept no replies, not even from the owner
        assert!(!can_reply(&private, &doc, Some(&owner)));

        let hidden_doc = document("owner", false);
        let ann = annotation(&hidden_doc, "author", false);
        assert!(!can_reply(&ann, &hidden_doc, Some(&other)));
    }

    #[test]
    fn test_edit_and_delete_annotation() {
        let author = identity("author", Role::User);
        let other = identity("other", Role::User);
        let admin = identity("admin", Role::Admin);

        let doc = document("owner", true);
        let ann = annotation(&doc, "author", false);

        assert!(can_edit_annotation(&ann, Some(&author)));
        assert!(!can_edit_annotation(&ann, Some(&other)));
        // Admins may delete but not edit
        assert!(!can_edit_annotation(&ann, Some(&admin)));

        assert!(can_delete_annotation(&ann, Some(&author)));
        assert!(can_delete_annotation(&ann, Some(&admin)));
        assert!(!can_delete_annotation(&ann, Some(&other)));
        assert!(!can_delete_annotation(&ann, None));
    }

    #[test]
    fn test_can_delete_reply() {
        let reply_author = identity("replier", Role::User);
        let ann_author = identity("author", Role::User);
        let other = identity("other", Role::User);
        let admin = identity("admin", Role::Admin);

        let doc = document("owner", true);
        let ann = annotation(&doc, "author", false);
        let reply = Reply::new("replier", "a reply");

        assert!(can_delete_reply(&reply, &ann, Some(&reply_author)));
        assert!(can_delete_reply(&reply, &ann, Some(&ann_author)));
        assert!(can_delete_reply(&reply, &ann, Some(&admin)));
        assert!(!can_delete_reply(&reply, &ann, Some(&other)));
        assert!(!can_delete_reply(&reply, &ann, None));
    }
}

//! Core data models used throughout the mirror.
//!
//! These types represent the discussions that flow from the remote API
//! through the mapper into the local store, and back out to the
//! presentational surfaces.

use serde::Serialize;

/// Local identifier of a stored discussion.
pub type RecordId = i64;

/// Local identifier of a repository tag.
pub type TagId = i64;

/// A discussion normalized and sanitized by the mapper, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionRecord {
    pub title: String,
    pub body: String,
    /// Canonical source URL. Stored as metadata, not as a core field.
    pub url: String,
}

/// A title/link pair from a summary query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscussionSummary {
    pub title: String,
    pub url: String,
}

/// Fields written by [`Store::insert_discussion`](crate::store::Store::insert_discussion).
///
/// `meta` is written together with the record: either both land or
/// neither does.
#[derive(Debug, Clone)]
pub struct NewDiscussion {
    pub title: String,
    pub body: String,
    pub tag_id: Option<TagId>,
    pub meta: Vec<(String, String)>,
}

/// A discussion as read back from the store, joined with its source URL
/// metadata and repository tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDiscussion {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub source_url: Option<String>,
    pub repository: Option<String>,
    pub repository_slug: Option<String>,
}

/// A hierarchical category. Repositories are children of their organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<TagId>,
}

/// Read filter for listing stored discussions, newest first.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Matches a record's tag or that tag's parent, so an organization
    /// slug selects every repository under it.
    pub tag_slug: Option<String>,
    /// Matches the repository tag by name, whatever slug it was given.
    pub repository: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn tagged(slug: impl Into<String>) -> Self {
        Self {
            tag_slug: Some(slug.into()),
            ..Self::default()
        }
    }

    pub fn for_repository(name: impl Into<String>) -> Self {
        Self {
            repository: Some(name.into()),
            ..Self::default()
        }
    }
}

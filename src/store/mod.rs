//! Storage abstraction for mirrored discussions.
//!
//! The [`Store`] trait plays the role of a CMS content repository: typed
//! discussion records, key/value metadata per record, hierarchical tags,
//! and an advisory lock table used to keep runs from overlapping.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteStore`] | CLI and server |
//! | [`InMemoryStore`] | tests and embedding in other programs |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::PersistError;
use crate::models::{ListFilter, NewDiscussion, RecordId, StoredDiscussion, TagId};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract content repository.
///
/// Writes are independent and append-only: `insert_discussion` never
/// looks for an existing record.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a record and link it to `new.tag_id` when given. `new.meta`
    /// is written in the same step; on failure nothing is left behind.
    async fn insert_discussion(&self, new: &NewDiscussion) -> Result<RecordId, PersistError>;

    /// Set (or overwrite) one metadata value on an existing record.
    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<(), PersistError>;

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>, PersistError>;

    /// Return the tag named `name` under `parent`, creating it if needed.
    /// New tags get a slug unique across all tags.
    async fn ensure_tag(&self, name: &str, parent: Option<TagId>) -> Result<TagId, PersistError>;

    async fn get_discussion(&self, id: RecordId) -> Result<Option<StoredDiscussion>, PersistError>;

    /// Newest first.
    async fn list_discussions(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<StoredDiscussion>, PersistError>;

    /// Take the lock `name` for `holder`. A lock held for longer than
    /// `stale_after_secs` is considered abandoned and taken over.
    async fn try_acquire_lock(
        &self,
        name: &str,
        holder: &str,
        stale_after_secs: i64,
    ) -> Result<bool, PersistError>;

    /// Release `name` if `holder` still owns it.
    async fn release_lock(&self, name: &str, holder: &str) -> Result<(), PersistError>;
}

/// URL-safe tag slug: lowercase ASCII alphanumerics separated by single
/// hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "tag".to_string()
    } else {
        slug
    }
}

/// `base`, then `base-2`, `base-3`, ... for the `attempt`-th candidate.
pub(crate) fn slug_candidate(base: &str, attempt: usize) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

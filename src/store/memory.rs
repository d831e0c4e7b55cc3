//! In-memory [`Store`] implementation.
//!
//! Everything lives behind one `std::sync::RwLock`. Record ids are
//! assigned sequentially from 1, like an autoincrement column.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{slug_candidate, slugify, Store};
use crate::error::PersistError;
use crate::models::{ListFilter, NewDiscussion, RecordId, StoredDiscussion, Tag, TagId};
use crate::persist::SOURCE_URL_META_KEY;

struct StoredRecord {
    id: RecordId,
    title: String,
    body: String,
    created_at: i64,
    tag_id: Option<TagId>,
}

struct HeldLock {
    holder: String,
    acquired_at: i64,
}

#[derive(Default)]
struct Inner {
    records: Vec<StoredRecord>,
    meta: HashMap<(RecordId, String), String>,
    tags: Vec<Tag>,
    locks: HashMap<String, HeldLock>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tags, in creation order.
    pub fn tags(&self) -> Vec<Tag> {
        self.read().map(|i| i.tags.clone()).unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, PersistError> {
        self.inner
            .read()
            .map_err(|_| PersistError::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, PersistError> {
        self.inner
            .write()
            .map_err(|_| PersistError::Storage("in-memory store lock poisoned".into()))
    }
}

impl Inner {
    fn tag(&self, id: Option<TagId>) -> Option<&Tag> {
        id.and_then(|id| self.tags.iter().find(|t| t.id == id))
    }

    fn matches(&self, record: &StoredRecord, filter: &ListFilter) -> bool {
        let tag = self.tag(record.tag_id);
        let parent = tag.and_then(|t| self.tag(t.parent_id));

        let slug_ok = match &filter.tag_slug {
            Some(slug) => [tag, parent].iter().flatten().any(|t| &t.slug == slug),
            None => true,
        };
        let repo_ok = match &filter.repository {
            Some(name) => tag.is_some_and(|t| &t.name == name && t.parent_id.is_some()),
            None => true,
        };
        slug_ok && repo_ok
    }

    fn to_stored(&self, record: &StoredRecord) -> StoredDiscussion {
        let tag = self.tag(record.tag_id);
        StoredDiscussion {
            id: record.id,
            title: record.title.clone(),
            body: record.body.clone(),
            created_at: record.created_at,
            source_url: self
                .meta
                .get(&(record.id, SOURCE_URL_META_KEY.to_string()))
                .cloned(),
            repository: tag.map(|t| t.name.clone()),
            repository_slug: tag.map(|t| t.slug.clone()),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_discussion(&self, new: &NewDiscussion) -> Result<RecordId, PersistError> {
        let mut inner = self.write()?;
        if let Some(tag_id) = new.tag_id {
            if !inner.tags.iter().any(|t| t.id == tag_id) {
                return Err(PersistError::Storage(format!("unknown tag id {}", tag_id)));
            }
        }
        let id = inner.records.len() as RecordId + 1;
        inner.records.push(StoredRecord {
            id,
            title: new.title.clone(),
            body: new.body.clone(),
            created_at: chrono::Utc::now().timestamp(),
            tag_id: new.tag_id,
        });
        for (key, value) in &new.meta {
            inner.meta.insert((id, key.clone()), value.clone());
        }
        Ok(id)
    }

    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<(), PersistError> {
        let mut inner = self.write()?;
        if !inner.records.iter().any(|r| r.id == id) {
            return Err(PersistError::MissingRecord(id));
        }
        inner.meta.insert((id, key.to_string()), value.to_string());
        Ok(())
    }

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>, PersistError> {
        let inner = self.read()?;
        Ok(inner.meta.get(&(id, key.to_string())).cloned())
    }

    async fn ensure_tag(&self, name: &str, parent: Option<TagId>) -> Result<TagId, PersistError> {
        let mut inner = self.write()?;
        if let Some(existing) = inner
            .tags
            .iter()
            .find(|t| t.name == name && t.parent_id == parent)
        {
            return Ok(existing.id);
        }

        let base = slugify(name);
        let slug = (1..)
            .map(|n| slug_candidate(&base, n))
            .find(|candidate| !inner.tags.iter().any(|t| &t.slug == candidate))
            .unwrap_or_else(|| base.clone());

        let id = inner.tags.len() as TagId + 1;
        inner.tags.push(Tag {
            id,
            name: name.to_string(),
            slug,
            parent_id: parent,
        });
        Ok(id)
    }

    async fn get_discussion(&self, id: RecordId) -> Result<Option<StoredDiscussion>, PersistError> {
        let inner = self.read()?;
        Ok(inner
            .records
            .iter()
            .find(|r| r.id == id)
            .map(|r| inner.to_stored(r)))
    }

    async fn list_discussions(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<StoredDiscussion>, PersistError> {
        let inner = self.read()?;
        let items = inner
            .records
            .iter()
            .rev()
            .filter(|r| inner.matches(r, filter))
            .map(|r| inner.to_stored(r))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(items)
    }

    async fn try_acquire_lock(
        &self,
        name: &str,
        holder: &str,
        stale_after_secs: i64,
    ) -> Result<bool, PersistError> {
        let mut inner = self.write()?;
        let now = chrono::Utc::now().timestamp();
        if let Some(held) = inner.locks.get(name) {
            if now - held.acquired_at <= stale_after_secs {
                return Ok(false);
            }
        }
        inner.locks.insert(
            name.to_string(),
            HeldLock {
                holder: holder.to_string(),
                acquired_at: now,
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, name: &str, holder: &str) -> Result<(), PersistError> {
        let mut inner = self.write()?;
        if inner.locks.get(name).map(|l| l.holder.as_str()) == Some(holder) {
            inner.locks.remove(name);
        }
        Ok(())
    }
}

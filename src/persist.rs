//! Writing mapped discussions into a [`Store`].
//!
//! Every call inserts a new record; there is no lookup by URL or title,
//! so re-running the pipeline appends duplicates. The canonical URL is
//! written with the record as metadata under [`SOURCE_URL_META_KEY`],
//! which is also the key the redirect path reads.

use crate::error::PersistError;
use crate::models::{DiscussionRecord, NewDiscussion, RecordId, TagId};
use crate::store::Store;

pub const SOURCE_URL_META_KEY: &str = "source_url";

/// Look up or create the tag for `repository` under the organization tag.
pub async fn resolve_repository_tag(
    store: &dyn Store,
    organization: &str,
    repository: &str,
) -> Result<TagId, PersistError> {
    let org_tag = store.ensure_tag(organization, None).await?;
    store.ensure_tag(repository, Some(org_tag)).await
}

/// Insert `record` together with its source URL. A record is never left
/// behind without its URL.
pub async fn store_discussion(
    store: &dyn Store,
    record: &DiscussionRecord,
    tag_id: Option<TagId>,
) -> Result<RecordId, PersistError> {
    store
        .insert_discussion(&NewDiscussion {
            title: record.title.clone(),
            body: record.body.clone(),
            tag_id,
            meta: vec![(SOURCE_URL_META_KEY.to_string(), record.url.clone())],
        })
        .await
}

//! `mirror get` and `mirror list`: read stored discussions from the CLI.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{ListFilter, RecordId, StoredDiscussion};
use crate::store::{SqliteStore, Store};

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = crate::db::connect(config).await?;
    crate::migrate::apply_schema(&pool).await?;
    Ok(SqliteStore::new(pool))
}

pub async fn get_discussion(config: &Config, id: RecordId) -> Result<StoredDiscussion> {
    let store = open_store(config).await?;
    let found = store.get_discussion(id).await;
    store.close().await;

    match found? {
        Some(d) => Ok(d),
        None => bail!("discussion not found: {}", id),
    }
}

pub async fn run_get(config: &Config, id: RecordId) -> Result<()> {
    let d = get_discussion(config, id).await?;

    println!("--- Discussion ---");
    println!("id:          {}", d.id);
    println!("title:       {}", d.title);
    println!("repository:  {}", d.repository.as_deref().unwrap_or("-"));
    if let Some(url) = &d.source_url {
        println!("source_url:  {}", url);
    }
    println!("created_at:  {}", format_ts(d.created_at));
    println!();

    println!("--- Body ---");
    println!("{}", d.body);
    Ok(())
}

pub async fn run_list(config: &Config, repo: Option<&str>, limit: Option<usize>) -> Result<()> {
    let filter = ListFilter {
        repository: repo.map(str::to_string),
        limit,
        ..ListFilter::default()
    };

    let store = open_store(config).await?;
    let items = store.list_discussions(&filter).await;
    store.close().await;
    let items = items?;

    if items.is_empty() {
        println!("No discussions stored.");
        return Ok(());
    }

    println!("{:<6} {:<16} {:<20} TITLE", "ID", "REPOSITORY", "CREATED");
    for d in &items {
        println!(
            "{:<6} {:<16} {:<20} {}",
            d.id,
            d.repository.as_deref().unwrap_or("-"),
            format_ts(d.created_at),
            d.title
        );
    }
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0), "1970-01-01 00:00:00");
        assert_eq!(format_ts(1_700_000_000), "2023-11-14 22:13:20");
    }
}

//! Pipeline orchestration.
//!
//! Drives the full flow for each configured repository, one at a time:
//! query → remote call → mapping → storage. A failure in one repository is
//! logged and recorded in the [`RunSummary`]; the run moves on to the next.
//!
//! Scheduled and manual runs both go through [`run_from_config`], which
//! holds the `discussion-sync` advisory lock for the duration of the run so
//! the two can never overlap.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::GraphqlClient;
use crate::config::{Config, RunSettings};
use crate::error::{RepoError, RunError};
use crate::mapper::map_repository_discussions;
use crate::persist::{resolve_repository_tag, store_discussion};
use crate::query::{build_query, QueryKind};
use crate::store::Store;

pub const RUN_LOCK_NAME: &str = "discussion-sync";

/// A lock older than this is assumed to belong to a crashed run.
pub const STALE_LOCK_SECS: i64 = 60 * 60;

/// What started a run. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => f.write_str("scheduled"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

/// Per-repository progress.
///
/// `Pending → Queried → Mapped → {PartiallyStored | FullyStored}`, or
/// `Failed` from `Pending`/`Queried`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoState {
    Pending,
    Queried,
    Mapped,
    PartiallyStored,
    FullyStored,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoOutcome {
    pub repository: String,
    pub state: RepoState,
    pub mapped: usize,
    pub stored: usize,
    pub persist_failures: usize,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<RepoError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<RepoError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RepoOutcome {
    fn pending(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            state: RepoState::Pending,
            mapped: 0,
            stored: 0,
            persist_failures: 0,
            error: None,
        }
    }

    fn advance(&mut self, state: RepoState) {
        debug!(repository = %self.repository, from = ?self.state, to = ?state, "repository state");
        self.state = state;
    }

    fn fail(mut self, error: RepoError) -> Self {
        self.advance(RepoState::Failed);
        self.error = Some(error);
        self
    }
}

/// Result of one run over all configured repositories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Repositories a remote call was made for. Blank entries don't count.
    pub attempted: usize,
    /// Discussion records written.
    pub stored: usize,
    #[serde(skip)]
    pub failed_repos: Vec<(String, RepoError)>,
    pub outcomes: Vec<RepoOutcome>,
}

impl RunSummary {
    fn record(&mut self, outcome: RepoOutcome) {
        self.attempted += 1;
        self.stored += outcome.stored;
        if let Some(err) = &outcome.error {
            self.failed_repos
                .push((outcome.repository.clone(), err.clone()));
        }
        self.outcomes.push(outcome);
    }

    pub fn persist_failures(&self) -> usize {
        self.outcomes.iter().map(|o| o.persist_failures).sum()
    }
}

/// Run the pipeline over every configured repository.
///
/// Never fails as a whole: per-repository errors end up in the summary.
pub async fn run(settings: &RunSettings, client: &GraphqlClient, store: &dyn Store) -> RunSummary {
    let mut summary = RunSummary::default();

    for entry in &settings.repositories {
        let repository = entry.trim();
        if repository.is_empty() {
            debug!("skipping blank repository entry");
            continue;
        }
        let outcome = sync_repository(settings, client, store, repository).await;
        summary.record(outcome);
    }

    info!(
        organization = %settings.organization,
        attempted = summary.attempted,
        stored = summary.stored,
        failed = summary.failed_repos.len(),
        persist_failures = summary.persist_failures(),
        "sync run finished"
    );
    summary
}

async fn sync_repository(
    settings: &RunSettings,
    client: &GraphqlClient,
    store: &dyn Store,
    repository: &str,
) -> RepoOutcome {
    let mut outcome = RepoOutcome::pending(repository);

    let request = build_query(QueryKind::DetailedPerRepo {
        owner: &settings.organization,
        repository,
    });

    let body = match client.send(&request, &settings.token).await {
        Ok(body) => body,
        Err(e) => {
            warn!(repository, error = %e, "error fetching discussions");
            return outcome.fail(e.into());
        }
    };
    outcome.advance(RepoState::Queried);

    let records = match map_repository_discussions(&body) {
        Ok(records) => records,
        Err(e) => {
            warn!(repository, error = %e, "no discussions found or unexpected data structure");
            return outcome.fail(e.into());
        }
    };
    outcome.mapped = records.len();
    outcome.advance(RepoState::Mapped);

    let tag_id = match resolve_repository_tag(store, &settings.organization, repository).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!(repository, error = %e, "failed to resolve repository tag");
            outcome.persist_failures = records.len();
            outcome.advance(RepoState::PartiallyStored);
            return outcome;
        }
    };

    for record in &records {
        match store_discussion(store, record, tag_id).await {
            Ok(id) => {
                debug!(repository, id, url = %record.url, "stored discussion");
                outcome.stored += 1;
            }
            Err(e) => {
                error!(repository, title = %record.title, error = %e, "failed to insert discussion");
                outcome.persist_failures += 1;
            }
        }
    }

    let done = if outcome.persist_failures == 0 {
        RepoState::FullyStored
    } else {
        RepoState::PartiallyStored
    };
    outcome.advance(done);
    outcome
}

/// Holds the run lock for one run.
///
/// Released explicitly at the end of a run. If the run future is dropped
/// first (Ctrl-C, an aborted task), `Drop` hands the release to the runtime
/// so the lock does not linger until it goes stale.
struct RunLock {
    store: Arc<dyn Store>,
    holder: String,
    released: bool,
}

impl RunLock {
    async fn acquire(store: Arc<dyn Store>) -> Result<Self, RunError> {
        let holder = Uuid::new_v4().to_string();
        if !store
            .try_acquire_lock(RUN_LOCK_NAME, &holder, STALE_LOCK_SECS)
            .await?
        {
            return Err(RunError::AlreadyRunning);
        }
        debug!(%holder, "run lock acquired");
        Ok(Self {
            store,
            holder,
            released: false,
        })
    }

    async fn release(mut self) {
        if let Err(e) = self.store.release_lock(RUN_LOCK_NAME, &self.holder).await {
            warn!(error = %e, "failed to release run lock");
        }
        self.released = true;
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let holder = std::mem::take(&mut self.holder);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("run cancelled; releasing run lock");
                handle.spawn(async move {
                    if let Err(e) = store.release_lock(RUN_LOCK_NAME, &holder).await {
                        warn!(error = %e, "failed to release run lock");
                    }
                });
            }
            Err(_) => warn!("run cancelled outside a runtime; run lock left to go stale"),
        }
    }
}

/// [`run`] under the run lock. Fails with [`RunError::AlreadyRunning`]
/// if another run holds it.
pub async fn run_exclusive(
    settings: &RunSettings,
    client: &GraphqlClient,
    store: Arc<dyn Store>,
) -> Result<RunSummary, RunError> {
    let lock = RunLock::acquire(store.clone()).await?;
    let summary = run(settings, client, store.as_ref()).await;
    lock.release().await;
    Ok(summary)
}

/// Entry point for both triggers.
///
/// Missing required settings make the run a no-op with an empty summary.
pub async fn run_from_config(
    config: &Config,
    store: Arc<dyn Store>,
    trigger: Trigger,
) -> Result<RunSummary, RunError> {
    let settings = match RunSettings::from_config(config) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(%trigger, error = %e, "sync skipped");
            return Ok(RunSummary::default());
        }
    };

    info!(
        %trigger,
        organization = %settings.organization,
        repositories = settings.repositories.len(),
        "sync run starting"
    );
    let client = GraphqlClient::from_settings(&settings)?;
    run_exclusive(&settings, &client, store).await
}

/// `mirror run`: one manual run against the SQLite store, then a report.
pub async fn run_sync_command(config: &Config) -> Result<()> {
    let pool = crate::db::connect(config).await?;
    crate::migrate::apply_schema(&pool).await?;
    let store = Arc::new(crate::store::SqliteStore::new(pool));

    let result = run_from_config(config, store.clone(), Trigger::Manual).await;
    store.close().await;
    let summary = result?;

    println!("sync {}", config.github.organization.trim());
    println!("  repositories attempted: {}", summary.attempted);
    println!("  discussions stored: {}", summary.stored);
    for outcome in &summary.outcomes {
        match &outcome.error {
            Some(e) => println!("  {}: failed ({})", outcome.repository, e),
            None => println!(
                "  {}: {} of {} stored",
                outcome.repository, outcome.stored, outcome.mapped
            ),
        }
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_summary_records_failures() {
        let mut summary = RunSummary::default();
        let mut ok = RepoOutcome::pending("docs");
        ok.stored = 3;
        ok.mapped = 3;
        ok.advance(RepoState::FullyStored);
        summary.record(ok);
        summary.record(RepoOutcome::pending("cli").fail(FetchError::HttpStatus(403).into()));

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.stored, 3);
        assert_eq!(
            summary.failed_repos,
            vec![("cli".to_string(), RepoError::Fetch(FetchError::HttpStatus(403)))]
        );
    }

    #[test]
    fn test_summary_serializes_error_text() {
        let mut summary = RunSummary::default();
        summary.record(RepoOutcome::pending("cli").fail(FetchError::HttpStatus(500).into()));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcomes"][0]["state"], "failed");
        assert_eq!(
            json["outcomes"][0]["error"],
            "remote returned HTTP status 500"
        );
        assert!(json.get("failed_repos").is_none());
    }
}

//! `mirror query`: show the GraphQL a run would send, or send the
//! cross-repository summary query and list what comes back.

use anyhow::{Context, Result};

use crate::client::GraphqlClient;
use crate::config::{Config, RunSettings};
use crate::mapper::map_discussion_summaries;
use crate::models::DiscussionSummary;
use crate::query::{build_query, GraphqlRequest, QueryKind};

/// Which request to preview. `repository` selects the per-repository query;
/// otherwise the settings preview query is built.
pub fn preview_request(config: &Config, repository: Option<&str>) -> GraphqlRequest {
    match repository {
        Some(repository) => build_query(QueryKind::DetailedPerRepo {
            owner: config.github.organization.trim(),
            repository: repository.trim(),
        }),
        None => build_query(QueryKind::SettingsPreview {
            fetch_count: config.github.fetch_count,
        }),
    }
}

pub fn run_preview(config: &Config, repository: Option<&str>, inline: bool) -> Result<()> {
    let request = preview_request(config, repository);
    if inline {
        println!("{}", request.render_inline());
    } else {
        println!("{}", serde_json::to_string_pretty(&request)?);
    }
    Ok(())
}

pub async fn fetch_summaries(config: &Config) -> Result<Vec<DiscussionSummary>> {
    let settings = RunSettings::from_config(config)?;
    let client = GraphqlClient::from_settings(&settings)?;
    let request = build_query(QueryKind::SummaryCrossRepo {
        fetch_count: settings.fetch_count as i64,
    });

    let body = client
        .send(&request, &settings.token)
        .await
        .with_context(|| format!("Summary query to {} failed", client.endpoint()))?;
    Ok(map_discussion_summaries(&body)?)
}

pub async fn run_send(config: &Config) -> Result<()> {
    let summaries = fetch_summaries(config).await?;
    if summaries.is_empty() {
        println!("No GitHub discussions found.");
        return Ok(());
    }
    for s in &summaries {
        println!("{}  {}", s.title, s.url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config() -> Config {
        parse_config(
            r#"
[db]
path = "/tmp/unused.sqlite"

[github]
organization = "acme"
fetch_count = 250
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_preview_defaults_to_settings_query() {
        let request = preview_request(&config(), None);
        assert!(request.query.contains("gitHubRepositories"));
        assert_eq!(request.page_size(), Some(100));
    }

    #[test]
    fn test_preview_for_repository_uses_organization() {
        let request = preview_request(&config(), Some(" docs "));
        assert_eq!(request.variables["owner"], "acme");
        assert_eq!(request.variables["name"], "docs");
    }
}

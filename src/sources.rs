//! `mirror sources`: show what a run would fetch, without fetching.

use anyhow::Result;

use crate::config::{Config, RunSettings};

/// One configured repository entry and whether a run would query it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub repository: String,
    pub status: &'static str,
}

pub fn source_statuses(config: &Config) -> Vec<SourceStatus> {
    config
        .github
        .repository_list()
        .into_iter()
        .map(|repository| {
            let status = if repository.is_empty() {
                "SKIPPED (blank entry)"
            } else {
                "OK"
            };
            SourceStatus { repository, status }
        })
        .collect()
}

pub fn list_sources(config: &Config) -> Result<()> {
    match RunSettings::from_config(config) {
        Ok(settings) => {
            println!("organization: {}", settings.organization);
            println!("endpoint:     {}", settings.endpoint);
            println!("schedule:     {}", config.github.fetch_schedule);
        }
        Err(e) => println!("NOT CONFIGURED ({}); runs are skipped", e),
    }
    println!();

    let statuses = source_statuses(config);
    if statuses.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }

    println!("{:<24} STATUS", "REPOSITORY");
    for s in &statuses {
        let name = if s.repository.is_empty() {
            "(blank)"
        } else {
            s.repository.as_str()
        };
        println!("{:<24} {}", name, s.status);
    }
    Ok(())
}

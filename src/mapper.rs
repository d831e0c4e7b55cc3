//! Projection of GraphQL response bodies into discussion records.
//!
//! A missing or non-array container is an error for the whole response.
//! Individual items that lack a required field are skipped, so the output
//! can be shorter than the input but keeps its order.

use serde_json::Value;

use crate::error::MapError;
use crate::models::{DiscussionRecord, DiscussionSummary};
use crate::sanitize::{sanitize_body, sanitize_title, sanitize_url};

pub const REPOSITORY_NODES_PATH: &str = "data.repository.discussions.nodes";
pub const SUMMARY_EDGES_PATH: &str = "data.gitHubDiscussions.edges";

/// Map `data.repository.discussions.nodes[]` into full records.
///
/// Required per item: `title`, `url`, and `bodyText` (which may be empty).
pub fn map_repository_discussions(body: &Value) -> Result<Vec<DiscussionRecord>, MapError> {
    let nodes = sequence_at(body, REPOSITORY_NODES_PATH)?;

    Ok(nodes
        .iter()
        .filter_map(|node| {
            let title = required_title(node)?;
            let url = required_url(node)?;
            let body = node.get("bodyText")?.as_str()?;
            Some(DiscussionRecord {
                title,
                body: sanitize_body(body),
                url,
            })
        })
        .collect())
}

/// Map `data.gitHubDiscussions.edges[].node` into title/link pairs.
pub fn map_discussion_summaries(body: &Value) -> Result<Vec<DiscussionSummary>, MapError> {
    let edges = sequence_at(body, SUMMARY_EDGES_PATH)?;

    Ok(edges
        .iter()
        .filter_map(|edge| {
            let node = edge.get("node")?;
            Some(DiscussionSummary {
                title: required_title(node)?,
                url: required_url(node)?,
            })
        })
        .collect())
}

fn sequence_at<'a>(body: &'a Value, path: &'static str) -> Result<&'a Vec<Value>, MapError> {
    let mut current = body;
    for segment in path.split('.') {
        current = match current.get(segment) {
            Some(next) => next,
            None => return Err(unexpected(body, path)),
        };
    }
    current.as_array().ok_or_else(|| unexpected(body, path))
}

fn unexpected(body: &Value, path: &'static str) -> MapError {
    let detail = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);
    MapError::UnexpectedShape { path, detail }
}

fn required_title(node: &Value) -> Option<String> {
    let title = sanitize_title(node.get("title")?.as_str()?);
    (!title.is_empty()).then_some(title)
}

fn required_url(node: &Value) -> Option<String> {
    sanitize_url(node.get("url")?.as_str()?)
}

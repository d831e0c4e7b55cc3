//! GraphQL request construction.
//!
//! Organization and repository names never enter the query text. They are
//! sent as GraphQL variables, so a hostile repository name cannot change the
//! query's structure. [`GraphqlRequest::render_inline`] produces a
//! self-contained query for display only, escaping every string it inlines.

use serde::Serialize;
use serde_json::{Map, Value};

/// Page size of the per-repository query. Not configurable.
pub const DETAILED_PAGE_SIZE: u32 = 10;

/// Upper bound the remote API accepts for `first`.
pub const MAX_FETCH_COUNT: u32 = 100;

const DETAILED_QUERY: &str = r#"query RepositoryDiscussions($owner: String!, $name: String!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    discussions(first: $first) {
      nodes {
        title
        url
        bodyText
      }
    }
  }
}"#;

const SUMMARY_QUERY: &str = r#"query GetGitHubDiscussions($first: Int!) {
  gitHubDiscussions(first: $first) {
    edges {
      node {
        title
        url
      }
    }
  }
}"#;

const PREVIEW_QUERY: &str = r#"query GetGitHubDiscussions($first: Int!) {
  gitHubDiscussions(first: $first) {
    edges {
      node {
        id
        title
        url
        content
        gitHubRepositories {
          edges {
            node {
              name
            }
          }
        }
      }
    }
  }
}"#;

/// Clamp a configured fetch count into `1..=100`.
pub fn clamp_fetch_count(n: i64) -> u32 {
    n.clamp(1, MAX_FETCH_COUNT as i64) as u32
}

/// Which query shape to build.
#[derive(Debug, Clone, Copy)]
pub enum QueryKind<'a> {
    /// Full-content discussions of one repository.
    DetailedPerRepo { owner: &'a str, repository: &'a str },
    /// Title and link of the latest discussions across repositories.
    SummaryCrossRepo { fetch_count: i64 },
    /// Summary plus id, content and repository names, shown to administrators.
    SettingsPreview { fetch_count: i64 },
}

/// The JSON body POSTed to the GraphQL endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

pub fn build_query(kind: QueryKind<'_>) -> GraphqlRequest {
    let mut variables = Map::new();
    let query = match kind {
        QueryKind::DetailedPerRepo { owner, repository } => {
            variables.insert("owner".into(), Value::from(owner));
            variables.insert("name".into(), Value::from(repository));
            variables.insert("first".into(), Value::from(DETAILED_PAGE_SIZE));
            DETAILED_QUERY
        }
        QueryKind::SummaryCrossRepo { fetch_count } => {
            variables.insert("first".into(), Value::from(clamp_fetch_count(fetch_count)));
            SUMMARY_QUERY
        }
        QueryKind::SettingsPreview { fetch_count } => {
            variables.insert("first".into(), Value::from(clamp_fetch_count(fetch_count)));
            PREVIEW_QUERY
        }
    };

    GraphqlRequest {
        query: query.to_string(),
        variables,
    }
}

impl GraphqlRequest {
    /// The `first` value this request asks for.
    pub fn page_size(&self) -> Option<u64> {
        self.variables.get("first").and_then(Value::as_u64)
    }

    /// Substitute every `$variable` with its literal value and drop the
    /// variable declarations, for copying into other GraphQL tools.
    pub fn render_inline(&self) -> String {
        let (header, body) = match self.query.split_once('{') {
            Some((h, b)) => (h, b),
            None => return self.query.clone(),
        };
        let header = match header.split_once('(') {
            Some((name, _)) => format!("{} ", name.trim_end()),
            None => header.to_string(),
        };

        let mut out = String::with_capacity(self.query.len());
        out.push_str(&header);
        out.push('{');

        let mut chars = body.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            let mut name = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match self.variables.get(&name) {
                Some(value) => out.push_str(&graphql_literal(value)),
                None => {
                    out.push('$');
                    out.push_str(&name);
                }
            }
        }
        out
    }
}

fn graphql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", escape_graphql_string(s)),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Escape a value for a double-quoted GraphQL string literal.
pub fn escape_graphql_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use discussion_mirror::config::{parse_config, Config};
use discussion_mirror::models::DiscussionRecord;
use discussion_mirror::persist::{resolve_repository_tag, store_discussion};
use discussion_mirror::render::{EMPTY_LIST_MESSAGE, EMPTY_WIDGET_MESSAGE};
use discussion_mirror::server::{router, AppState, MANUAL_RUN_NOTICE};
use discussion_mirror::store::{InMemoryStore, Store};

fn config(extra_github: &str, server_section: &str, endpoint: &str) -> Config {
    parse_config(&format!(
        r#"
[db]
path = "/tmp/unused.sqlite"

[github]
access_token = "gh-token"
organization = "acme"
repositories = "docs"
endpoint = "{endpoint}"
{extra_github}

[server]
bind = "127.0.0.1:0"
{server_section}
"#
    ))
    .unwrap()
}

/// Serve the router on an ephemeral port and return its base URL.
async fn spawn(config: Config, store: Arc<dyn Store>) -> String {
    let app = router(AppState::new(Arc::new(config), store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let tag = resolve_repository_tag(store.as_ref(), "acme", "docs")
        .await
        .unwrap();
    for (n, title) in ["Welcome", "Roadmap & plans"].iter().enumerate() {
        store_discussion(
            store.as_ref(),
            &DiscussionRecord {
                title: title.to_string(),
                body: "First paragraph\n\nSecond".to_string(),
                url: format!("https://github.com/acme/docs/discussions/{}", n + 1),
            },
            Some(tag),
        )
        .await
        .unwrap();
    }
    store
}

#[tokio::test]
async fn test_health() {
    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), Arc::new(InMemoryStore::new())).await;
    let body: Value = http()
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_list_and_widget_render_stored_discussions() {
    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), seeded_store().await).await;

    let list = http()
        .get(format!("{}/discussions", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(list.contains("https://github.com/acme/docs/discussions/1"));
    assert!(list.contains("Roadmap &amp; plans"));
    // Newest first.
    assert!(list.find("Roadmap").unwrap() < list.find("Welcome").unwrap());

    let widget = http()
        .get(format!("{}/widget", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(widget.contains("<span class=\"repo\">docs</span>"));
}

#[tokio::test]
async fn test_empty_store_messages() {
    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), Arc::new(InMemoryStore::new())).await;

    let widget = http()
        .get(format!("{}/widget", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(widget.contains(EMPTY_WIDGET_MESSAGE));

    let block = http()
        .get(format!("{}/repositories/unknown", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(block.contains(EMPTY_LIST_MESSAGE));
}

#[tokio::test]
async fn test_repository_block_filters_by_tag() {
    let store = seeded_store().await;
    let other = resolve_repository_tag(store.as_ref(), "acme", "cli")
        .await
        .unwrap();
    store_discussion(
        store.as_ref(),
        &DiscussionRecord {
            title: "Flags".to_string(),
            body: String::new(),
            url: "https://github.com/acme/cli/discussions/1".to_string(),
        },
        Some(other),
    )
    .await
    .unwrap();

    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), store).await;
    let block = http()
        .get(format!("{}/repositories/docs", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(block.contains("Welcome"));
    assert!(!block.contains("Flags"));

    let org = http()
        .get(format!("{}/repositories/acme", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    // The organization tag covers every repository filed under it.
    assert!(org.contains("Welcome"));
    assert!(org.contains("Flags"));
}

#[tokio::test]
async fn test_redirect_to_source_when_enabled() {
    let base = spawn(
        config("enable_redirect = true", "", "http://127.0.0.1:1/graphql"),
        seeded_store().await,
    )
    .await;

    let resp = http()
        .get(format!("{}/discussions/1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FOUND);
    assert_eq!(
        resp.headers()["location"],
        "https://github.com/acme/docs/discussions/1"
    );
}

#[tokio::test]
async fn test_local_page_when_redirect_disabled() {
    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), seeded_store().await).await;

    let resp = http()
        .get(format!("{}/discussions/2", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("<h1>Roadmap &amp; plans</h1>"));
    assert!(page.contains("<p>Second</p>"));

    let missing = http()
        .get(format!("{}/discussions/99", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_run_disabled_without_token() {
    let base = spawn(config("", "", "http://127.0.0.1:1/graphql"), Arc::new(InMemoryStore::new())).await;
    let resp = http()
        .post(format!("{}/admin/run", base))
        .bearer_auth("anything")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_admin_run_rejects_wrong_token() {
    let base = spawn(
        config("", "admin_token = \"s3cret\"", "http://127.0.0.1:1/graphql"),
        Arc::new(InMemoryStore::new()),
    )
    .await;
    let resp = http()
        .post(format!("{}/admin/run", base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_run_fetches_and_stores() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer gh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "discussions": { "nodes": [
                { "title": "Fresh", "url": "https://github.com/acme/docs/discussions/9", "bodyText": "new" }
            ] } } }
        })))
        .expect(1)
        .mount(&remote)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let base = spawn(
        config(
            "",
            "admin_token = \"s3cret\"",
            &format!("{}/graphql", remote.uri()),
        ),
        store.clone(),
    )
    .await;

    let resp = http()
        .post(format!("{}/admin/run", base))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["notice"], MANUAL_RUN_NOTICE);
    assert_eq!(body["summary"]["attempted"], 1);
    assert_eq!(body["summary"]["stored"], 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_admin_run_survives_client_disconnect() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "data": { "repository": { "discussions": { "nodes": [
                        { "title": "Late", "url": "https://github.com/acme/docs/discussions/3", "bodyText": "" }
                    ] } } }
                }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&remote)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let base = spawn(
        config(
            "",
            "admin_token = \"s3cret\"",
            &format!("{}/graphql", remote.uri()),
        ),
        store.clone(),
    )
    .await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let result = impatient
        .post(format!("{}/admin/run", base))
        .bearer_auth("s3cret")
        .send()
        .await;
    assert!(result.unwrap_err().is_timeout());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.len(), 1);

    // The lock was released, so the next run goes through.
    let resp = http()
        .post(format!("{}/admin/run", base))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

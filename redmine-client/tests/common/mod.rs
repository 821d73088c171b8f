//! Shared helpers for client tests.

#![allow(dead_code)]

use redmine_client::{ConnectionSettings, HttpTransport};
use serde_json::{Value, json};

/// Configuration document with connection settings and a small schema. The
/// `uri` is replaced per test with the mock server's.
pub const CONFIG: &str = r#"
uri: http://example.com/hoge/
api_key: hoge
user_name: foo
password: bar
project_id: 4
default_fields_format:
  project:  { type: Hash, has_id: true, on_create: true, required: true }
  tracker:  { type: Hash, has_id: true, on_create: true }
  status:   { type: Hash, has_id: true, on_create: false }
  author:   { type: Hash }
  subject:  { type: String, required: true }
custom_fields_format:
  course:   { id: 21, type: String, required: true, values: [Aコース, Bコース] }
  ps_new:   { id: 17, type: Boolean }
"#;

/// Runs blocking client code off the async runtime that drives the mock
/// server.
pub async fn blocking<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking task panicked")
}

/// Settings pointing at `{server}/redmine/` with key and basic auth.
pub fn settings(server_uri: &str) -> ConnectionSettings {
    ConnectionSettings::for_uri(format!("{server_uri}/redmine/"))
        .with_api_key("hoge")
        .with_basic_auth("foo", "bar")
}

pub fn transport(server_uri: &str) -> HttpTransport {
    HttpTransport::new(settings(server_uri)).expect("transport builds")
}

/// What the tracker answers for a stored issue.
pub fn issue_document(id: u64) -> Value {
    json!({
        "issue": {
            "id": id,
            "project": { "id": 4, "name": "テストプロジェクト" },
            "tracker": { "id": 5, "name": "問い合わせ" },
            "status": { "id": 1, "name": "新規" },
            "author": { "id": 10, "name": "api redmine" },
            "subject": "テスト",
            "created_on": "2015-01-21T06:44:30Z",
            "custom_fields": [
                { "id": 21, "name": "コース", "value": "Bコース" },
                { "id": 999, "name": "謎", "value": "x" }
            ]
        }
    })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("redmine_client=debug,redmine_model=debug")
        .with_test_writer()
        .try_init();
}

//! Shared fixtures for ticket model tests.

#![allow(dead_code)]

use redmine_model::{Attributes, Registry, TicketError, TicketResult, TicketTransport};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A schema shaped like a real tenant configuration, written with the older
/// `*_format` section names.
pub const SAMPLE_CONFIG: &str = r#"
uri: http://example.com/hoge/
api_key: hoge
user_name: foo
password: bar
project_id: 4
default_fields_format:
  project:     { type: Hash, has_id: true, on_create: true, required: true }
  tracker:     { type: Hash, has_id: true, on_create: true }
  status:      { type: Hash, has_id: true, on_create: false }
  priority:    { type: Hash, has_id: true, on_create: true }
  author:      { type: Hash }
  assigned_to: { type: Hash, has_id: 'true', on_create: 'true' }
  subject:     { type: String, required: true }
  description: { type: String }
  start_date:  { type: Date }
  done_ratio:  { type: Integer }
custom_fields_format:
  course:
    id: 21
    type: String
    required: true
    values: [Aコース, Bコース, Cコース, Dコース, Eコース, Fコース]
  course_option:   { id: 22, type: Array, multiple: true, values: [foo, bar, baz] }
  contract_number: { id: 1, type: String }
  reception_date:  { id: 3, type: Date }
  ps_new:          { id: 17, type: Boolean }
"#;

pub fn registry() -> Arc<Registry> {
    Arc::new(Registry::from_yaml_str(SAMPLE_CONFIG).expect("sample config loads"))
}

/// A small schema with a list of watcher ids and the allowed-values check
/// switched off.
pub const WATCHER_CONFIG: &str = r#"
values_check: false
default_fields:
  subject:      { type: String, required: true }
  watcher_user: { type: Array, has_id: true, on_create: true }
custom_fields:
  course: { id: 21, type: String, values: [Aコース, Bコース] }
"#;

pub fn watcher_registry() -> Arc<Registry> {
    Arc::new(Registry::from_yaml_str(WATCHER_CONFIG).expect("watcher config loads"))
}

/// Turns a JSON object literal into ticket attributes.
pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("attributes must be an object, got {other}"),
    }
}

/// Attributes that pass validation against [`SAMPLE_CONFIG`].
pub fn valid_attrs() -> Attributes {
    attrs(json!({
        "subject": "テストサブジェクト",
        "description": "詳細内容",
        "tracker_id": 5,
        "priority_id": 2,
        "course": "Bコース",
    }))
}

/// In-memory tracker. Created issues get server-side fields the way Redmine
/// adds them: ids expanded to `{id, name}`, a status, an author.
#[derive(Default)]
pub struct FakeTracker {
    issues: Mutex<BTreeMap<u64, Value>>,
    next_id: AtomicU64,
    pub create_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub payloads: Mutex<Vec<Value>>,
    failure: Mutex<Option<(u16, String)>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(52),
            ..Default::default()
        }
    }

    /// Makes every following create fail with this status.
    pub fn fail_creates_with(&self, status: u16, message: &str) {
        *self.failure.lock().unwrap() = Some((status, message.to_string()));
    }

    /// Stores an issue document as if it already existed on the tracker.
    pub fn insert(&self, id: u64, document: Value) {
        self.issues.lock().unwrap().insert(id, document);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.issues.lock().unwrap().contains_key(&id)
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

impl TicketTransport for FakeTracker {
    fn fetch(&self, id: u64) -> TicketResult<Value> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.issues
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(TicketError::NotFound(id))
    }

    fn create_remote(&self, payload: &Value) -> TicketResult<Value> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if let Some((status, message)) = self.failure.lock().unwrap().clone() {
            return Err(TicketError::transport(Some(status), message));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sent = payload["issue"].as_object().cloned().unwrap_or_default();
        let mut issue = Map::new();
        issue.insert("id".into(), json!(id));
        for (key, value) in sent {
            match key.strip_suffix("_id") {
                Some(reference) => {
                    issue.insert(
                        reference.to_string(),
                        json!({ "id": value, "name": format!("{reference} #{value}") }),
                    );
                }
                None => {
                    issue.insert(key, value);
                }
            }
        }
        issue.insert("status".into(), json!({ "id": 1, "name": "新規" }));
        issue.insert("author".into(), json!({ "id": 10, "name": "api redmine" }));
        issue.insert("created_on".into(), json!("2015-01-21T06:44:30Z"));

        let document = json!({ "issue": Value::Object(issue) });
        self.insert(id, document.clone());
        Ok(document)
    }

    fn delete_remote(&self, id: u64) -> bool {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.issues.lock().unwrap().remove(&id).is_some()
    }
}

//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{TimeDelta, TimeZone as _, Utc};
use lobby_core::{
  clock::{Clock as _, ManualClock},
  document::{Document, Filter, FindOptions, Sort},
  store::DocumentStore,
  timestamp,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn doc(v: Value) -> Document { v.as_object().cloned().expect("object literal") }

fn clock() -> Arc<ManualClock> {
  Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
}

fn temp_path() -> PathBuf {
  std::env::temp_dir().join(format!("lobby-test-{}.sqlite", Uuid::new_v4()))
}

// ─── Inserts and lookups ─────────────────────────────────────────────────────

#[tokio::test]
async fn ping_succeeds() {
  store().await.ping().await.unwrap();
}

#[tokio::test]
async fn insert_and_find_one() {
  let s = store().await;
  let id = s
    .insert_one("users", doc(json!({ "name": "Alice", "udid": "u1" })))
    .await
    .unwrap();

  let found = s
    .find_one("users", &Filter::new().eq("udid", "u1"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.get("_id"), Some(&json!(id)));
  assert_eq!(found.get("name"), Some(&json!("Alice")));
}

#[tokio::test]
async fn collections_are_isolated() {
  let s = store().await;
  s.insert_one("a", doc(json!({ "k": 1 }))).await.unwrap();
  assert_eq!(s.count("a", &Filter::new()).await.unwrap(), 1);
  assert_eq!(s.count("b", &Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_id_is_rejected() {
  let s = store().await;
  s.insert_one("c", doc(json!({ "_id": "k" }))).await.unwrap();
  let err = s.insert_one("c", doc(json!({ "_id": "k" }))).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateKey(id) if id == "k"));

  // The same key in another collection is fine.
  s.insert_one("d", doc(json!({ "_id": "k" }))).await.unwrap();
}

#[tokio::test]
async fn names_that_would_break_sql_are_rejected() {
  let s = store().await;
  let err = s
    .find_one("users", &Filter::new().eq("name') OR 1=1 --", "x"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidName(_)));
}

#[tokio::test]
async fn typed_equality() {
  let s = store().await;
  s.insert_one("c", doc(json!({ "n": 1, "b": true, "s": "1" }))).await.unwrap();

  let hits = |f: Filter| {
    let s = s.clone();
    async move { s.count("c", &f).await.unwrap() }
  };
  assert_eq!(hits(Filter::new().eq("n", 1.0)).await, 1);
  assert_eq!(hits(Filter::new().eq("b", true)).await, 1);
  assert_eq!(hits(Filter::new().eq("b", 1)).await, 0);
  assert_eq!(hits(Filter::new().eq("s", 1)).await, 0);
  assert_eq!(hits(Filter::new().eq("missing", Value::Null)).await, 1);
}

// ─── Updates and deletes ─────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_creates_then_overwrites() {
  let s = store().await;
  let filter = Filter::new().eq("udid", "u1");

  let first = s
    .update_one("active_users", &filter, doc(json!({ "name": "Alice" })), true)
    .await
    .unwrap();
  assert!(!first.matched);
  assert!(first.upserted_id.is_some());

  let second = s
    .update_one("active_users", &filter, doc(json!({ "name": "Alicia" })), true)
    .await
    .unwrap();
  assert!(second.matched);

  let all = s
    .find_many("active_users", &Filter::new(), &FindOptions::new().project(["udid", "name"]))
    .await
    .unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(Value::Object(all[0].clone()), json!({ "udid": "u1", "name": "Alicia" }));
}

#[tokio::test]
async fn id_cannot_be_updated() {
  let s = store().await;
  let err = s
    .update_one("c", &Filter::new(), doc(json!({ "_id": "x" })), true)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ImmutableField(_)));
}

#[tokio::test]
async fn delete_one_removes_first_match_only() {
  let s = store().await;
  s.insert_one("c", doc(json!({ "k": 1, "n": "first" }))).await.unwrap();
  s.insert_one("c", doc(json!({ "k": 1, "n": "second" }))).await.unwrap();

  assert!(s.delete_one("c", &Filter::new().eq("k", 1)).await.unwrap());
  assert!(!s.delete_one("c", &Filter::new().eq("k", 9)).await.unwrap());

  let left = s.find_many("c", &Filter::new(), &FindOptions::new()).await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0]["n"], json!("second"));
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sort_with_ties_and_limit() {
  let s = store().await;
  s.ensure_index("c", "t").await.unwrap();
  for (n, t) in [("a", 1), ("b", 2), ("c", 1), ("d", 2)] {
    s.insert_one("c", doc(json!({ "n": n, "t": t }))).await.unwrap();
  }

  let names = |docs: Vec<Document>| -> Vec<String> {
    docs
      .into_iter()
      .map(|d| d["n"].as_str().unwrap().to_owned())
      .collect()
  };

  let asc = s
    .find_many("c", &Filter::new(), &FindOptions::new().sort(Sort::ascending("t")).limit(3))
    .await
    .unwrap();
  assert_eq!(names(asc), ["a", "c", "b"]);

  let desc = s
    .find_many("c", &Filter::new(), &FindOptions::new().sort(Sort::descending("t")))
    .await
    .unwrap();
  assert_eq!(names(desc), ["d", "b", "c", "a"]);
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_documents_are_purged() {
  let clock = clock();
  let s = SqliteStore::open_in_memory_with_clock(clock.clone()).await.unwrap();
  s.ensure_expiry("active_users", "last_active", Duration::from_secs(300))
    .await
    .unwrap();

  let stamp = timestamp::encode(clock.now());
  s.insert_one("active_users", doc(json!({ "udid": "u1", "last_active": stamp })))
    .await
    .unwrap();
  s.insert_one("active_users", doc(json!({ "udid": "u2" })))
    .await
    .unwrap();

  clock.advance(TimeDelta::seconds(299));
  assert_eq!(s.count("active_users", &Filter::new()).await.unwrap(), 2);

  clock.advance(TimeDelta::seconds(1));
  let left = s
    .find_many("active_users", &Filter::new(), &FindOptions::new().project(["udid"]))
    .await
    .unwrap();
  assert_eq!(left, vec![doc(json!({ "udid": "u2" }))]);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn documents_and_rules_survive_reopen() {
  let path = temp_path();
  let clock = clock();
  {
    let s = SqliteStore::open_with_clock(&path, clock.clone()).await.unwrap();
    s.ensure_expiry("active_users", "last_active", Duration::from_secs(60))
      .await
      .unwrap();
    s.insert_one("users", doc(json!({ "name": "Alice" }))).await.unwrap();
    let stamp = timestamp::encode(clock.now());
    s.insert_one("active_users", doc(json!({ "udid": "u1", "last_active": stamp })))
      .await
      .unwrap();
  }

  clock.advance(TimeDelta::minutes(2));
  let s = SqliteStore::open_with_clock(&path, clock.clone()).await.unwrap();
  assert_eq!(s.count("users", &Filter::new()).await.unwrap(), 1);
  assert_eq!(s.count("active_users", &Filter::new()).await.unwrap(), 0);

  drop(s);
  let _ = std::fs::remove_file(&path);
}

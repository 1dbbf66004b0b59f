//! [`SqliteStore`] — the SQLite implementation of [`DocumentStore`].

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use lobby_core::{
  clock::{Clock, SystemClock},
  document::{
    Document, ExpiryRule, Filter, FindOptions, ID_FIELD, UpdateResult, is_valid_name, new_id,
    project,
  },
  store::DocumentStore,
};
use rusqlite::{OptionalExtension as _, params, params_from_iter};
use serde_json::Value;

use crate::{
  Error, Result,
  query::{extract, json_path, order_clause, where_clause},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_clock(path, Arc::new(SystemClock)).await
  }

  pub async fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory database, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with_clock(Arc::new(SystemClock)).await
  }

  pub async fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Round-trip a trivial query to prove the connection works.
  pub async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn check_names(names: &[&str]) -> Result<()> {
  match names.iter().find(|n| !is_valid_name(n)) {
    Some(bad) => Err(Error::InvalidName((*bad).to_owned())),
    None => Ok(()),
  }
}

fn check_filter(collection: &str, filter: &Filter) -> Result<()> {
  check_names(&[collection])?;
  for (field, _) in filter.clauses() {
    check_names(&[field.as_str()])?;
  }
  Ok(())
}

fn decode_body(collection: &str, body: &str) -> Result<Document> {
  match serde_json::from_str(body)? {
    Value::Object(doc) => Ok(doc),
    _ => Err(Error::Corrupt(collection.to_owned())),
  }
}

/// [`decode_body`] for use inside a connection closure.
fn decode_body_sql(body: &str) -> rusqlite::Result<Document> {
  let fail = |e: Box<dyn std::error::Error + Send + Sync>| {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e)
  };
  match serde_json::from_str(body).map_err(|e| fail(Box::new(e)))? {
    Value::Object(doc) => Ok(doc),
    _ => Err(fail("document body is not a JSON object".into())),
  }
}

fn encode_body_sql(doc: &Document) -> rusqlite::Result<String> {
  serde_json::to_string(doc).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Delete the documents of `collection` that its TTL rule says are expired.
///
/// Runs at the start of every operation touching the collection, so callers
/// never observe an expired document.
fn purge_expired(
  conn: &rusqlite::Connection,
  collection: &str,
  now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
  let rule: Option<(String, i64)> = conn
    .query_row(
      "SELECT field, ttl_secs FROM ttl_rules WHERE collection = ?1",
      params![collection],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;
  let Some((field, ttl_secs)) = rule else { return Ok(0) };
  if !is_valid_name(&field) {
    return Ok(0);
  }

  let rule = ExpiryRule::new(field, Duration::from_secs(ttl_secs.max(0).unsigned_abs()));
  let Some(cutoff) = rule.cutoff(now) else { return Ok(0) };

  let sql = format!(
    "DELETE FROM documents
     WHERE collection = ?1 AND json_type(body, {path}) = 'text' AND {extracted} <= ?2",
    path = json_path(&rule.field),
    extracted = extract(&rule.field),
  );
  let purged = conn.execute(&sql, params![collection, cutoff])?;
  if purged > 0 {
    tracing::debug!(collection, purged, "purged expired documents");
  }
  Ok(purged)
}

enum Upsert {
  Updated,
  Inserted(String),
  Missed,
  Duplicate(String),
  InvalidId,
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  fn find_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let w = where_clause(collection, filter);
      let coll = collection.to_owned();
      let now = self.clock.now();

      let body: Option<String> = self
        .conn
        .call(move |conn| {
          purge_expired(conn, &coll, now)?;
          let sql = format!(
            "SELECT body FROM documents WHERE {} ORDER BY seq ASC LIMIT 1",
            w.sql
          );
          Ok(
            conn
              .query_row(&sql, params_from_iter(w.params.iter()), |r| r.get(0))
              .optional()?,
          )
        })
        .await?;

      body.map(|b| decode_body(collection, &b)).transpose()
    }
  }

  fn find_many<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    options: &'a FindOptions,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      if let Some(sort) = &options.sort {
        check_names(&[sort.field.as_str()])?;
      }

      let w = where_clause(collection, filter);
      let mut sql = format!(
        "SELECT body FROM documents WHERE {} {}",
        w.sql,
        order_clause(options.sort.as_ref())
      );
      if let Some(limit) = options.effective_limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
      }
      let coll = collection.to_owned();
      let now = self.clock.now();

      let bodies: Vec<String> = self
        .conn
        .call(move |conn| {
          purge_expired(conn, &coll, now)?;
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(params_from_iter(w.params.iter()), |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          Ok(rows)
        })
        .await?;

      bodies
        .iter()
        .map(|b| -> Result<Document> {
          let doc = decode_body(collection, b)?;
          Ok(match &options.projection {
            Some(fields) => project(&doc, fields),
            None => doc,
          })
        })
        .collect()
    }
  }

  fn insert_one<'a>(
    &'a self,
    collection: &'a str,
    mut document: Document,
  ) -> impl Future<Output = Result<String>> + Send + 'a {
    async move {
      check_names(&[collection])?;
      let id = match document.get(ID_FIELD) {
        None => new_id(),
        Some(Value::String(id)) => id.clone(),
        Some(_) => return Err(Error::InvalidId),
      };
      document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
      let body = serde_json::to_string(&document)?;

      let coll = collection.to_owned();
      let doc_id = id.clone();
      let now = self.clock.now();

      let inserted = self
        .conn
        .call(move |conn| {
          purge_expired(conn, &coll, now)?;
          let n = conn.execute(
            "INSERT OR IGNORE INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
            params![coll, doc_id, body],
          )?;
          Ok(n == 1)
        })
        .await?;

      if !inserted {
        return Err(Error::DuplicateKey(id));
      }
      Ok(id)
    }
  }

  fn update_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    set: Document,
    upsert: bool,
  ) -> impl Future<Output = Result<UpdateResult>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      if set.contains_key(ID_FIELD) {
        return Err(Error::ImmutableField(ID_FIELD.to_owned()));
      }

      let w = where_clause(collection, filter);
      let seed = upsert.then(|| {
        let mut doc = filter.to_document();
        doc.extend(set.clone());
        doc
      });
      let coll = collection.to_owned();
      let now = self.clock.now();

      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          purge_expired(&tx, &coll, now)?;

          let sql = format!(
            "SELECT seq, body FROM documents WHERE {} ORDER BY seq ASC LIMIT 1",
            w.sql
          );
          let hit: Option<(i64, String)> = tx
            .query_row(&sql, params_from_iter(w.params.iter()), |r| {
              Ok((r.get(0)?, r.get(1)?))
            })
            .optional()?;

          let outcome = match (hit, seed) {
            (Some((seq, body)), _) => {
              let mut doc = decode_body_sql(&body)?;
              doc.extend(set);
              tx.execute(
                "UPDATE documents SET body = ?1 WHERE seq = ?2",
                params![encode_body_sql(&doc)?, seq],
              )?;
              Upsert::Updated
            }
            (None, None) => Upsert::Missed,
            (None, Some(mut doc)) => {
              let id = match doc.get(ID_FIELD) {
                None => Some(new_id()),
                Some(Value::String(id)) => Some(id.clone()),
                Some(_) => None,
              };
              match id {
                None => Upsert::InvalidId,
                Some(id) => {
                  doc.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
                  let n = tx.execute(
                    "INSERT OR IGNORE INTO documents (collection, doc_id, body)
                     VALUES (?1, ?2, ?3)",
                    params![coll, id, encode_body_sql(&doc)?],
                  )?;
                  if n == 1 { Upsert::Inserted(id) } else { Upsert::Duplicate(id) }
                }
              }
            }
          };

          tx.commit()?;
          Ok(outcome)
        })
        .await?;

      match outcome {
        Upsert::Updated => Ok(UpdateResult { matched: true, upserted_id: None }),
        Upsert::Inserted(id) => Ok(UpdateResult { matched: false, upserted_id: Some(id) }),
        Upsert::Missed => Ok(UpdateResult::default()),
        Upsert::Duplicate(id) => Err(Error::DuplicateKey(id)),
        Upsert::InvalidId => Err(Error::InvalidId),
      }
    }
  }

  fn count<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let w = where_clause(collection, filter);
      let coll = collection.to_owned();
      let now = self.clock.now();

      let n: i64 = self
        .conn
        .call(move |conn| {
          purge_expired(conn, &coll, now)?;
          let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", w.sql);
          Ok(conn.query_row(&sql, params_from_iter(w.params.iter()), |r| r.get(0))?)
        })
        .await?;

      Ok(n.unsigned_abs())
    }
  }

  fn delete_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<bool>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let w = where_clause(collection, filter);
      let coll = collection.to_owned();
      let now = self.clock.now();

      let n = self
        .conn
        .call(move |conn| {
          purge_expired(conn, &coll, now)?;
          let sql = format!(
            "DELETE FROM documents WHERE seq =
               (SELECT seq FROM documents WHERE {} ORDER BY seq ASC LIMIT 1)",
            w.sql
          );
          Ok(conn.execute(&sql, params_from_iter(w.params.iter()))?)
        })
        .await?;

      Ok(n > 0)
    }
  }

  fn ensure_index<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      check_names(&[collection, field])?;
      let sql = format!(
        "CREATE INDEX IF NOT EXISTS \"{collection}__{field}__idx\"
         ON documents(collection, {})",
        extract(field)
      );

      self
        .conn
        .call(move |conn| {
          conn.execute(&sql, [])?;
          Ok(())
        })
        .await?;

      tracing::debug!(collection, field, "ensured index");
      Ok(())
    }
  }

  fn ensure_expiry<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      check_names(&[collection, field])?;
      let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
      let coll = collection.to_owned();
      let field_name = field.to_owned();

      self
        .conn
        .call(move |conn| {
          conn.execute(
            "INSERT INTO ttl_rules (collection, field, ttl_secs) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection) DO UPDATE
             SET field = excluded.field, ttl_secs = excluded.ttl_secs",
            params![coll, field_name, ttl_secs],
          )?;
          Ok(())
        })
        .await?;

      tracing::debug!(collection, field, ttl_secs, "installed expiry rule");
      Ok(())
    }
  }
}

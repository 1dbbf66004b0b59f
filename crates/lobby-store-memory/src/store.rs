//! [`MemoryStore`] — the in-process implementation of [`DocumentStore`].

use std::{
  collections::HashMap,
  future::Future,
  sync::{Arc, Mutex, MutexGuard},
  time::Duration,
};

use lobby_core::{
  clock::{Clock, SystemClock},
  document::{
    Direction, Document, ExpiryRule, Filter, FindOptions, ID_FIELD, UpdateResult,
    compare_values, is_valid_name, new_id, project,
  },
  store::DocumentStore,
};
use serde_json::Value;

use crate::{Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store that lives and dies with the process.
///
/// All collections share one lock; every operation takes it once and never
/// holds it across an await point.
#[derive(Debug)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
  clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
struct Inner {
  collections: HashMap<String, Vec<Entry>>,
  expiry:      HashMap<String, ExpiryRule>,
  next_seq:    u64,
}

#[derive(Debug, Clone)]
struct Entry {
  seq: u64,
  doc: Document,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock)) }

  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self { inner: Mutex::new(Inner::default()), clock }
  }

  fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
    self.inner.lock().map_err(|_| Error::Poisoned)
  }

  /// The expiry cutoff for `collection`, if it has a rule.
  fn cutoff(&self, inner: &Inner, collection: &str) -> Option<(ExpiryRule, String)> {
    let rule = inner.expiry.get(collection)?;
    let cutoff = rule.cutoff(self.clock.now())?;
    Some((rule.clone(), cutoff))
  }

  /// Live documents of `collection` matching `filter`, in insertion order.
  fn select(&self, inner: &Inner, collection: &str, filter: &Filter) -> Vec<Entry> {
    let Some(entries) = inner.collections.get(collection) else {
      return Vec::new();
    };
    let expiry = self.cutoff(inner, collection);
    entries
      .iter()
      .filter(|e| !is_expired(&expiry, &e.doc))
      .filter(|e| filter.matches(&e.doc))
      .cloned()
      .collect()
  }

  /// Drop expired documents before a write so they cannot be matched,
  /// updated or counted again.
  fn prune(&self, inner: &mut Inner, collection: &str) {
    let expiry = self.cutoff(inner, collection);
    if expiry.is_none() {
      return;
    }
    if let Some(entries) = inner.collections.get_mut(collection) {
      let before = entries.len();
      entries.retain(|e| !is_expired(&expiry, &e.doc));
      let pruned = before - entries.len();
      if pruned > 0 {
        tracing::debug!(collection, pruned, "pruned expired documents");
      }
    }
  }

  fn insert(inner: &mut Inner, collection: &str, mut doc: Document) -> Result<String> {
    let id = match doc.get(ID_FIELD) {
      None => new_id(),
      Some(Value::String(id)) => id.clone(),
      Some(_) => return Err(Error::InvalidId),
    };
    let entries = inner.collections.entry(collection.to_owned()).or_default();
    if entries
      .iter()
      .any(|e| e.doc.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
    {
      return Err(Error::DuplicateKey(id));
    }

    doc.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
    inner.next_seq += 1;
    let seq = inner.next_seq;
    inner
      .collections
      .entry(collection.to_owned())
      .or_default()
      .push(Entry { seq, doc });
    Ok(id)
  }
}

fn is_expired(expiry: &Option<(ExpiryRule, String)>, doc: &Document) -> bool {
  expiry
    .as_ref()
    .is_some_and(|(rule, cutoff)| rule.is_expired(doc, cutoff))
}

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

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for MemoryStore {
  type Error = Error;

  fn find_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let inner = self.lock()?;
      Ok(
        self
          .select(&inner, collection, filter)
          .into_iter()
          .next()
          .map(|e| e.doc),
      )
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

      let mut entries = {
        let inner = self.lock()?;
        self.select(&inner, collection, filter)
      };

      if let Some(sort) = &options.sort {
        entries.sort_by(|a, b| {
          let ord = compare_values(a.doc.get(&sort.field), b.doc.get(&sort.field))
            .then(a.seq.cmp(&b.seq));
          match sort.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
          }
        });
      }
      if let Some(limit) = options.effective_limit() {
        entries.truncate(limit);
      }

      Ok(
        entries
          .into_iter()
          .map(|e| match &options.projection {
            Some(fields) => project(&e.doc, fields),
            None => e.doc,
          })
          .collect(),
      )
    }
  }

  fn insert_one<'a>(
    &'a self,
    collection: &'a str,
    document: Document,
  ) -> impl Future<Output = Result<String>> + Send + 'a {
    async move {
      check_names(&[collection])?;
      let mut inner = self.lock()?;
      self.prune(&mut inner, collection);
      Self::insert(&mut inner, collection, document)
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

      let mut inner = self.lock()?;
      self.prune(&mut inner, collection);

      let target = inner
        .collections
        .get_mut(collection)
        .and_then(|entries| entries.iter_mut().find(|e| filter.matches(&e.doc)));
      if let Some(entry) = target {
        entry.doc.extend(set);
        return Ok(UpdateResult { matched: true, upserted_id: None });
      }
      if !upsert {
        return Ok(UpdateResult::default());
      }

      let mut doc = filter.to_document();
      doc.extend(set);
      let id = Self::insert(&mut inner, collection, doc)?;
      Ok(UpdateResult { matched: false, upserted_id: Some(id) })
    }
  }

  fn count<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<u64>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let inner = self.lock()?;
      Ok(self.select(&inner, collection, filter).len() as u64)
    }
  }

  fn delete_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<bool>> + Send + 'a {
    async move {
      check_filter(collection, filter)?;
      let mut inner = self.lock()?;
      self.prune(&mut inner, collection);

      let Some(entries) = inner.collections.get_mut(collection) else {
        return Ok(false);
      };
      match entries.iter().position(|e| filter.matches(&e.doc)) {
        Some(i) => {
          entries.remove(i);
          Ok(true)
        }
        None => Ok(false),
      }
    }
  }

  fn ensure_index<'a>(
    &'a self,
    collection: &'a str,
    field: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      check_names(&[collection, field])?;
      tracing::debug!(collection, field, "index requested on in-memory store; nothing to build");
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
      // Whole seconds, as the persistent backend stores them.
      let ttl = Duration::from_secs(ttl.as_secs());
      let mut inner = self.lock()?;
      inner
        .expiry
        .insert(collection.to_owned(), ExpiryRule::new(field, ttl));
      tracing::debug!(collection, field, ttl_secs = ttl.as_secs(), "installed expiry rule");
      Ok(())
    }
  }
}

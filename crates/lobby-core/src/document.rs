//! Documents and the query vocabulary shared by every store backend.
//!
//! A document is a flat JSON object. Filters are conjunctions of field
//! equalities; reads may additionally project, sort on one field and limit.
//! The matching and ordering rules live here so that the backends agree on
//! them; the SQLite backend expresses the same rules in SQL.

use std::{cmp::Ordering, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned, ser::Error as _};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::timestamp;

/// A stored record.
pub type Document = serde_json::Map<String, Value>;

/// The internal key every stored document carries.
pub const ID_FIELD: &str = "_id";

/// Generate a fresh internal key.
pub fn new_id() -> String { Uuid::new_v4().simple().to_string() }

/// Collection and field names must be non-empty ASCII word characters.
///
/// The SQLite backend embeds names in JSON paths and index names, so this is
/// enforced by both backends rather than only the one that needs it.
pub fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && name
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Serialize a record into its document form.
pub fn to_document<T: Serialize>(record: &T) -> Result<Document, serde_json::Error> {
  match serde_json::to_value(record)? {
    Value::Object(map) => Ok(map),
    other => Err(serde_json::Error::custom(format!(
      "expected a JSON object, got {other}"
    ))),
  }
}

/// Deserialize a record from its document form. Unknown fields (including
/// `_id`) are ignored by the record types.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, serde_json::Error> {
  serde_json::from_value(Value::Object(doc))
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A conjunction of `field == value` clauses. The empty filter matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  clauses: Vec<(String, Value)>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  /// Match documents whose internal key is `id`.
  pub fn by_id(id: impl Into<String>) -> Self { Self::new().eq(ID_FIELD, id.into()) }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.clauses.push((field.into(), value.into()));
    self
  }

  pub fn clauses(&self) -> &[(String, Value)] { &self.clauses }

  pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

  pub fn matches(&self, doc: &Document) -> bool {
    self
      .clauses
      .iter()
      .all(|(field, expected)| field_equals(doc.get(field), expected))
  }

  /// The equality clauses as a document; the seed of an upserted record.
  pub fn to_document(&self) -> Document {
    self
      .clauses
      .iter()
      .map(|(field, value)| (field.clone(), value.clone()))
      .collect()
  }
}

/// Equality as a filter clause sees it.
///
/// A `null` expectation matches a missing field. Numbers compare by value, so
/// `1` matches `1.0`, and integers compare exactly even beyond 2^53.
/// Booleans never equal numbers.
pub fn field_equals(actual: Option<&Value>, expected: &Value) -> bool {
  match (actual.unwrap_or(&Value::Null), expected) {
    (Value::Null, Value::Null) => true,
    (Value::Number(a), Value::Number(b)) => {
      compare_numbers(num_key(a), num_key(b)) == Ordering::Equal
    }
    (a, b) => a == b,
  }
}

// ─── Numbers ─────────────────────────────────────────────────────────────────

/// A JSON number as SQLite holds it: an exact integer or a double.
#[derive(Debug, Clone, Copy)]
enum NumKey {
  Int(i128),
  Float(f64),
}

fn num_key(n: &Number) -> NumKey {
  if let Some(i) = n.as_i64() {
    NumKey::Int(i.into())
  } else if let Some(u) = n.as_u64() {
    NumKey::Int(u.into())
  } else {
    NumKey::Float(n.as_f64().unwrap_or(0.0))
  }
}

/// Integers compare exactly, doubles by value (`-0.0 == 0.0`), and an
/// integer against a double without rounding either side.
fn compare_numbers(a: NumKey, b: NumKey) -> Ordering {
  match (a, b) {
    (NumKey::Int(x), NumKey::Int(y)) => x.cmp(&y),
    (NumKey::Float(x), NumKey::Float(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    (NumKey::Int(i), NumKey::Float(f)) => int_float_cmp(i, f),
    (NumKey::Float(f), NumKey::Int(i)) => int_float_cmp(i, f).reverse(),
  }
}

fn int_float_cmp(i: i128, f: f64) -> Ordering {
  const BOUND: f64 = 1.7e38; // just under 2^127
  if f.is_nan() {
    return Ordering::Equal;
  }
  if f >= BOUND {
    return Ordering::Less;
  }
  if f <= -BOUND {
    return Ordering::Greater;
  }
  let whole = f.trunc();
  match i.cmp(&(whole as i128)) {
    Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
    other => other,
  }
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
  #[default]
  Ascending,
  Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
  pub field:     String,
  pub direction: Direction,
}

impl Sort {
  pub fn ascending(field: impl Into<String>) -> Self {
    Self { field: field.into(), direction: Direction::Ascending }
  }

  pub fn descending(field: impl Into<String>) -> Self {
    Self { field: field.into(), direction: Direction::Descending }
  }
}

/// Total order over field values used for sorting.
///
/// Missing and `null` sort first, then numbers and booleans (`false` = 0,
/// `true` = 1) by value with `-0.0` equal to `0.0`, then strings byte-wise. Arrays and objects sort among
/// the strings by their compact JSON text. This is the order SQLite gives
/// `json_extract` results, which keeps the two backends in step.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (sort_key(a), sort_key(b)) {
    (SortKey::Null, SortKey::Null) => Ordering::Equal,
    (SortKey::Null, _) => Ordering::Less,
    (_, SortKey::Null) => Ordering::Greater,
    (SortKey::Number(x), SortKey::Number(y)) => compare_numbers(x, y),
    (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
    (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
    (SortKey::Text(x), SortKey::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
  }
}

enum SortKey<'a> {
  Null,
  Number(NumKey),
  Text(std::borrow::Cow<'a, str>),
}

fn sort_key(value: Option<&Value>) -> SortKey<'_> {
  match value {
    None | Some(Value::Null) => SortKey::Null,
    Some(Value::Bool(b)) => SortKey::Number(NumKey::Int(i128::from(*b))),
    Some(Value::Number(n)) => SortKey::Number(num_key(n)),
    Some(Value::String(s)) => SortKey::Text(s.as_str().into()),
    Some(other) => SortKey::Text(other.to_string().into()),
  }
}

// ─── Read options ────────────────────────────────────────────────────────────

/// Projection, sort and limit for [`DocumentStore::find_many`].
///
/// [`DocumentStore::find_many`]: crate::store::DocumentStore::find_many
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
  /// Inclusion list. `_id` is only returned when listed. `None` returns the
  /// whole document.
  pub projection: Option<Vec<String>>,
  pub sort:       Option<Sort>,
  /// Applied after sorting. `Some(0)` means no limit.
  pub limit:      Option<usize>,
}

impl FindOptions {
  pub fn new() -> Self { Self::default() }

  pub fn project<I, F>(mut self, fields: I) -> Self
  where
    I: IntoIterator<Item = F>,
    F: Into<String>,
  {
    self.projection = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn sort(mut self, sort: Sort) -> Self {
    self.sort = Some(sort);
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn effective_limit(&self) -> Option<usize> { self.limit.filter(|&n| n > 0) }
}

/// Keep only the listed fields of `doc`.
pub fn project(doc: &Document, fields: &[String]) -> Document {
  fields
    .iter()
    .filter_map(|f| doc.get(f).map(|v| (f.clone(), v.clone())))
    .collect()
}

/// Outcome of [`DocumentStore::update_one`].
///
/// [`DocumentStore::update_one`]: crate::store::DocumentStore::update_one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
  pub matched:     bool,
  pub upserted_id: Option<String>,
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

/// A time-to-live rule on one timestamp field of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRule {
  pub field: String,
  pub ttl:   Duration,
}

impl ExpiryRule {
  pub fn new(field: impl Into<String>, ttl: Duration) -> Self {
    Self { field: field.into(), ttl }
  }

  /// Encoded timestamps at or before the returned value are expired. `None`
  /// when the rule reaches back before the representable range.
  pub fn cutoff(&self, now: DateTime<Utc>) -> Option<String> {
    let ttl = TimeDelta::from_std(self.ttl).ok()?;
    now.checked_sub_signed(ttl).map(timestamp::encode)
  }

  pub fn is_expired(&self, doc: &Document, cutoff: &str) -> bool {
    matches!(doc.get(&self.field), Some(Value::String(s)) if s.as_str() <= cutoff)
  }
}

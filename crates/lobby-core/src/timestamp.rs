//! Fixed-precision text encoding for timestamps.
//!
//! Every timestamp stored in a document, and every timestamp the API returns,
//! is an RFC 3339 UTC string with exactly six fractional digits and a `Z`
//! suffix. With a fixed width, lexical order is chronological order, which is
//! what both store backends sort and expire on.
//!
//! The module doubles as a `#[serde(with = "crate::timestamp")]` adapter.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn encode(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
  S: Serializer,
{
  serializer.serialize_str(&encode(*dt))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let s = String::deserialize(deserializer)?;
  decode(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s:?}")))
}

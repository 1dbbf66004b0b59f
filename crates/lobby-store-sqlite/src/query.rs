//! Translation of [`Filter`] and [`Sort`] into SQL over the `documents` table.
//!
//! Field names are validated with [`is_valid_name`] before they get here, so
//! they can be embedded in JSON path literals; values are always bound.
//!
//! [`is_valid_name`]: lobby_core::document::is_valid_name

use lobby_core::document::{Direction, Filter, Sort};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// `'$."field"'` as an SQL string literal.
pub fn json_path(field: &str) -> String { format!("'$.\"{field}\"'") }

/// `json_extract(body, '$."field"')`.
pub fn extract(field: &str) -> String { format!("json_extract(body, {})", json_path(field)) }

/// A `WHERE` body and its positional parameters.
pub struct Where {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

/// Restrict to `collection` and every equality in `filter`.
///
/// Each clause checks the JSON type as well as the value so that, for
/// example, `true` never matches the number `1`.
pub fn where_clause(collection: &str, filter: &Filter) -> Where {
  let mut sql = String::from("collection = ?");
  let mut params = vec![SqlValue::Text(collection.to_owned())];

  for (field, value) in filter.clauses() {
    let path = json_path(field);
    let extracted = extract(field);
    match value {
      Value::Null => {
        sql.push_str(&format!(" AND {extracted} IS NULL"));
      }
      Value::Bool(b) => {
        sql.push_str(&format!(" AND json_type(body, {path}) = '{b}'"));
      }
      Value::Number(n) => {
        sql.push_str(&format!(
          " AND json_type(body, {path}) IN ('integer', 'real') AND {extracted} = ?"
        ));
        params.push(match n.as_i64() {
          Some(i) => SqlValue::Integer(i),
          None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        });
      }
      Value::String(s) => {
        sql.push_str(&format!(" AND json_type(body, {path}) = 'text' AND {extracted} = ?"));
        params.push(SqlValue::Text(s.clone()));
      }
      Value::Array(_) | Value::Object(_) => {
        let kind = if value.is_array() { "array" } else { "object" };
        sql.push_str(&format!(" AND json_type(body, {path}) = '{kind}' AND {extracted} = ?"));
        params.push(SqlValue::Text(value.to_string()));
      }
    }
  }

  Where { sql, params }
}

/// `ORDER BY` on the sort field, ties broken by insertion order in the same
/// direction. Without a sort, insertion order.
pub fn order_clause(sort: Option<&Sort>) -> String {
  match sort {
    None => "ORDER BY seq ASC".to_owned(),
    Some(sort) => {
      let dir = match sort.direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
      };
      format!("ORDER BY {} {dir}, seq {dir}", extract(&sort.field))
    }
  }
}

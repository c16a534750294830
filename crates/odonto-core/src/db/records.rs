//! Generic collection gateway.
//!
//! Records are schemaless JSON objects grouped by collection name. The typed
//! repositories build on [`CollectionStore`], so any backend implementing it
//! can stand in for the SQLite one.

use std::cmp::Ordering;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::filter::{compare_values, parse_sort, Filter};
use super::{DbError, DbResult};

/// Relation fields that `expand` can follow: (collection, field, target).
pub const RELATIONS: &[(&str, &str, &str)] = &[
    ("appointments", "patient", "patients"),
    ("presupuestos", "patient", "patients"),
    ("consultations", "patient", "patients"),
    ("periodontograms", "patient", "patients"),
    ("odontograms", "patient", "patients"),
    ("balance_ledger", "patient", "patients"),
    ("balance_ledger", "budget", "presupuestos"),
];

/// Target collection of a relation field, if registered.
pub fn relation_target(collection: &str, field: &str) -> Option<&'static str> {
    RELATIONS
        .iter()
        .find(|(c, f, _)| *c == collection && *f == field)
        .map(|(_, _, target)| *target)
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub collection: String,
    /// RFC 3339 creation time
    pub created: String,
    /// RFC 3339 last update time
    pub updated: String,
    pub fields: Map<String, Value>,
    /// Related records keyed by relation field
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub expand: Map<String, Value>,
}

impl Record {
    /// Resolve a field or dotted path. `id`, `created` and `updated` address
    /// the record's metadata.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        match path {
            "id" => return Some(Value::String(self.id.clone())),
            "created" => return Some(Value::String(self.created.clone())),
            "updated" => return Some(Value::String(self.updated.clone())),
            _ => {}
        }
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }

    /// Decode the fields (plus `id`) into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> DbResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".into(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            DbError::Validation(format!(
                "malformed {} record {}: {}",
                self.collection, self.id, e
            ))
        })
    }

    /// Decode an expanded relation.
    pub fn expanded<T: DeserializeOwned>(&self, field: &str) -> DbResult<Option<T>> {
        match self.expand.get(field) {
            Some(value) => {
                let related: Record = serde_json::from_value(value.clone())?;
                related.decode().map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Encode a typed value into record fields.
pub fn to_fields<T: Serialize>(value: &T) -> DbResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::Validation(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Options for [`CollectionStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub expand: Vec<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn expand(mut self, field: impl Into<String>) -> Self {
        self.expand.push(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Quote a string literal for a filter expression.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Abstract collection store.
pub trait CollectionStore {
    fn list(&self, collection: &str, query: &ListQuery) -> DbResult<Vec<Record>>;

    fn get(&self, collection: &str, id: &str) -> DbResult<Record>;

    /// Create a record. A string `id` field is used as the record id,
    /// otherwise a new UUID is assigned.
    fn create(&self, collection: &str, fields: Map<String, Value>) -> DbResult<Record>;

    /// Merge top-level fields into an existing record.
    fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> DbResult<Record>;

    fn delete(&self, collection: &str, id: &str) -> DbResult<()>;

    /// Like `get`, but a missing record is `None`.
    fn find(&self, collection: &str, id: &str) -> DbResult<Option<Record>> {
        match self.get(collection, id) {
            Ok(record) => Ok(Some(record)),
            Err(DbError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// First record matching a filter under the given sort.
    fn first(&self, collection: &str, filter: &str, sort: &str) -> DbResult<Option<Record>> {
        let query = ListQuery::new().filter(filter).sort(sort).limit(1);
        Ok(self.list(collection, &query)?.into_iter().next())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite-backed [`CollectionStore`] over a connection or transaction.
pub struct Records<'c> {
    conn: &'c Connection,
}

struct Row {
    seq: i64,
    record: Record,
}

/// (rowid, id, data, created, updated)
type RawRow = (i64, String, String, String, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl<'c> Records<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn build(collection: &str, raw: RawRow) -> DbResult<Row> {
        let (seq, id, data, created, updated) = raw;
        let fields = match serde_json::from_str(&data)? {
            Value::Object(map) => map,
            _ => {
                return Err(DbError::Validation(format!(
                    "{} record {} is not an object",
                    collection, id
                )))
            }
        };
        Ok(Row {
            seq,
            record: Record {
                id,
                collection: collection.to_string(),
                created,
                updated,
                fields,
                expand: Map::new(),
            },
        })
    }

    fn expand_record(&self, record: &mut Record, fields: &[String]) -> DbResult<()> {
        for field in fields {
            let Some(target) = relation_target(&record.collection, field) else {
                continue;
            };
            let Some(related_id) = record.fields.get(field).and_then(Value::as_str) else {
                continue;
            };
            if let Some(related) = self.find(target, related_id)? {
                record
                    .expand
                    .insert(field.clone(), serde_json::to_value(related)?);
            }
        }
        Ok(())
    }
}

impl CollectionStore for Records<'_> {
    fn list(&self, collection: &str, query: &ListQuery) -> DbResult<Vec<Record>> {
        let filter = query.filter.as_deref().map(Filter::parse).transpose()?;
        let sort = query.sort.as_deref().map(parse_sort).transpose()?.unwrap_or_default();

        let mut stmt = self.conn.prepare(
            r#"
            SELECT rowid, id, data, created, updated
            FROM records
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )?;
        let raw = stmt
            .query_map([collection], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for r in raw {
            let row = Self::build(collection, r)?;
            if filter.as_ref().map_or(true, |f| f.matches(&row.record)) {
                rows.push(row);
            }
        }

        if !sort.is_empty() {
            rows.sort_by(|a, b| {
                for key in &sort {
                    let left = a.record.lookup(&key.field).unwrap_or(Value::Null);
                    let right = b.record.lookup(&key.field).unwrap_or(Value::Null);
                    let ordering = compare_values(&left, &right);
                    let ordering = if key.descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                // Ties fall back to insertion order in the first key's direction.
                let ordering = a.seq.cmp(&b.seq);
                if sort[0].descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let mut records: Vec<Record> = rows.into_iter().take(limit).map(|r| r.record).collect();
        if !query.expand.is_empty() {
            for record in &mut records {
                self.expand_record(record, &query.expand)?;
            }
        }

        debug!(collection, count = records.len(), "listed records");
        Ok(records)
    }

    fn get(&self, collection: &str, id: &str) -> DbResult<Record> {
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT rowid, id, data, created, updated
                FROM records
                WHERE collection = ? AND id = ?
                "#,
                params![collection, id],
                raw_row,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", collection, id)))?;
        Ok(Self::build(collection, raw)?.record)
    }

    fn create(&self, collection: &str, mut fields: Map<String, Value>) -> DbResult<Record> {
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::String(_)) | Some(Value::Null) | None => uuid::Uuid::new_v4().to_string(),
            Some(other) => {
                return Err(DbError::Validation(format!(
                    "record id must be a string, got {}",
                    other
                )))
            }
        };
        fields.remove("expand");

        let timestamp = now();
        let data = serde_json::to_string(&fields)?;
        self.conn.execute(
            "INSERT INTO records (collection, id, data, created, updated) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![collection, id, data, timestamp],
        )?;
        debug!(collection, id = %id, "created record");

        Ok(Record {
            id,
            collection: collection.to_string(),
            created: timestamp.clone(),
            updated: timestamp,
            fields,
            expand: Map::new(),
        })
    }

    fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> DbResult<Record> {
        let mut record = self.get(collection, id)?;
        for (key, value) in fields {
            if key == "id" || key == "expand" {
                continue;
            }
            record.fields.insert(key, value);
        }
        record.updated = now();

        let data = serde_json::to_string(&record.fields)?;
        self.conn.execute(
            "UPDATE records SET data = ?3, updated = ?4 WHERE collection = ?1 AND id = ?2",
            params![collection, id, data, record.updated],
        )?;
        debug!(collection, id, "updated record");
        Ok(record)
    }

    fn delete(&self, collection: &str, id: &str) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            "DELETE FROM records WHERE collection = ? AND id = ?",
            params![collection, id],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("{}/{}", collection, id)));
        }
        debug!(collection, id, "deleted record");
        Ok(())
    }
}

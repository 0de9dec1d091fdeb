//! Row <-> symbol encoding
//!
//! Scalar fields live in their own columns so they can be filtered and
//! indexed. Everything else is carried in `payload`, a versioned JSON document
//! whose relationships are a flat list of tagged entries.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strata_core::{
    AbstractionLevel, ComponentSymbol, GenerationMeta, Relationship, Relationships, SourceLocation, StatusInfo,
    SymbolId,
};

use crate::error::{StoreError, StoreResult};

pub const PAYLOAD_VERSION: u32 = 1;

/// Column list matching [`StoredRow::from_row`].
pub(crate) const COLUMNS: &str =
    "id, namespace, name, level, kind, language, version, description, status, origin, created_at, updated_at, payload";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    v: u32,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_info: Option<StatusInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation_meta: Option<GenerationMeta>,
}

pub(crate) fn encode_payload(symbol: &ComponentSymbol) -> StoreResult<String> {
    let payload = Payload {
        v: PAYLOAD_VERSION,
        tags: symbol.tags.clone(),
        relationships: symbol.relationships.entries(),
        source_location: symbol.source_location.clone(),
        status_info: symbol.status_info.clone(),
        generation_meta: symbol.generation_meta.clone(),
    };
    Ok(serde_json::to_string(&payload)?)
}

fn decode_payload(id: &str, raw: &str) -> StoreResult<Payload> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| StoreError::corrupt(id, format!("payload is not JSON: {e}")))?;
    match value.get("v").and_then(serde_json::Value::as_u64) {
        Some(v) if v == u64::from(PAYLOAD_VERSION) => {}
        Some(v) => return Err(StoreError::corrupt(id, format!("unsupported payload version {v}"))),
        None => return Err(StoreError::corrupt(id, "payload has no version")),
    }
    serde_json::from_value(value).map_err(|e| StoreError::corrupt(id, format!("undecodable payload: {e}")))
}

/// RFC 3339 with nanoseconds so a stored timestamp reads back unchanged.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, field: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(id, format!("bad {field} {raw:?}: {e}")))
}

fn parse_column<T>(id: &str, field: &str, raw: &str) -> StoreResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| StoreError::corrupt(id, format!("bad {field}: {e}")))
}

/// One `symbols` row as read from SQLite, before decoding.
#[derive(Debug)]
pub(crate) struct StoredRow {
    id: String,
    namespace: String,
    name: String,
    level: i64,
    kind: String,
    language: String,
    version: String,
    description: String,
    status: String,
    origin: String,
    created_at: String,
    updated_at: String,
    payload: String,
}

impl StoredRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            id: row.get(0)?,
            namespace: row.get(1)?,
            name: row.get(2)?,
            level: row.get(3)?,
            kind: row.get(4)?,
            language: row.get(5)?,
            version: row.get(6)?,
            description: row.get(7)?,
            status: row.get(8)?,
            origin: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            payload: row.get(12)?,
        })
    }

    pub(crate) fn decode(self) -> StoreResult<ComponentSymbol> {
        let id = self.id.as_str();
        let level = u8::try_from(self.level)
            .ok()
            .and_then(AbstractionLevel::from_rank)
            .ok_or_else(|| StoreError::corrupt(id, format!("bad level {}", self.level)))?;
        let payload = decode_payload(id, &self.payload)?;
        let relationships = Relationships::from_entries(payload.relationships)
            .map_err(|e| StoreError::corrupt(id, e.to_string()))?;

        Ok(ComponentSymbol {
            level,
            kind: parse_column(id, "kind", &self.kind)?,
            status: parse_column(id, "status", &self.status)?,
            origin: parse_column(id, "origin", &self.origin)?,
            created_at: parse_timestamp(id, "created_at", &self.created_at)?,
            updated_at: parse_timestamp(id, "updated_at", &self.updated_at)?,
            tags: payload.tags,
            relationships,
            source_location: payload.source_location,
            status_info: payload.status_info,
            generation_meta: payload.generation_meta,
            namespace: self.namespace,
            name: self.name,
            language: self.language,
            version: self.version,
            description: self.description,
            id: SymbolId::new(self.id),
        })
    }
}

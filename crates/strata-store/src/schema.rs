//! SQLite schema and migrations

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS symbols (
    id          TEXT PRIMARY KEY NOT NULL,
    namespace   TEXT NOT NULL,
    name        TEXT NOT NULL,
    level       INTEGER NOT NULL,
    kind        TEXT NOT NULL,
    language    TEXT NOT NULL,
    version     TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL,
    origin      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    payload     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_symbols_namespace ON symbols(namespace);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_level ON symbols(level);
CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);
CREATE INDEX IF NOT EXISTS idx_symbols_status ON symbols(status);
CREATE INDEX IF NOT EXISTS idx_symbols_origin ON symbols(origin);

CREATE TABLE IF NOT EXISTS symbol_tags (
    symbol_id TEXT NOT NULL,
    tag       TEXT NOT NULL,
    PRIMARY KEY (symbol_id, tag)
);
CREATE INDEX IF NOT EXISTS idx_symbol_tags_tag ON symbol_tags(tag);

CREATE TABLE IF NOT EXISTS symbol_implements (
    symbol_id    TEXT NOT NULL,
    interface_id TEXT NOT NULL,
    PRIMARY KEY (symbol_id, interface_id)
);
CREATE INDEX IF NOT EXISTS idx_symbol_implements_interface ON symbol_implements(interface_id);

-- One row per relationship instance, owned by source_id.
CREATE TABLE IF NOT EXISTS symbol_edges (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    kind      TEXT NOT NULL,
    ordinal   INTEGER NOT NULL,
    PRIMARY KEY (source_id, ordinal)
);
CREATE INDEX IF NOT EXISTS idx_symbol_edges_target ON symbol_edges(target_id, kind);
";

/// Create or verify the schema. A database written by a newer schema is refused.
pub fn migrate(conn: &Connection) -> StoreResult<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    match version {
        0 => {
            conn.execute_batch(SCHEMA_V1)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::debug!("Initialised registry schema v{}", SCHEMA_VERSION);
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        other => Err(StoreError::corrupt(
            "<schema>",
            format!("unsupported schema version {other}, expected {SCHEMA_VERSION}"),
        )),
    }
}

//! The persistent symbol registry

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use strata_core::{
    AbstractionLevel, ComponentSymbol, EdgeKind, GenerationMeta, StatusInfo, StrataError, StrataResult, SymbolDraft,
    SymbolId, SymbolKind, SymbolOrigin, SymbolSource, SymbolStatus,
};

use crate::codec::{self, COLUMNS, StoredRow};
use crate::error::{StoreError, StoreResult};
use crate::query::{self, SymbolFilter};
use crate::schema;

/// SQLite-backed registry. Every write (the symbol row plus its tag,
/// implements and edge index rows) is a single transaction. Concurrent
/// updates of one symbol are last-writer-wins.
pub struct SymbolStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SymbolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl SymbolStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened registry at {} (journal_mode={})", path.display(), mode);
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        schema::migrate(&conn)?;
        Ok(SymbolStore {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create a symbol from a draft, generating an id when the draft has none.
    pub fn register(&self, draft: SymbolDraft) -> StoreResult<ComponentSymbol> {
        let id = draft.id.clone().unwrap_or_else(SymbolId::generate);
        let now = Utc::now();
        let symbol = draft.into_symbol(id, now, now);
        self.insert(&symbol)?;
        Ok(symbol)
    }

    /// Store `symbol` exactly as given. A duplicate id is a conflict.
    pub fn insert(&self, symbol: &ComponentSymbol) -> StoreResult<()> {
        symbol.validate()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM symbols WHERE id = ?1)",
            [symbol.id.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate(symbol.id.clone()));
        }
        insert_row(&tx, symbol)?;
        write_index_rows(&tx, symbol)?;
        tx.commit()?;
        tracing::debug!("Inserted symbol {} ({})", symbol.id, symbol.qualified_name());
        Ok(())
    }

    pub fn find(&self, id: &SymbolId) -> StoreResult<Option<ComponentSymbol>> {
        let conn = self.conn.lock();
        find_in(&conn, id)
    }

    /// Replace everything but identity and `created_at` with the draft's
    /// contents. `None` when `id` is not registered.
    pub fn update(&self, id: &SymbolId, draft: SymbolDraft) -> StoreResult<Option<ComponentSymbol>> {
        if let Some(other) = draft.id.as_ref().filter(|other| *other != id) {
            return Err(StrataError::Validation(format!("cannot change id of {id} to {other}")).into());
        }
        self.modify(id, |existing| {
            let now = Utc::now().max(existing.created_at);
            *existing = draft.into_symbol(id.clone(), existing.created_at, now);
        })
    }

    /// Set the lifecycle status and record who changed it.
    pub fn set_status(
        &self,
        id: &SymbolId,
        status: SymbolStatus,
        message: Option<String>,
        changed_by: Option<String>,
    ) -> StoreResult<Option<ComponentSymbol>> {
        self.modify(id, |symbol| {
            let now = Utc::now().max(symbol.created_at);
            symbol.status = status;
            symbol.status_info = Some(StatusInfo {
                message,
                changed_by,
                changed_at: Some(now),
            });
            symbol.updated_at = now;
        })
    }

    /// Attach bookkeeping from a code generation run. Leaves `updated_at`
    /// alone: generation does not change the definition.
    pub fn record_generation(&self, id: &SymbolId, meta: GenerationMeta) -> StoreResult<Option<ComponentSymbol>> {
        self.modify(id, |symbol| symbol.generation_meta = Some(meta))
    }

    fn modify(
        &self,
        id: &SymbolId,
        change: impl FnOnce(&mut ComponentSymbol),
    ) -> StoreResult<Option<ComponentSymbol>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let Some(mut symbol) = find_in(&tx, id)? else {
            return Ok(None);
        };
        change(&mut symbol);
        symbol.validate()?;

        let payload = codec::encode_payload(&symbol)?;
        tx.execute(
            "UPDATE symbols SET namespace = ?2, name = ?3, level = ?4, kind = ?5, language = ?6, version = ?7,
                description = ?8, status = ?9, origin = ?10, created_at = ?11, updated_at = ?12, payload = ?13
             WHERE id = ?1",
            params![
                symbol.id.as_str(),
                symbol.namespace,
                symbol.name,
                symbol.level.rank(),
                symbol.kind.as_str(),
                symbol.language,
                symbol.version,
                symbol.description,
                symbol.status.as_str(),
                symbol.origin.as_str(),
                codec::format_timestamp(&symbol.created_at),
                codec::format_timestamp(&symbol.updated_at),
                payload,
            ],
        )?;
        delete_index_rows(&tx, id)?;
        write_index_rows(&tx, &symbol)?;
        tx.commit()?;
        tracing::debug!("Updated symbol {}", id);
        Ok(Some(symbol))
    }

    /// Remove a symbol and its own index rows. References held by other
    /// symbols are left dangling. Returns whether a row was removed.
    pub fn delete(&self, id: &SymbolId) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        delete_index_rows(&tx, id)?;
        let removed = tx.execute("DELETE FROM symbols WHERE id = ?1", [id.as_str()])?;
        tx.commit()?;
        if removed > 0 {
            tracing::debug!("Deleted symbol {}", id);
        }
        Ok(removed > 0)
    }

    /// Remove every symbol. Returns how many were removed.
    pub fn clear(&self) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute_batch("DELETE FROM symbol_tags; DELETE FROM symbol_implements; DELETE FROM symbol_edges;")?;
        let removed = tx.execute("DELETE FROM symbols", [])?;
        tx.commit()?;
        tracing::info!("Cleared registry: {} symbol(s) removed", removed);
        Ok(removed)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Every symbol, ordered by namespace, name, id.
    pub fn list(&self) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default())
    }

    pub fn query(&self, filter: &SymbolFilter) -> StoreResult<Vec<ComponentSymbol>> {
        let (clause, params) = filter.to_sql();
        let sql = format!("SELECT {COLUMNS} FROM symbols WHERE {clause} ORDER BY namespace, name, id");
        let conn = self.conn.lock();
        select(&conn, &sql, params_from_iter(params))
    }

    pub fn find_by_namespace(&self, namespace: &str, include_nested: bool) -> StoreResult<Vec<ComponentSymbol>> {
        let filter = if include_nested {
            SymbolFilter::namespace_prefix(namespace)
        } else {
            SymbolFilter::namespace(namespace)
        };
        self.query(&filter)
    }

    pub fn find_by_level(&self, level: AbstractionLevel) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default().with_level(level))
    }

    pub fn find_by_kind(&self, kind: SymbolKind) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default().with_kind(kind))
    }

    pub fn find_by_tag(&self, tag: &str) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default().with_tag(tag))
    }

    pub fn find_by_status(&self, status: SymbolStatus) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default().with_status(status))
    }

    pub fn find_by_origin(&self, origin: SymbolOrigin) -> StoreResult<Vec<ComponentSymbol>> {
        self.query(&SymbolFilter::default().with_origin(origin))
    }

    /// Case-insensitive substring search over name, namespace and
    /// description, best matches first. A blank query matches nothing.
    pub fn search(&self, query: &str) -> StoreResult<Vec<ComponentSymbol>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = query::escape_like(query);
        let prefix = format!("{escaped}%");
        let substring = format!("%{escaped}%");
        let conn = self.conn.lock();
        let results = select(&conn, query::SEARCH_SQL, params![query, prefix, substring])?;
        tracing::debug!("Search {:?} matched {} symbol(s)", query, results.len());
        Ok(results)
    }

    /// Registered symbols that `id` contains.
    pub fn find_contains(&self, id: &SymbolId) -> StoreResult<Vec<ComponentSymbol>> {
        self.edge_lookup(
            "SELECT target_id FROM symbol_edges WHERE source_id = ?1 AND kind = ?2",
            id,
            EdgeKind::Contains,
        )
    }

    /// Symbols whose `contains` lists `id`.
    pub fn find_contained_by(&self, id: &SymbolId) -> StoreResult<Vec<ComponentSymbol>> {
        self.reverse_lookup(id, EdgeKind::Contains)
    }

    /// Symbols that declare a dependency on `id`.
    pub fn find_dependents(&self, id: &SymbolId) -> StoreResult<Vec<ComponentSymbol>> {
        self.reverse_lookup(id, EdgeKind::Dependency)
    }

    /// Direct subtypes of `id`.
    pub fn find_extenders(&self, id: &SymbolId) -> StoreResult<Vec<ComponentSymbol>> {
        self.reverse_lookup(id, EdgeKind::Extends)
    }

    pub fn find_implementors(&self, interface_id: &SymbolId) -> StoreResult<Vec<ComponentSymbol>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM symbols
             WHERE id IN (SELECT symbol_id FROM symbol_implements WHERE interface_id = ?1)
             ORDER BY namespace, name, id"
        );
        let conn = self.conn.lock();
        select(&conn, &sql, [interface_id.as_str()])
    }

    fn reverse_lookup(&self, id: &SymbolId, kind: EdgeKind) -> StoreResult<Vec<ComponentSymbol>> {
        self.edge_lookup(
            "SELECT source_id FROM symbol_edges WHERE target_id = ?1 AND kind = ?2",
            id,
            kind,
        )
    }

    fn edge_lookup(&self, ids_sql: &str, id: &SymbolId, kind: EdgeKind) -> StoreResult<Vec<ComponentSymbol>> {
        let sql = format!("SELECT {COLUMNS} FROM symbols WHERE id IN ({ids_sql}) ORDER BY namespace, name, id");
        let conn = self.conn.lock();
        select(&conn, &sql, params![id.as_str(), kind.as_str()])
    }

    #[cfg(test)]
    pub(crate) fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.conn.lock())
    }
}

impl SymbolSource for SymbolStore {
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>> {
        Ok(self.list()?)
    }

    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>> {
        Ok(self.find(id)?)
    }
}

fn select(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<ComponentSymbol>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, StoredRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(StoredRow::decode).collect()
}

fn find_in(conn: &Connection, id: &SymbolId) -> StoreResult<Option<ComponentSymbol>> {
    let sql = format!("SELECT {COLUMNS} FROM symbols WHERE id = ?1");
    conn.query_row(&sql, [id.as_str()], StoredRow::from_row)
        .optional()?
        .map(StoredRow::decode)
        .transpose()
}

fn insert_row(conn: &Connection, symbol: &ComponentSymbol) -> StoreResult<()> {
    let payload = codec::encode_payload(symbol)?;
    conn.execute(
        &format!("INSERT INTO symbols ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
        params![
            symbol.id.as_str(),
            symbol.namespace,
            symbol.name,
            symbol.level.rank(),
            symbol.kind.as_str(),
            symbol.language,
            symbol.version,
            symbol.description,
            symbol.status.as_str(),
            symbol.origin.as_str(),
            codec::format_timestamp(&symbol.created_at),
            codec::format_timestamp(&symbol.updated_at),
            payload,
        ],
    )?;
    Ok(())
}

fn write_index_rows(conn: &Connection, symbol: &ComponentSymbol) -> StoreResult<()> {
    let id = symbol.id.as_str();
    let mut tag_stmt = conn.prepare_cached("INSERT INTO symbol_tags (symbol_id, tag) VALUES (?1, ?2)")?;
    for tag in &symbol.tags {
        tag_stmt.execute(params![id, tag])?;
    }
    let mut impl_stmt =
        conn.prepare_cached("INSERT INTO symbol_implements (symbol_id, interface_id) VALUES (?1, ?2)")?;
    for interface in &symbol.relationships.implements {
        impl_stmt.execute(params![id, interface.as_str()])?;
    }
    let mut edge_stmt = conn
        .prepare_cached("INSERT INTO symbol_edges (source_id, target_id, kind, ordinal) VALUES (?1, ?2, ?3, ?4)")?;
    for (ordinal, rel) in symbol.relationships.entries().iter().enumerate() {
        edge_stmt.execute(params![id, rel.target().as_str(), rel.edge_kind().as_str(), ordinal as i64])?;
    }
    Ok(())
}

fn delete_index_rows(conn: &Connection, id: &SymbolId) -> StoreResult<()> {
    for table_sql in [
        "DELETE FROM symbol_tags WHERE symbol_id = ?1",
        "DELETE FROM symbol_implements WHERE symbol_id = ?1",
        "DELETE FROM symbol_edges WHERE source_id = ?1",
    ] {
        conn.execute(table_sql, [id.as_str()])?;
    }
    Ok(())
}

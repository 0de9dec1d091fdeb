//! Filtered queries and free-text search

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use strata_core::{AbstractionLevel, SymbolKind, SymbolOrigin, SymbolStatus};

/// Conjunction of optional column filters. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    #[serde(default)]
    pub namespace: Option<String>,
    /// Match `namespace` and every namespace nested below it.
    #[serde(default)]
    pub namespace_prefix: bool,
    #[serde(default)]
    pub level: Option<AbstractionLevel>,
    #[serde(default)]
    pub kind: Option<SymbolKind>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub status: Option<SymbolStatus>,
    #[serde(default)]
    pub origin: Option<SymbolOrigin>,
}

impl SymbolFilter {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        SymbolFilter {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn namespace_prefix(namespace: impl Into<String>) -> Self {
        SymbolFilter {
            namespace: Some(namespace.into()),
            namespace_prefix: true,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: AbstractionLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_kind(mut self, kind: SymbolKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_status(mut self, status: SymbolStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_origin(mut self, origin: SymbolOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.is_none()
            && self.level.is_none()
            && self.kind.is_none()
            && self.tag.is_none()
            && self.status.is_none()
            && self.origin.is_none()
    }

    /// `WHERE` clause body (without the keyword) and its positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params = Vec::new();

        if let Some(ns) = &self.namespace {
            let ns = ns.trim_end_matches('/');
            if self.namespace_prefix {
                clauses.push(r"(namespace = ? OR namespace LIKE ? ESCAPE '\')");
                params.push(Value::Text(ns.to_string()));
                params.push(Value::Text(format!("{}/%", escape_like(ns))));
            } else {
                clauses.push("namespace = ?");
                params.push(Value::Text(ns.to_string()));
            }
        }
        if let Some(level) = self.level {
            clauses.push("level = ?");
            params.push(Value::Integer(i64::from(level.rank())));
        }
        if let Some(kind) = self.kind {
            clauses.push("kind = ?");
            params.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(tag) = &self.tag {
            clauses.push("id IN (SELECT symbol_id FROM symbol_tags WHERE tag = ?)");
            params.push(Value::Text(tag.clone()));
        }
        if let Some(status) = self.status {
            clauses.push("status = ?");
            params.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(origin) = self.origin {
            clauses.push("origin = ?");
            params.push(Value::Text(origin.as_str().to_string()));
        }

        if clauses.is_empty() {
            ("1 = 1".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }
}

/// Escape `LIKE` metacharacters for use with `ESCAPE '\'`.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Ranks: 0 exact name (case-insensitive), 1 name prefix, 2 name substring,
/// 3 namespace substring, 4 description substring.
pub(crate) const SEARCH_SQL: &str = r"
SELECT id, namespace, name, level, kind, language, version, description, status, origin, created_at, updated_at, payload,
    CASE
        WHEN lower(name) = lower(?1) THEN 0
        WHEN name LIKE ?2 ESCAPE '\' THEN 1
        WHEN name LIKE ?3 ESCAPE '\' THEN 2
        WHEN namespace LIKE ?3 ESCAPE '\' THEN 3
        ELSE 4
    END AS rank
FROM symbols
WHERE name LIKE ?3 ESCAPE '\' OR namespace LIKE ?3 ESCAPE '\' OR description LIKE ?3 ESCAPE '\'
ORDER BY rank, name, id
";

//! Test fixtures for strata-core

use chrono::{DateTime, TimeZone, Utc};

use crate::model::{ComponentSymbol, SymbolDraft, SymbolId};

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Materialise a draft, using its id (or its name) as the symbol id.
pub fn build(draft: SymbolDraft) -> ComponentSymbol {
    let id = draft.id.clone().unwrap_or_else(|| SymbolId::from(draft.name.as_str()));
    draft.into_symbol(id, fixed_time(), fixed_time())
}

/// A plain class symbol named after its id.
pub fn symbol(id: &str) -> ComponentSymbol {
    build(SymbolDraft::new("app", id).with_id(id))
}

/// A symbol depending on each of `deps`, in order.
pub fn with_deps(id: &str, deps: &[&str]) -> ComponentSymbol {
    let draft = deps
        .iter()
        .fold(SymbolDraft::new("app", id).with_id(id), |d, dep| d.depends_on(*dep));
    build(draft)
}

/// `ids[0] -> ids[1] -> ... -> ids[n-1]` over dependency edges.
pub fn dependency_chain(ids: &[&str]) -> Vec<ComponentSymbol> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| match ids.get(i + 1) {
            Some(next) => with_deps(id, &[*next]),
            None => symbol(id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_chain_shape() {
        let chain = dependency_chain(&["a", "b", "c"]);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].relationships.dependencies[0].symbol_id, SymbolId::from("b"));
        assert!(chain[2].relationships.dependencies.is_empty());
    }
}

//! Read-only view of the registry that the graph engine and synthesizer borrow

use std::sync::Arc;

use crate::error::StrataResult;
use crate::model::{ComponentSymbol, SymbolId};

/// Anything that can hand out a snapshot of registered symbols.
pub trait SymbolSource {
    /// Every registered symbol.
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>>;

    /// One symbol by id; `None` when absent.
    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>>;
}

impl<T: SymbolSource + ?Sized> SymbolSource for &T {
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>> {
        (**self).symbols()
    }

    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>> {
        (**self).symbol(id)
    }
}

impl<T: SymbolSource + ?Sized> SymbolSource for Arc<T> {
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>> {
        (**self).symbols()
    }

    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>> {
        (**self).symbol(id)
    }
}

/// In-memory source, handy for previews and tests.
impl SymbolSource for [ComponentSymbol] {
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>> {
        Ok(self.to_vec())
    }

    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>> {
        Ok(self.iter().find(|s| &s.id == id).cloned())
    }
}

impl SymbolSource for Vec<ComponentSymbol> {
    fn symbols(&self) -> StrataResult<Vec<ComponentSymbol>> {
        self.as_slice().symbols()
    }

    fn symbol(&self, id: &SymbolId) -> StrataResult<Option<ComponentSymbol>> {
        self.as_slice().symbol(id)
    }
}

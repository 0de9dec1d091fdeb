//! Strata Store: SQLite persistence for the symbol registry

pub mod codec;
pub mod error;
pub mod query;
pub mod schema;
pub mod store;


pub use error::{StoreError, StoreResult};
pub use query::{SymbolFilter, escape_like};
pub use store::SymbolStore;

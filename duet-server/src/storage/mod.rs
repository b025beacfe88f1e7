//! Chat history persistence.
//!
//! The coordinator only depends on [`ChatStore`]; which backend is used is
//! decided at startup from `storage.database_url`.

mod chat_store;
mod memory;
mod sqlite;

pub use chat_store::*;
pub use memory::*;
pub use sqlite::*;

//! Message store backends for tabletalk.
//!
//! Two implementations of [`tabletalk_core::MessageStore`]:
//! - [`SqliteStore`] — production backend over `sqlx`
//! - [`InMemoryStore`] — ephemeral backend for tests

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

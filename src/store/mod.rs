//! Session storage.
//!
//! [`SqlStore`] keeps one row per session in a relational table and hands
//! out signed id cookies. [`Registry`] caches the sessions of a single
//! request on top of it.

mod registry;
mod schema;
mod sql;

pub use registry::Registry;
pub use schema::is_permission_denied;
pub use sql::{SqlStore, StoreOptions, DEFAULT_TABLE, MAX_SESSION_AGE};

//! # sqlsession
//!
//! SQL-backed web sessions with signed cookies and background expiry
//! cleanup.
//!
//! Session values live in a database table, one row per session; the
//! browser only holds a signed (optionally encrypted) cookie carrying the
//! row id. A background task periodically deletes rows whose expiry time
//! has passed and can be stopped deterministically.
//!
//! ## Features
//!
//! - **SQLite storage**: table and trigger created on open, statements
//!   prepared once and shared
//! - **Secure cookies**: HMAC-SHA256 signing, optional AES-GCM encryption,
//!   key rotation through multiple codecs
//! - **Expiry sweeping**: cancellable tokio task with a stop handshake
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use axum::http::HeaderMap;
//! use sqlsession::codec::KeyPair;
//! use sqlsession::store::{SqlStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> sqlsession::Result<()> {
//!     sqlsession::logging::try_init("info").ok();
//!
//!     let options = StoreOptions::new("sessions", "/", 3600, vec![KeyPair::signing(*b"secret")]);
//!     let store = SqlStore::open("sqlite://sessions.db", options).await?;
//!     let cleanup = store.cleanup(Duration::from_secs(60));
//!
//!     let request = HeaderMap::new();
//!     let mut session = store.new_session(&request, "session").await;
//!     session.values.insert("user".into(), "alice".into());
//!
//!     let mut response = HeaderMap::new();
//!     store.save(&mut session, &mut response).await?;
//!
//!     store.stop_cleanup(cleanup).await;
//!     store.close().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cleanup;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use cleanup::{
    spawn_cleanup, CleanupHandle, Purge, DEFAULT_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL,
};
pub use codec::{CodecError, KeyPair, SecureCookie};
pub use error::{Result, SessionError};
pub use session::{CookieOptions, Session, Values};
pub use store::{Registry, SqlStore, StoreOptions};

//! Demo HTTP API for the session store.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information and stored session count
//! - `GET /api/v1/visits` - Count a visit in the caller's session
//! - `DELETE /api/v1/visits` - Delete the caller's session
//!
//! ## Example
//!
//! ```no_run
//! use sqlsession::api::{serve_with_state, AppState, ServerConfig};
//! use sqlsession::codec::KeyPair;
//! use sqlsession::store::{SqlStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> sqlsession::Result<()> {
//!     let options = StoreOptions::new("sessions", "/", 3600, vec![KeyPair::signing(*b"secret")]);
//!     let store = SqlStore::open("sqlite://sessions.db", options).await?;
//!     let state = AppState::new(store, "session");
//!     serve_with_state(ServerConfig::new("127.0.0.1", 3000), state, std::future::pending()).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::AppState;
pub use router::{create_router_with_state, serve_with_state, ServerConfig};
pub use types::{ErrorResponse, VisitResponse};

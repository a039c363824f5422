//! Session module.
//!
//! This module provides the request-scoped session object and the helpers
//! that move session identifiers in and out of HTTP cookies.

pub mod cookies;
mod types;

pub use cookies::{new_cookie, read_cookie, set_cookie};
pub use types::{CookieOptions, Session, Values};

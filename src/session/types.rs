//! Request-scoped session object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Session key/value pairs, persisted as one blob.
pub type Values = HashMap<String, serde_json::Value>;

/// Attributes written on the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    /// Cookie path.
    pub path: String,
    /// Cookie domain; host-only when unset.
    pub domain: Option<String>,
    /// Lifetime in seconds. Zero makes a browser-session cookie, a negative
    /// value deletes the cookie.
    pub max_age: i64,
    /// Only send over HTTPS.
    pub secure: bool,
    /// Hide from client-side scripts.
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: 86400 * 30,
            secure: false,
            http_only: true,
        }
    }
}

impl CookieOptions {
    /// Options with the given path and lifetime.
    pub fn new(path: impl Into<String>, max_age: i64) -> Self {
        Self {
            path: path.into(),
            max_age,
            ..Default::default()
        }
    }

    /// Copy of these options that tells the browser to drop the cookie.
    pub fn expired(&self) -> Self {
        Self {
            max_age: -1,
            ..self.clone()
        }
    }
}

/// A web session as seen by request handling code.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    /// Database-assigned identifier; empty until the session is first saved.
    pub id: String,
    /// Session values.
    pub values: Values,
    /// True until the session has been loaded from or written to the store.
    pub is_new: bool,
    /// Cookie attributes used when the session is saved.
    pub options: CookieOptions,
}

impl Session {
    /// Create an empty, unsaved session.
    pub fn new(name: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            values: Values::new(),
            is_new: true,
            options,
        }
    }

    /// Cookie name this session is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the session has a row in the store.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }
}

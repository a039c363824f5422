//! Per-request session cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use axum::http::HeaderMap;

use super::SqlStore;
use crate::session::Session;
use crate::Result;

/// Caches the sessions a single request touches, so that asking for the
/// same session twice returns the same object.
pub struct Registry<'a> {
    store: &'a SqlStore,
    request: &'a HeaderMap,
    sessions: HashMap<String, Session>,
}

impl<'a> Registry<'a> {
    /// Create a registry for one request.
    pub fn new(store: &'a SqlStore, request: &'a HeaderMap) -> Self {
        Self {
            store,
            request,
            sessions: HashMap::new(),
        }
    }

    /// Return the session called `name`, loading it on first access.
    pub async fn get(&mut self, name: &str) -> &mut Session {
        match self.sessions.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let session = self.store.new_session(self.request, name).await;
                entry.insert(session)
            }
        }
    }

    /// Number of sessions loaded so far.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Save every loaded session, appending their cookies to `response`.
    pub async fn save(&mut self, response: &mut HeaderMap) -> Result<()> {
        for session in self.sessions.values_mut() {
            self.store.save(session, response).await?;
        }
        Ok(())
    }
}

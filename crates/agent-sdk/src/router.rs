//! Session affinity: which endpoint last carried traffic for a session.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::EndpointId;

/// `session_id -> endpoint`, last writer wins.  Entries live until
/// [`forget`](Self::forget).
#[derive(Debug, Default)]
pub struct SessionRouter {
    routes: Mutex<HashMap<String, EndpointId>>,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session_id: &str, endpoint: EndpointId) {
        let prev = self.routes.lock().insert(session_id.to_owned(), endpoint);
        if prev.is_some_and(|p| p != endpoint) {
            tracing::debug!(session_id, endpoint = %endpoint, "session moved endpoint");
        }
    }

    pub fn route(&self, session_id: &str) -> Option<EndpointId> {
        self.routes.lock().get(session_id).copied()
    }

    pub fn forget(&self, session_id: &str) -> Option<EndpointId> {
        self.routes.lock().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }
}

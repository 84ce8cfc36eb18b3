use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::editor::ConfigEditor;

/// Sessions untouched for this long are dropped on the next `open`.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// One open configuration session.
pub struct EditorSession {
    pub id: String,
    pub last_used: Instant,
    /// Locked per session so a slow child enrichment does not block other sessions.
    pub editor: Arc<Mutex<ConfigEditor>>,
}

impl EditorSession {
    pub fn new(editor: ConfigEditor) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            last_used: Instant::now(),
            editor: Arc::new(Mutex::new(editor)),
        }
    }
}

/// In-memory registry of open editing sessions. Nothing survives a restart;
/// the exported document is the only durable artifact.
pub struct SessionStore {
    sessions: HashMap<String, EditorSession>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Register a session and return its id. Idle sessions are evicted first.
    pub fn open(&mut self, editor: ConfigEditor) -> String {
        self.evict_idle(Instant::now());
        let session = EditorSession::new(editor);
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Look up a session's editor and mark the session as used.
    pub fn editor(&mut self, id: &str) -> Option<Arc<Mutex<ConfigEditor>>> {
        let session = self.sessions.get_mut(id)?;
        session.last_used = Instant::now();
        Some(session.editor.clone())
    }

    /// Drop sessions idle for at least [`SESSION_IDLE_TTL`] as of `now`.
    /// Returns how many were dropped.
    pub fn evict_idle(&mut self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_used) < SESSION_IDLE_TTL);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "idle configuration sessions evicted");
        }
        evicted
    }

    /// Close a session (returns false if it was not open).
    pub fn close(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_lookup_close() {
        let mut store = SessionStore::new();
        let id = store.open(ConfigEditor::new("Orders", vec![]));
        assert_eq!(store.len(), 1);

        let editor = store.editor(&id).unwrap();
        assert_eq!(editor.lock().await.table(), "Orders");

        assert!(store.close(&id));
        assert!(!store.close(&id));
        assert!(store.editor(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut store = SessionStore::new();
        let a = store.open(ConfigEditor::new("A", vec![]));
        let b = store.open(ConfigEditor::new("A", vec![]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_idle_sessions_evicted() {
        let mut store = SessionStore::new();
        let stale = store.open(ConfigEditor::new("Stale", vec![]));
        let fresh = store.open(ConfigEditor::new("Fresh", vec![]));

        let later = Instant::now() + SESSION_IDLE_TTL;
        store.sessions.get_mut(&fresh).unwrap().last_used = later;

        assert_eq!(store.evict_idle(later), 1);
        assert!(store.editor(&stale).is_none());
        assert!(store.editor(&fresh).is_some());
    }

    #[test]
    fn test_lookup_refreshes_last_used() {
        let mut store = SessionStore::new();
        let id = store.open(ConfigEditor::new("Orders", vec![]));
        let opened = store.sessions[&id].last_used;

        std::thread::sleep(Duration::from_millis(5));
        assert!(store.editor(&id).is_some());
        assert!(store.sessions[&id].last_used > opened);
        assert_eq!(store.evict_idle(Instant::now()), 0);
    }
}

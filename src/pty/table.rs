//! Concurrent session table, bounded by the configured session cap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::session::Session;

/// The only shared mutable state in the system. Owns every live session;
/// nothing else may close or duplicate a session's pty handles outside the
/// `remove` path.
pub struct SessionTable {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
}

impl SessionTable {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Atomic check-and-insert. Returns false when the table is full or the
    /// id is already present; the caller must then tear the session down
    /// itself (the table took no ownership).
    pub fn try_insert(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions || sessions.contains_key(&session.id) {
            return false;
        }
        sessions.insert(session.id.clone(), session);
        true
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Atomic removal. The returned session is the caller's to reclaim; the
    /// table holds no reference to it afterwards.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    /// Consistent point-in-time copy of the live sessions, safe to iterate
    /// while inserts and removes happen from other call sites.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::PtyLauncher;

    fn sleeper(id: &str) -> Arc<Session> {
        let launcher = PtyLauncher::new(vec!["/bin/sh".into(), "-c".into()], "sh".into(), 24, 80);
        let launched = launcher.launch("sleep 30").unwrap();
        Arc::new(Session::new(id.to_string(), "sleep 30".into(), launched))
    }

    fn teardown(table: &SessionTable) {
        for session in table.snapshot() {
            session.kill();
        }
    }

    #[test]
    fn insert_respects_capacity() {
        let table = SessionTable::new(2);
        assert!(table.try_insert(sleeper("a")));
        assert!(table.try_insert(sleeper("b")));
        let overflow = sleeper("c");
        assert!(!table.try_insert(overflow.clone()));
        assert_eq!(table.len(), 2);
        overflow.kill();
        teardown(&table);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let table = SessionTable::new(4);
        assert!(table.try_insert(sleeper("a")));
        let dup = sleeper("a");
        assert!(!table.try_insert(dup.clone()));
        assert_eq!(table.len(), 1);
        dup.kill();
        teardown(&table);
    }

    #[test]
    fn remove_returns_the_entry_exactly_once() {
        let table = SessionTable::new(4);
        assert!(table.is_empty());
        let session = sleeper("a");
        assert!(table.try_insert(session.clone()));
        assert!(!table.is_empty());
        let removed = table.remove("a").expect("entry present");
        assert_eq!(removed.id, "a");
        assert!(table.remove("a").is_none());
        assert!(table.lookup("a").is_none());
        assert!(table.is_empty());
        session.kill();
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let table = SessionTable::new(4);
        assert!(table.try_insert(sleeper("a")));
        let snap = table.snapshot();
        assert!(table.try_insert(sleeper("b")));
        assert_eq!(snap.len(), 1);
        assert_eq!(table.len(), 2);
        teardown(&table);
    }
}

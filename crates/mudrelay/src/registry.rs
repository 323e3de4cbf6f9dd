//! Session 登記表
//!
//! 以 `DashMap` 分片加鎖，不同 session 的查詢、加入與移除互不阻塞。
//! 回傳的都是 `Arc` 複本，呼叫端不會在 `.await` 期間持有 map 的鎖。

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::RelayError;
use crate::session::{Session, SessionId};

/// 所有存活中的 session
pub struct SessionRegistry<T = Session> {
    sessions: DashMap<SessionId, Arc<T>>,
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// 加入新的 session，同一個 id 只能有一個
    pub fn insert(&self, id: SessionId, session: Arc<T>) -> Result<(), RelayError> {
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(RelayError::SessionExists(id)),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<T>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// 移除 session
    ///
    /// 同時有多個呼叫者時只有一個會拿到 `Some`，由它負責關閉連線。
    pub fn remove(&self, id: SessionId) -> Option<Arc<T>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        registry.insert(id, Arc::new("mud")).unwrap();

        assert!(registry.contains(id));
        assert_eq!(registry.get(id).as_deref(), Some(&"mud"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        registry.insert(id, Arc::new(1)).unwrap();

        let result = registry.insert(id, Arc::new(2));
        assert!(matches!(result, Err(RelayError::SessionExists(_))));
        assert_eq!(registry.get(id).as_deref(), Some(&1));
    }

    #[test]
    fn test_remove_only_once() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        registry.insert(id, Arc::new(())).unwrap();

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids() {
        let registry = SessionRegistry::new();
        let a = SessionId::new();
        let b = SessionId::new();
        registry.insert(a, Arc::new(())).unwrap();
        registry.insert(b, Arc::new(())).unwrap();

        let mut ids = registry.ids();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_has_single_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let id = SessionId::new();
        registry.insert(id, Arc::new(())).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.remove(id).is_some() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

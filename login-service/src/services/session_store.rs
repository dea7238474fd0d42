use async_trait::async_trait;
use chrono::Duration;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Session, SessionId, SessionRecord};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session for `user_id` under a freshly generated id.
    ///
    /// The user's previously created session, if still live, is invalidated.
    async fn create(
        &self,
        user_id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<Session, anyhow::Error>;

    async fn find(&self, session_id: &SessionId) -> Result<Option<Session>, anyhow::Error>;

    /// Idempotent: invalidating an unknown id succeeds.
    async fn invalidate(&self, session_id: &SessionId) -> Result<(), anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

fn session_key(storage_key: &str) -> String {
    format!("session:{}", storage_key)
}

fn user_session_key(user_id: &Uuid) -> String {
    format!("user_session:{}", user_id)
}

fn ttl_seconds(ttl: Duration) -> i64 {
    ttl.num_seconds().max(1)
}

/// Redis-backed session store.
///
/// `session:<sha256(id)>` holds the JSON `SessionRecord`; `user_session:<user_id>`
/// points at the user's latest session so a new login can retire it.
#[derive(Clone)]
pub struct RedisSessionStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects on its own after transient failures
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get Redis connection manager");
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<Session, anyhow::Error> {
        let mut conn = self.manager.clone();
        let session = Session::new(user_id, username, ttl)?;
        let storage_key = session.session_id.storage_key();
        let payload = serde_json::to_string(&session.record())?;
        let expiry = ttl_seconds(ttl);

        let (previous,): (Option<String>,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(session_key(&storage_key))
            .arg(payload)
            .arg("EX")
            .arg(expiry)
            .ignore()
            .cmd("SET")
            .arg(user_session_key(&user_id))
            .arg(&storage_key)
            .arg("EX")
            .arg(expiry)
            .arg("GET")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create session: {}", e))?;

        if let Some(previous) = previous.filter(|p| *p != storage_key) {
            redis::cmd("DEL")
                .arg(session_key(&previous))
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to retire previous session: {}", e))?;
        }

        Ok(session)
    }

    async fn find(&self, session_id: &SessionId) -> Result<Option<Session>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(session_key(&session_id.storage_key()))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session: {}", e))?;

        match payload {
            Some(json) => {
                let record: SessionRecord = serde_json::from_str(&json)
                    .map_err(|e| anyhow::anyhow!("Corrupt session record: {}", e))?;
                Ok(Some(record.into_session(session_id.clone())))
            }
            None => Ok(None),
        }
    }

    async fn invalidate(&self, session_id: &SessionId) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(session_key(&session_id.storage_key()))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to invalidate session: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

#[derive(Default)]
struct MockSessions {
    by_key: HashMap<String, SessionRecord>,
    latest_by_user: HashMap<Uuid, String>,
}

/// In-memory session store for tests and local wiring.
pub struct MockSessionStore {
    inner: Mutex<MockSessions>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockSessions::default()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `create` calls that reached storage.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.lock().map(|s| s.by_key.len()).unwrap_or(0)
    }

    /// Insert a record directly, e.g. an already-expired session.
    pub fn insert(&self, session: &Session) -> Result<(), anyhow::Error> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?
            .by_key
            .insert(session.session_id.storage_key(), session.record());
        Ok(())
    }

    fn ensure_available(&self) -> Result<(), anyhow::Error> {
        if !self.available.load(Ordering::SeqCst) {
            anyhow::bail!("Session store connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<Session, anyhow::Error> {
        self.ensure_available()?;
        let session = Session::new(user_id, username, ttl)?;
        let storage_key = session.session_id.storage_key();

        let mut inner = self
            .inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?;
        inner.by_key.insert(storage_key.clone(), session.record());
        let previous = inner.latest_by_user.insert(user_id, storage_key);
        if let Some(previous) = previous {
            inner.by_key.remove(&previous);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(session)
    }

    async fn find(&self, session_id: &SessionId) -> Result<Option<Session>, anyhow::Error> {
        self.ensure_available()?;
        let record = self
            .inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?
            .by_key
            .get(&session_id.storage_key())
            .cloned();
        Ok(record.map(|r| r.into_session(session_id.clone())))
    }

    async fn invalidate(&self, session_id: &SessionId) -> Result<(), anyhow::Error> {
        self.ensure_available()?;
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock session mutex poisoned: {}", e))?
            .by_key
            .remove(&session_id.storage_key());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_find() {
        let store = MockSessionStore::new();
        let user_id = Uuid::new_v4();
        let session = store.create(user_id, "alice", Duration::seconds(60)).await.unwrap();

        let found = store.find(&session.session_id).await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.username, "alice");
        assert_eq!(found.session_id, session.session_id);
    }

    #[tokio::test]
    async fn test_create_retires_previous_session_for_user() {
        let store = MockSessionStore::new();
        let user_id = Uuid::new_v4();
        let first = store.create(user_id, "alice", Duration::seconds(60)).await.unwrap();
        let second = store.create(user_id, "alice", Duration::seconds(60)).await.unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(store.find(&first.session_id).await.unwrap().is_none());
        assert!(store.find(&second.session_id).await.unwrap().is_some());
        assert_eq!(store.live_sessions(), 1);
    }

    #[tokio::test]
    async fn test_sessions_of_other_users_are_untouched() {
        let store = MockSessionStore::new();
        let alice = store.create(Uuid::new_v4(), "alice", Duration::seconds(60)).await.unwrap();
        let _bob = store.create(Uuid::new_v4(), "bob", Duration::seconds(60)).await.unwrap();
        assert!(store.find(&alice.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let store = MockSessionStore::new();
        let session = store.create(Uuid::new_v4(), "alice", Duration::seconds(60)).await.unwrap();

        store.invalidate(&session.session_id).await.unwrap();
        store.invalidate(&session.session_id).await.unwrap();
        assert!(store.find(&session.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_writes_nothing() {
        let store = MockSessionStore::new();
        store.set_available(false);
        assert!(store.create(Uuid::new_v4(), "alice", Duration::seconds(60)).await.is_err());
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.live_sessions(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn test_redis_session_lifecycle() {
        let config = crate::config::RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        };
        let store = RedisSessionStore::new(&config).await.unwrap();
        let user_id = Uuid::new_v4();

        let first = store.create(user_id, "alice", Duration::seconds(30)).await.unwrap();
        let second = store.create(user_id, "alice", Duration::seconds(30)).await.unwrap();
        assert!(store.find(&first.session_id).await.unwrap().is_none());
        assert!(store.find(&second.session_id).await.unwrap().is_some());

        store.invalidate(&second.session_id).await.unwrap();
        assert!(store.find(&second.session_id).await.unwrap().is_none());
    }
}

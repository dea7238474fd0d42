use async_trait::async_trait;
use sqlx::{postgres::PgPool, FromRow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::CredentialRecord;
use crate::utils::PasswordHashString;

/// How usernames are matched. Decided by the store, not by callers.
///
/// Case folding is only guaranteed to agree across stores for ASCII. The
/// in-memory store folds with Unicode `to_lowercase`; PostgreSQL's `LOWER()`
/// follows the database collation, which under the `C` locale leaves
/// non-ASCII letters untouched. Deployments with non-ASCII usernames should
/// use a UTF-8 collation or keep matching case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernamePolicy {
    /// Byte-for-byte match.
    CaseSensitive,
    /// Match on the lowercase form.
    CaseInsensitive,
}

impl UsernamePolicy {
    /// Canonical lookup key for `username` under this policy.
    pub fn lookup_key(&self, username: &str) -> String {
        match self {
            UsernamePolicy::CaseSensitive => username.to_string(),
            UsernamePolicy::CaseInsensitive => username.to_lowercase(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// One read, no writes. `Err` only when the store cannot answer.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(FromRow)]
struct CredentialRow {
    user_id: Uuid,
    username: String,
    password_hash: String,
}

impl From<CredentialRow> for CredentialRecord {
    fn from(row: CredentialRow) -> Self {
        CredentialRecord::new(
            row.user_id,
            row.username,
            PasswordHashString::new(row.password_hash),
        )
    }
}

/// PostgreSQL-backed credential store over the `credentials` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    policy: UsernamePolicy,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool, policy: UsernamePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, anyhow::Error> {
        // Prepared statement; the username is only ever a bound parameter.
        let sql = match self.policy {
            UsernamePolicy::CaseSensitive => {
                "SELECT user_id, username, password_hash FROM credentials WHERE username = $1"
            }
            UsernamePolicy::CaseInsensitive => {
                "SELECT user_id, username, password_hash FROM credentials WHERE LOWER(username) = LOWER($1)"
            }
        };

        let row = sqlx::query_as::<_, CredentialRow>(sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to look up credentials: {}", e))?;

        Ok(row.map(CredentialRecord::from))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;
        Ok(())
    }
}

/// In-memory credential store for tests and local wiring.
pub struct MockCredentialStore {
    policy: UsernamePolicy,
    records: Mutex<HashMap<String, CredentialRecord>>,
    available: AtomicBool,
    lookups: AtomicUsize,
}

impl Default for MockCredentialStore {
    fn default() -> Self {
        Self::new(UsernamePolicy::CaseSensitive)
    }
}

impl MockCredentialStore {
    pub fn new(policy: UsernamePolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, record: CredentialRecord) -> Result<(), anyhow::Error> {
        let key = self.policy.lookup_key(&record.username);
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock credential mutex poisoned: {}", e))?;
        if records.contains_key(&key) {
            anyhow::bail!("Username already provisioned");
        }
        records.insert(key, record);
        Ok(())
    }

    /// Simulate the backing database going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, anyhow::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            anyhow::bail!("Credential store connection refused");
        }

        let record = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock credential mutex poisoned: {}", e))?
            .get(&self.policy.lookup_key(username))
            .cloned();
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        if !self.available.load(Ordering::SeqCst) {
            anyhow::bail!("Credential store connection refused");
        }
        Ok(())
    }
}

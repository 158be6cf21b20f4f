//! # SQLite Interview Store
//!
//! Pooled SQLite handle (`r2d2` + `r2d2_sqlite`) holding two relations:
//! `interviews` and `messages`, with a secondary index on
//! `messages.interview_id`.
//!
//! ## Concurrency:
//! Every call checks a connection out of the pool, so the handle is cheap to
//! clone and safe to share. Calls block on I/O; async callers go through
//! [`InterviewStore::blocking`], which moves the work onto tokio's blocking pool.

use super::models::{
    normalize_skills, Interview, InterviewStatus, InterviewTitle, InterviewWithMessages, Message,
    MessageRole,
};
use super::StoreError;
use crate::config::DatabaseConfig;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS interviews (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        skills TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'created',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        interview_id TEXT NOT NULL REFERENCES interviews(id) ON DELETE RESTRICT,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_interview_id ON messages(interview_id);
"#;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabasePath {
    File(PathBuf),
    Memory,
}

impl DatabasePath {
    /// `":memory:"` selects an in-memory database, anything else is a file path.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == ":memory:" {
            DatabasePath::Memory
        } else {
            DatabasePath::File(PathBuf::from(raw))
        }
    }

    fn to_manager(&self) -> SqliteConnectionManager {
        match self {
            DatabasePath::File(path) => {
                SqliteConnectionManager::file(path).with_flags(Self::open_flags())
            }
            DatabasePath::Memory => SqliteConnectionManager::memory().with_flags(Self::open_flags()),
        }
    }

    fn open_flags() -> OpenFlags {
        OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX
    }

    fn as_path(&self) -> Option<&Path> {
        match self {
            DatabasePath::File(path) => Some(path.as_path()),
            DatabasePath::Memory => None,
        }
    }
}

/// Settings needed to open the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: DatabasePath,
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            path: DatabasePath::Memory,
            pool_size: 1,
            busy_timeout: Duration::from_millis(250),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: DatabasePath::File(path.into()),
            pool_size: 4,
            busy_timeout: Duration::from_millis(250),
        }
    }

    /// Each in-memory connection is its own database, so the pool is pinned to one.
    fn effective_pool_size(&self) -> u32 {
        match self.path {
            DatabasePath::Memory => 1,
            DatabasePath::File(_) => self.pool_size.max(1),
        }
    }
}

impl From<&DatabaseConfig> for StoreConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            path: DatabasePath::parse(&config.path),
            pool_size: config.pool_size,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Handle to the interview database.
#[derive(Clone)]
pub struct InterviewStore {
    pool: Pool<SqliteConnectionManager>,
    db_path: Option<PathBuf>,
}

impl InterviewStore {
    /// Builds the connection pool. Does not touch the schema; call
    /// [`ensure_schema`](Self::ensure_schema) before first use.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config
            .path
            .as_path()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        let busy_timeout = config.busy_timeout;
        let manager = config
            .path
            .to_manager()
            .with_init(move |conn| Self::configure_connection(conn, busy_timeout));

        let mut builder = Pool::builder()
            .max_size(config.effective_pool_size())
            .connection_timeout(Duration::from_secs(5));
        if config.path == DatabasePath::Memory {
            // Dropping the only connection would drop the database with it.
            builder = builder.idle_timeout(None).max_lifetime(None);
        }
        let pool = builder.build(manager)?;

        info!(
            path = ?config.path.as_path(),
            pool_size = config.effective_pool_size(),
            "Interview store opened"
        );

        Ok(Self {
            pool,
            db_path: config.path.as_path().map(Path::to_path_buf),
        })
    }

    /// Opens the store and bootstraps the schema in one step.
    pub fn bootstrap(config: StoreConfig) -> Result<Self, StoreError> {
        let store = Self::open(config)?;
        store.ensure_schema()?;
        Ok(store)
    }

    /// Run `f` against this store on tokio's blocking pool.
    pub async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&InterviewStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?
    }

    pub(crate) fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        Ok(())
    }

    /// Create both relations and the message index if they are missing.
    /// Safe to call any number of times, including concurrently.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)?;
        debug!("Interview schema ensured");
        Ok(())
    }

    /// Cheap round trip used by health checks.
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Insert a fresh interview with status `created`.
    pub fn create_interview(
        &self,
        title: InterviewTitle,
        skills: &[String],
    ) -> Result<Interview, StoreError> {
        let skills = normalize_skills(skills).map_err(StoreError::Validation)?;
        let now = now_millis();
        let interview = Interview {
            id: Uuid::new_v4().to_string(),
            title,
            skills,
            status: InterviewStatus::Created,
            created_at: now,
            updated_at: now,
        };

        let encoded_skills = serde_json::to_string(&interview.skills)?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO interviews (id, title, skills, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                interview.id,
                interview.title.as_str(),
                encoded_skills,
                interview.status.as_str(),
                format_timestamp(&interview.created_at),
                format_timestamp(&interview.updated_at),
            ],
        )?;

        debug!(interview_id = %interview.id, title = %interview.title, "Interview created");
        Ok(interview)
    }

    /// Interview plus its messages in creation order, or `None` for an unknown id.
    pub fn get_interview(&self, id: &str) -> Result<Option<InterviewWithMessages>, StoreError> {
        let mut conn = self.connection()?;
        // One read transaction so metadata and history come from the same snapshot.
        let tx = conn.transaction()?;

        let interview = match Self::load_interview(&tx, id)? {
            Some(interview) => interview,
            None => return Ok(None),
        };

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT id, interview_id, role, content, timestamp
                 FROM messages WHERE interview_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt
                .query_map(params![id], MessageRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        tx.commit()?;

        let messages = rows
            .into_iter()
            .map(MessageRow::validate)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(InterviewWithMessages {
            interview,
            messages,
        }))
    }

    /// All interviews, newest first, without messages.
    pub fn list_interviews(&self) -> Result<Vec<Interview>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, skills, status, created_at, updated_at
             FROM interviews ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], InterviewRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(InterviewRow::validate).collect()
    }

    /// Persist exactly one message. Does not touch the parent interview.
    ///
    /// The stored timestamp never precedes the latest message already stored for
    /// this interview, so history order and timestamp order agree.
    pub fn add_message(
        &self,
        interview_id: &str,
        role: MessageRole,
        content: &str,
        message_id: &str,
    ) -> Result<Message, StoreError> {
        let mut conn = self.connection()?;
        // Take the write lock up front; a deferred read-then-write upgrade fails
        // with SQLITE_BUSY without waiting on `busy_timeout`.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM interviews WHERE id = ?1",
                params![interview_id],
                |row| row.get(0),
            )
            .optional()?;
        if parent.is_none() {
            return Err(StoreError::UnknownInterview(interview_id.to_string()));
        }

        let latest: Option<Option<String>> = tx
            .query_row(
                "SELECT timestamp FROM messages WHERE interview_id = ?1 ORDER BY rowid DESC LIMIT 1",
                params![interview_id],
                |row| row.get(0),
            )
            .optional()?;

        let mut timestamp = now_millis();
        if let Some(raw) = latest {
            let previous = parse_timestamp("message", "timestamp", raw)?;
            if previous > timestamp {
                timestamp = previous;
            }
        }

        let inserted = tx.execute(
            "INSERT INTO messages (id, interview_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message_id,
                interview_id,
                role.as_str(),
                content,
                format_timestamp(&timestamp),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(StoreError::DuplicateMessage(message_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit()?;

        debug!(interview_id, message_id, role = %role, "Message persisted");
        Ok(Message {
            id: message_id.to_string(),
            interview_id: interview_id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    /// Move an interview forward through its lifecycle and bump `updated_at`.
    ///
    /// Requesting the current status is a no-op that returns the interview as is.
    pub fn update_status(&self, id: &str, status: InterviewStatus) -> Result<Interview, StoreError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::load_interview(&tx, id)?
            .ok_or_else(|| StoreError::UnknownInterview(id.to_string()))?;

        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let updated_at = now_millis().max(current.updated_at);
        tx.execute(
            "UPDATE interviews SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), format_timestamp(&updated_at)],
        )?;
        tx.commit()?;

        info!(interview_id = id, from = %current.status, to = %status, "Interview status updated");
        Ok(Interview {
            status,
            updated_at,
            ..current
        })
    }

    /// Bump `updated_at` without changing anything else.
    pub fn touch_interview(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let affected = conn.execute(
            "UPDATE interviews SET updated_at = ?2 WHERE id = ?1",
            params![id, format_timestamp(&now_millis())],
        )?;
        if affected == 0 {
            return Err(StoreError::UnknownInterview(id.to_string()));
        }
        Ok(())
    }

    fn load_interview(conn: &Connection, id: &str) -> Result<Option<Interview>, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, title, skills, status, created_at, updated_at
                 FROM interviews WHERE id = ?1",
                params![id],
                InterviewRow::from_row,
            )
            .optional()?;

        row.map(InterviewRow::validate).transpose()
    }
}

/// Raw `interviews` row before validation.
struct InterviewRow {
    id: String,
    title: Option<String>,
    skills: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl InterviewRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            skills: row.get("skills")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn validate(self) -> Result<Interview, StoreError> {
        let record = format!("interview {}", self.id);

        let title = self
            .title
            .ok_or_else(|| StoreError::integrity(&record, "missing title"))?
            .parse::<InterviewTitle>()
            .map_err(|err| StoreError::integrity(&record, err))?;

        let raw_skills = self
            .skills
            .ok_or_else(|| StoreError::integrity(&record, "missing skills"))?;
        let skills: Vec<String> = serde_json::from_str(&raw_skills)
            .map_err(|err| StoreError::integrity(&record, format!("unparseable skills: {}", err)))?;
        if skills.is_empty() {
            return Err(StoreError::integrity(&record, "empty skill list"));
        }

        let raw_status = self
            .status
            .ok_or_else(|| StoreError::integrity(&record, "missing status"))?;
        let status = InterviewStatus::from_db(&raw_status)
            .ok_or_else(|| StoreError::integrity(&record, format!("unknown status '{}'", raw_status)))?;

        let created_at = parse_timestamp(&record, "created_at", self.created_at)?;
        let updated_at = parse_timestamp(&record, "updated_at", self.updated_at)?;

        Ok(Interview {
            id: self.id,
            title,
            skills,
            status,
            created_at,
            updated_at,
        })
    }
}

/// Raw `messages` row before validation.
struct MessageRow {
    id: String,
    interview_id: Option<String>,
    role: Option<String>,
    content: Option<String>,
    timestamp: Option<String>,
}

impl MessageRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            interview_id: row.get("interview_id")?,
            role: row.get("role")?,
            content: row.get("content")?,
            timestamp: row.get("timestamp")?,
        })
    }

    fn validate(self) -> Result<Message, StoreError> {
        let record = format!("message {}", self.id);

        let interview_id = self
            .interview_id
            .ok_or_else(|| StoreError::integrity(&record, "missing interview_id"))?;
        let raw_role = self
            .role
            .ok_or_else(|| StoreError::integrity(&record, "missing role"))?;
        let role = MessageRole::from_db(&raw_role)
            .ok_or_else(|| StoreError::integrity(&record, format!("unknown role '{}'", raw_role)))?;
        let content = self
            .content
            .ok_or_else(|| StoreError::integrity(&record, "missing content"))?;
        let timestamp = parse_timestamp(&record, "timestamp", self.timestamp)?;

        Ok(Message {
            id: self.id,
            interview_id,
            role,
            content,
            timestamp,
        })
    }
}

/// Millisecond precision, matching what gets written to disk.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(record: &str, column: &str, raw: Option<String>) -> Result<DateTime<Utc>, StoreError> {
    let raw = raw.ok_or_else(|| StoreError::integrity(record, format!("missing {}", column)))?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| StoreError::integrity(record, format!("invalid {} '{}': {}", column, raw, err)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, InterviewStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = InterviewStore::bootstrap(StoreConfig::file(dir.path().join("interviews.sqlite3")))
            .expect("bootstrap should succeed");
        (dir, store)
    }

    fn skills(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let (_dir, store) = temp_store();
        store.ensure_schema().expect("second run");
        store.ensure_schema().expect("third run");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.ensure_schema())
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread").expect("concurrent ensure_schema");
        }

        let conn = store.connection().unwrap();
        let objects: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master
                 WHERE name IN ('interviews', 'messages', 'idx_messages_interview_id')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(objects, 3);
    }

    #[test]
    fn test_create_then_get_returns_fresh_interview() {
        let (_dir, store) = temp_store();
        let created = store
            .create_interview(InterviewTitle::SystemArchitect, &skills(&["SQL", "Communication"]))
            .unwrap();

        let fetched = store.get_interview(&created.id).unwrap().expect("interview exists");
        assert_eq!(fetched.interview, created);
        assert_eq!(fetched.interview.status, InterviewStatus::Created);
        assert_eq!(fetched.interview.skills, skills(&["SQL", "Communication"]));
        assert!(fetched.messages.is_empty());
    }

    #[test]
    fn test_create_rejects_empty_skills() {
        let (_dir, store) = temp_store();
        let err = store
            .create_interview(InterviewTitle::BackendDeveloper, &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.list_interviews().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_interview_is_absent() {
        let (_dir, store) = temp_store();
        assert!(store.get_interview("unknown-id").unwrap().is_none());
    }

    #[test]
    fn test_messages_come_back_in_insertion_order() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::BackendDeveloper, &skills(&["Rust"]))
            .unwrap();

        let roles = [
            MessageRole::System,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
        ];
        let mut expected = Vec::new();
        for (index, role) in roles.iter().enumerate() {
            let id = format!("m{}", index);
            store
                .add_message(&interview.id, *role, &format!("content {}", index), &id)
                .unwrap();
            expected.push(id);
        }

        let fetched = store.get_interview(&interview.id).unwrap().unwrap();
        let ids: Vec<_> = fetched.messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(fetched
            .messages
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_add_message_to_unknown_interview_fails_without_orphan() {
        let (_dir, store) = temp_store();
        let err = store
            .add_message("missing", MessageRole::User, "hello", "m1")
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownInterview(_)));

        let conn = store.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_duplicate_message_id_is_rejected() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::QAEngineer, &skills(&["Testing"]))
            .unwrap();
        store
            .add_message(&interview.id, MessageRole::User, "first", "same-id")
            .unwrap();
        let err = store
            .add_message(&interview.id, MessageRole::User, "second", "same-id")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMessage(_)));

        let fetched = store.get_interview(&interview.id).unwrap().unwrap();
        assert_eq!(fetched.messages.len(), 1);
        assert_eq!(fetched.messages[0].content, "first");
    }

    #[test]
    fn test_add_message_leaves_parent_untouched() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::DataScientist, &skills(&["Python"]))
            .unwrap();
        store
            .add_message(&interview.id, MessageRole::User, "hi", "m1")
            .unwrap();

        let fetched = store.get_interview(&interview.id).unwrap().unwrap();
        assert_eq!(fetched.interview.status, InterviewStatus::Created);
        assert_eq!(fetched.interview.updated_at, interview.updated_at);
    }

    #[test]
    fn test_list_is_newest_first() {
        let (_dir, store) = temp_store();
        let first = store
            .create_interview(InterviewTitle::FrontendDeveloper, &skills(&["CSS"]))
            .unwrap();
        let second = store
            .create_interview(InterviewTitle::MobileDeveloper, &skills(&["Kotlin"]))
            .unwrap();

        let listed: Vec<_> = store
            .list_interviews()
            .unwrap()
            .into_iter()
            .map(|interview| interview.id)
            .collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[test]
    fn test_status_updates_are_forward_only() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::TechnicalLead, &skills(&["Leadership"]))
            .unwrap();

        let started = store
            .update_status(&interview.id, InterviewStatus::InProgress)
            .unwrap();
        assert_eq!(started.status, InterviewStatus::InProgress);
        assert!(started.updated_at >= interview.updated_at);

        let same = store
            .update_status(&interview.id, InterviewStatus::InProgress)
            .unwrap();
        assert_eq!(same, started);

        let err = store
            .update_status(&interview.id, InterviewStatus::Created)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store
            .update_status(&interview.id, InterviewStatus::Completed)
            .unwrap();
        let err = store
            .update_status(&interview.id, InterviewStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let err = store
            .update_status("missing", InterviewStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownInterview(_)));
    }

    #[test]
    fn test_corrupt_skills_are_a_data_integrity_error() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::SecurityEngineer, &skills(&["Threat modeling"]))
            .unwrap();
        store
            .connection()
            .unwrap()
            .execute(
                "UPDATE interviews SET skills = 'not json' WHERE id = ?1",
                params![interview.id],
            )
            .unwrap();

        let err = store.get_interview(&interview.id).unwrap_err();
        assert!(matches!(err, StoreError::DataIntegrity { .. }));
        assert!(matches!(
            store.list_interviews().unwrap_err(),
            StoreError::DataIntegrity { .. }
        ));
    }

    #[test]
    fn test_missing_timestamp_is_a_data_integrity_error() {
        let (_dir, store) = temp_store();
        let interview = store
            .create_interview(InterviewTitle::DevOpsEngineer, &skills(&["Kubernetes"]))
            .unwrap();
        store
            .add_message(&interview.id, MessageRole::User, "hello", "m1")
            .unwrap();
        store
            .connection()
            .unwrap()
            .execute("UPDATE messages SET timestamp = '' WHERE id = 'm1'", [])
            .unwrap();

        let err = store.get_interview(&interview.id).unwrap_err();
        match err {
            StoreError::DataIntegrity { record, .. } => assert_eq!(record, "message m1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_writers_on_separate_interviews_all_succeed() {
        let dir = TempDir::new().expect("temp dir");
        let store = InterviewStore::bootstrap(StoreConfig {
            path: DatabasePath::File(dir.path().join("interviews.sqlite3")),
            pool_size: 8,
            busy_timeout: Duration::from_secs(10),
        })
        .expect("bootstrap should succeed");

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let interview = store
                        .create_interview(InterviewTitle::BackendDeveloper, &skills(&["Rust"]))
                        .unwrap();
                    for n in 0..100 {
                        store
                            .add_message(
                                &interview.id,
                                MessageRole::User,
                                &format!("answer {worker}-{n}"),
                                &Uuid::new_v4().to_string(),
                            )
                            .unwrap();
                        if n == 50 {
                            store
                                .update_status(&interview.id, InterviewStatus::InProgress)
                                .unwrap();
                        }
                    }
                    interview.id
                })
            })
            .collect();

        for worker in workers {
            let id = worker.join().expect("writer thread panicked");
            let stored = store.get_interview(&id).unwrap().unwrap();
            assert_eq!(stored.messages.len(), 100);
            assert_eq!(stored.interview.status, InterviewStatus::InProgress);
        }
    }

    #[test]
    fn test_memory_store_shares_one_database() {
        let store = InterviewStore::bootstrap(StoreConfig::memory()).unwrap();
        let interview = store
            .create_interview(InterviewTitle::ProductManager, &skills(&["Roadmaps"]))
            .unwrap();
        assert!(store.get_interview(&interview.id).unwrap().is_some());
        assert!(store.database_path().is_none());
    }

    #[tokio::test]
    async fn test_blocking_runs_on_the_blocking_pool() {
        let (_dir, store) = temp_store();
        let interview = store
            .blocking(|store| {
                store.create_interview(InterviewTitle::JuniorDeveloper, &["Git".to_string()])
            })
            .await
            .unwrap();
        let listed = store.blocking(|store| store.list_interviews()).await.unwrap();
        assert_eq!(listed[0].id, interview.id);
    }
}

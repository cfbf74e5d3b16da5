//! SQLite backend for threads, messages, passages, budgets, and identity.
//!
//! Uses a single SQLite database file. Messages cascade-delete with
//! their thread via foreign keys. The token ledger relies on an
//! `ON CONFLICT ... DO UPDATE` upsert so concurrent increments for the
//! same (user, course, day) key never lose updates.

use crate::vector;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coursepilot_core::chat::{AnswerMode, ChatMessage, ChatThread, Sender};
use coursepilot_core::error::StoreError;
use coursepilot_core::identity::{Enrollment, SessionIdentity};
use coursepilot_core::passage::Passage;
use coursepilot_core::store::{BudgetStore, IdentityStore, NewMessage, PassageStore, ThreadStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Characters kept for the thread list's last-message preview.
const PREVIEW_CHARS: usize = 100;

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so pooling more
        // than one connection would scatter the tables
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations — creates all tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_threads (
                id         TEXT PRIMARY KEY,
                course_id  TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                title      TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_threads table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id          TEXT PRIMARY KEY,
                thread_id   TEXT NOT NULL REFERENCES chat_threads(id) ON DELETE CASCADE,
                sender      TEXT NOT NULL,
                text        TEXT NOT NULL,
                answer_mode TEXT,
                passage_ids TEXT,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id              TEXT PRIMARY KEY,
                content_file_id TEXT NOT NULL,
                course_id       TEXT NOT NULL,
                text            TEXT NOT NULL,
                position        INTEGER NOT NULL DEFAULT 0,
                source_title    TEXT NOT NULL,
                page_number     INTEGER,
                section_heading TEXT,
                embedding       BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("passages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_usage (
                id          TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                course_id   TEXT NOT NULL,
                day         TEXT NOT NULL,
                tokens_used INTEGER NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(user_id, course_id, day)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("token_usage table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id    TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                name  TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                session_token TEXT UNIQUE NOT NULL,
                expires       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                course_id  TEXT NOT NULL,
                role       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, course_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("enrollments table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_thread ON chat_messages(thread_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_threads_user_course ON chat_threads(user_id, course_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("threads index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_passages_course ON passages(course_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("passages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Expose the pool (useful for test seeding).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Parse a `ChatThread` from a row that includes the derived
    /// `message_count` and `last_message` columns.
    fn row_to_thread(row: &sqlx::sqlite::SqliteRow) -> Result<ChatThread, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let course_id: String = row
            .try_get("course_id")
            .map_err(|e| StoreError::QueryFailed(format!("course_id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
        let title: Option<String> = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let message_count: i64 = row.try_get("message_count").unwrap_or(0);
        let last_message: Option<String> = row.try_get("last_message").ok().flatten();

        Ok(ChatThread {
            id,
            course_id,
            user_id,
            title,
            created_at: Self::parse_timestamp(&created_at_str),
            message_count: message_count.max(0) as u64,
            last_message_preview: last_message
                .map(|text| text.chars().take(PREVIEW_CHARS).collect()),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let thread_id: String = row
            .try_get("thread_id")
            .map_err(|e| StoreError::QueryFailed(format!("thread_id column: {e}")))?;
        let sender_str: String = row
            .try_get("sender")
            .map_err(|e| StoreError::QueryFailed(format!("sender column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let answer_mode_str: Option<String> = row
            .try_get("answer_mode")
            .map_err(|e| StoreError::QueryFailed(format!("answer_mode column: {e}")))?;
        let passage_ids_json: Option<String> = row
            .try_get("passage_ids")
            .map_err(|e| StoreError::QueryFailed(format!("passage_ids column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let sender = Sender::parse(&sender_str)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown sender: {sender_str}")))?;
        let answer_mode = answer_mode_str.as_deref().and_then(AnswerMode::parse);
        let passage_ids: Vec<String> = passage_ids_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Ok(ChatMessage {
            id,
            thread_id,
            sender,
            text,
            answer_mode,
            passage_ids,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }

    fn row_to_passage(row: &sqlx::sqlite::SqliteRow) -> Result<Passage, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let content_file_id: String = row
            .try_get("content_file_id")
            .map_err(|e| StoreError::QueryFailed(format!("content_file_id column: {e}")))?;
        let course_id: String = row
            .try_get("course_id")
            .map_err(|e| StoreError::QueryFailed(format!("course_id column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let position: i64 = row
            .try_get("position")
            .map_err(|e| StoreError::QueryFailed(format!("position column: {e}")))?;
        let source_title: String = row
            .try_get("source_title")
            .map_err(|e| StoreError::QueryFailed(format!("source_title column: {e}")))?;
        let page_number: Option<i64> = row
            .try_get("page_number")
            .map_err(|e| StoreError::QueryFailed(format!("page_number column: {e}")))?;
        let section_heading: Option<String> = row
            .try_get("section_heading")
            .map_err(|e| StoreError::QueryFailed(format!("section_heading column: {e}")))?;

        let embedding: Option<Vec<u8>> = row.try_get("embedding").ok();
        let embedding_vec = embedding.map(|blob| {
            blob.chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect()
        });

        Ok(Passage {
            id,
            content_file_id,
            course_id,
            text,
            position: position.max(0) as u32,
            source_title,
            page_number: page_number.map(|n| n.max(0) as u32),
            section_heading,
            similarity: 0.0,
            embedding: embedding_vec,
        })
    }

    /// Serialize an embedding vector to bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[async_trait]
impl ThreadStore for SqliteStore {
    async fn create_thread(
        &self,
        course_id: &str,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<ChatThread, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO chat_threads (id, course_id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(course_id)
        .bind(user_id)
        .bind(title)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT thread failed: {e}")))?;

        debug!(thread_id = %id, course_id, "Created thread");

        Ok(ChatThread {
            id,
            course_id: course_id.into(),
            user_id: user_id.into(),
            title: title.map(String::from),
            created_at,
            message_count: 0,
            last_message_preview: None,
        })
    }

    async fn get_thread(
        &self,
        thread_id: &str,
        user_id: &str,
    ) -> Result<Option<ChatThread>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.course_id, t.user_id, t.title, t.created_at,
                   (SELECT COUNT(*) FROM chat_messages WHERE thread_id = t.id) AS message_count,
                   (SELECT text FROM chat_messages WHERE thread_id = t.id
                    ORDER BY created_at DESC, rowid DESC LIMIT 1) AS last_message
            FROM chat_threads t
            WHERE t.id = ?1 AND t.user_id = ?2
            "#,
        )
        .bind(thread_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("GET thread: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_thread(r)?)),
            None => Ok(None),
        }
    }

    async fn list_threads(
        &self,
        user_id: &str,
        course_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatThread>, u64), StoreError> {
        let total_row = sqlx::query(
            "SELECT COUNT(*) AS total FROM chat_threads WHERE user_id = ?1 AND course_id = ?2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("COUNT threads: {e}")))?;

        let total: i64 = total_row
            .try_get("total")
            .map_err(|e| StoreError::QueryFailed(format!("total column: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.course_id, t.user_id, t.title, t.created_at,
                   (SELECT COUNT(*) FROM chat_messages WHERE thread_id = t.id) AS message_count,
                   (SELECT text FROM chat_messages WHERE thread_id = t.id
                    ORDER BY created_at DESC, rowid DESC LIMIT 1) AS last_message
            FROM chat_threads t
            WHERE t.user_id = ?1 AND t.course_id = ?2
            ORDER BY t.created_at DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST threads: {e}")))?;

        let threads = rows
            .iter()
            .map(Self::row_to_thread)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((threads, total.max(0) as u64))
    }

    async fn delete_thread(&self, thread_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_threads WHERE id = ?1 AND user_id = ?2")
            .bind(thread_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE thread failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let passage_ids_json = if message.passage_ids.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.passage_ids).map_err(|e| {
                StoreError::Storage(format!("passage_ids serialization: {e}"))
            })?)
        };

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, thread_id, sender, text, answer_mode, passage_ids, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(&message.thread_id)
        .bind(message.sender.as_str())
        .bind(&message.text)
        .bind(message.answer_mode.map(|m| m.as_str()))
        .bind(&passage_ids_json)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        Ok(ChatMessage {
            id,
            thread_id: message.thread_id,
            sender: message.sender,
            text: message.text,
            answer_mode: message.answer_mode,
            passage_ids: message.passage_ids,
            created_at,
        })
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, thread_id, sender, text, answer_mode, passage_ids, created_at
            FROM chat_messages
            WHERE thread_id = ?1
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(thread_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn set_title(&self, thread_id: &str, title: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE chat_threads SET title = ?1 WHERE id = ?2")
            .bind(title)
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE title failed: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl PassageStore for SqliteStore {
    async fn search_by_embedding(
        &self,
        course_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Passage>, StoreError> {
        // No native vector index in SQLite: load the course's embedded
        // passages and rank in process.
        let rows = sqlx::query(
            "SELECT * FROM passages WHERE course_id = ?1 AND embedding IS NOT NULL",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("passage scan: {e}")))?;

        let passages = rows
            .iter()
            .map(Self::row_to_passage)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vector::rank_passages(&passages, query_embedding, k))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Passage>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT * FROM passages WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("passage batch get: {e}")))?;

        rows.iter().map(Self::row_to_passage).collect()
    }

    async fn has_content(&self, course_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM passages WHERE course_id = ?1 AND embedding IS NOT NULL",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("content check: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt > 0)
    }

    async fn insert_passage(&self, mut passage: Passage) -> Result<String, StoreError> {
        if passage.id.is_empty() {
            passage.id = Uuid::new_v4().to_string();
        }
        let id = passage.id.clone();
        let embedding_blob: Option<Vec<u8>> =
            passage.embedding.as_deref().map(Self::embedding_to_blob);

        sqlx::query(
            r#"
            INSERT INTO passages
                (id, content_file_id, course_id, text, position, source_title, page_number, section_heading, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                content_file_id = excluded.content_file_id,
                course_id = excluded.course_id,
                text = excluded.text,
                position = excluded.position,
                source_title = excluded.source_title,
                page_number = excluded.page_number,
                section_heading = excluded.section_heading,
                embedding = excluded.embedding
            "#,
        )
        .bind(&passage.id)
        .bind(&passage.content_file_id)
        .bind(&passage.course_id)
        .bind(&passage.text)
        .bind(passage.position as i64)
        .bind(&passage.source_title)
        .bind(passage.page_number.map(|n| n as i64))
        .bind(&passage.section_heading)
        .bind(embedding_blob.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT passage failed: {e}")))?;

        Ok(id)
    }
}

#[async_trait]
impl BudgetStore for SqliteStore {
    async fn usage_on(
        &self,
        user_id: &str,
        course_id: &str,
        day: NaiveDate,
    ) -> Result<u32, StoreError> {
        let row = sqlx::query(
            "SELECT tokens_used FROM token_usage WHERE user_id = ?1 AND course_id = ?2 AND day = ?3",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("usage lookup: {e}")))?;

        match row {
            Some(r) => {
                let tokens: i64 = r
                    .try_get("tokens_used")
                    .map_err(|e| StoreError::QueryFailed(format!("tokens_used column: {e}")))?;
                Ok(tokens.max(0) as u32)
            }
            None => Ok(0),
        }
    }

    async fn add_usage(
        &self,
        user_id: &str,
        course_id: &str,
        day: NaiveDate,
        tokens: u32,
    ) -> Result<u32, StoreError> {
        // Atomic insert-or-increment: two concurrent turns for the same
        // key must both be reflected in the final total.
        let row = sqlx::query(
            r#"
            INSERT INTO token_usage (id, user_id, course_id, day, tokens_used, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, course_id, day) DO UPDATE SET
                tokens_used = token_usage.tokens_used + excluded.tokens_used,
                updated_at = excluded.updated_at
            RETURNING tokens_used
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(course_id)
        .bind(day.to_string())
        .bind(tokens as i64)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("usage upsert failed: {e}")))?;

        let total: i64 = row
            .try_get("tokens_used")
            .map_err(|e| StoreError::QueryFailed(format!("tokens_used column: {e}")))?;

        Ok(total.max(0) as u32)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn validate_session(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionIdentity>, StoreError> {
        if session_token.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            SELECT s.user_id, s.expires, u.email, u.name
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.session_token = ?1
            "#,
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("session lookup: {e}")))?;

        let Some(r) = row else {
            return Ok(None);
        };

        let expires_str: String = r
            .try_get("expires")
            .map_err(|e| StoreError::QueryFailed(format!("expires column: {e}")))?;
        if Self::parse_timestamp(&expires_str) < Utc::now() {
            return Ok(None);
        }

        let user_id: String = r
            .try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
        let email: String = r
            .try_get("email")
            .map_err(|e| StoreError::QueryFailed(format!("email column: {e}")))?;
        let display_name: Option<String> = r
            .try_get("name")
            .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?;

        Ok(Some(SessionIdentity {
            user_id,
            email,
            display_name,
        }))
    }

    async fn get_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(
            "SELECT id, role, created_at FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("enrollment lookup: {e}")))?;

        let Some(r) = row else {
            return Ok(None);
        };

        let id: String = r
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let role: String = r
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let created_at_str: String = r
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(Some(Enrollment {
            id,
            role,
            created_at: Self::parse_timestamp(&created_at_str),
        }))
    }
}

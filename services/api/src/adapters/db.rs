//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use unimate_core::domain::{
    ChatMessage, Conversation, ConversationContext, ConversationPage, Preferences, Role, User,
    UserCredentials,
};
use unimate_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_messages(&self, conversation_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT role, content, sources, created_at FROM messages \
             WHERE conversation_id = $1 ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn hydrate_conversation(&self, record: ConversationRecord) -> PortResult<Conversation> {
        let messages = self.load_messages(record.id).await?;
        Ok(record.to_domain(messages))
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    role: String,
    language: String,
    university: String,
    course: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            role: parse_role(&self.role)?,
            preferences: Preferences {
                language: self.language,
                university: self.university,
                course: self.course,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            role: parse_role(&self.role)?,
        })
    }
}

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    user_id: Uuid,
    session_id: String,
    context: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self, messages: Vec<ChatMessage>) -> Conversation {
        Conversation {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            messages,
            context: context_from_json(&self.context),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    role: String,
    content: String,
    sources: Vec<String>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        Ok(ChatMessage {
            role: self
                .role
                .parse()
                .map_err(|e: String| PortError::Unexpected(e))?,
            content: self.content,
            timestamp: self.created_at,
            sources: self.sources,
        })
    }
}

fn parse_role(raw: &str) -> PortResult<Role> {
    raw.parse().map_err(|e: String| PortError::Unexpected(e))
}

fn context_from_json(value: &serde_json::Value) -> ConversationContext {
    ConversationContext {
        university: value
            .get("university")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        stage: value
            .get("stage")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        preferences: value
            .get("preferences")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default(),
    }
}

fn context_to_json(context: &ConversationContext) -> serde_json::Value {
    json!({
        "university": context.university,
        "stage": context.stage,
        "preferences": context.preferences,
    })
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, email: &str, password_hash: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, email, role, language, university, course, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                PortError::Conflict(format!("User with email {} already exists", email))
            }
            _ => unexpected(e),
        })?;

        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User with email {} not found", email))
            }
            _ => unexpected(e),
        })?;

        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, role, language, university, course, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        record.to_domain()
    }

    async fn find_conversation(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> PortResult<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, session_id, context, created_at, updated_at \
             FROM conversations WHERE user_id = $1 AND session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => Ok(Some(self.hydrate_conversation(record).await?)),
            None => Ok(None),
        }
    }

    async fn find_latest_conversation(&self, user_id: Uuid) -> PortResult<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, session_id, context, created_at, updated_at \
             FROM conversations WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => Ok(Some(self.hydrate_conversation(record).await?)),
            None => Ok(None),
        }
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        session_id: &str,
        context: &ConversationContext,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (id, user_id, session_id, context) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, session_id, context, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(session_id)
        .bind(context_to_json(context))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain(Vec::new()))
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &ChatMessage,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, sources, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.sources)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let updated = sqlx::query("UPDATE conversations SET updated_at = now() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn update_context(
        &self,
        conversation_id: Uuid,
        context: &ConversationContext,
    ) -> PortResult<()> {
        let updated = sqlx::query("UPDATE conversations SET context = $1 WHERE id = $2")
            .bind(context_to_json(context))
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> PortResult<ConversationPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 50);
        let offset = (page as i64 - 1) * limit as i64;

        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, session_id, context, created_at, updated_at \
             FROM conversations WHERE user_id = $1 \
             ORDER BY updated_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;

        let mut conversations = Vec::with_capacity(records.len());
        for record in records {
            conversations.push(self.hydrate_conversation(record).await?);
        }

        Ok(ConversationPage {
            conversations,
            page,
            limit,
            total: total as u64,
        })
    }

    async fn delete_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> PortResult<()> {
        // One query for both the missing-id and wrong-owner cases, so neither
        // can be told apart from the outcome.
        let deleted = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

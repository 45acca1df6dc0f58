//! # MessageRepository
//!
//! メッセージ（件名と本文）の永続化を担当する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::{
    message::{Message, MessageId},
    user::UserId,
    value_objects::MessageSubject,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// メッセージリポジトリトレイト
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// メッセージを挿入する
    async fn insert(&self, message: &Message) -> Result<(), InfraError>;

    /// ID でメッセージを取得する
    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id:         Uuid,
    owner_id:   Uuid,
    subject:    String,
    body:       String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = InfraError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message::from_db(
            MessageId::from_uuid(row.id),
            UserId::from_uuid(row.owner_id),
            MessageSubject::new(row.subject)?,
            row.body,
            row.created_at,
        ))
    }
}

/// PostgreSQL 実装の MessageRepository
#[derive(Debug, Clone)]
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(message_id = %message.id()))]
    async fn insert(&self, message: &Message) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, owner_id, subject, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id().as_uuid())
        .bind(message.owner_id().as_uuid())
        .bind(message.subject().as_str())
        .bind(message.body())
        .bind(message.created_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, InfraError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, owner_id, subject, body, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }
}

//! # RecipientRepository
//!
//! 受信者の永続化を担当する。メールアドレスは所有者ごとに一意であり、
//! 重複は `(owner_id, email)` の一意制約で検出して Conflict に変換する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::{
    recipient::{Recipient, RecipientId, RecipientRecord},
    user::{Email, UserId},
    value_objects::RecipientName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{InfraError, is_unique_violation};

/// 受信者リポジトリトレイト
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// 受信者を挿入する
    ///
    /// 同じ所有者に同じメールアドレスの受信者が存在する場合は Conflict を返す。
    async fn insert(&self, recipient: &Recipient) -> Result<(), InfraError>;

    /// ID で受信者を取得する
    async fn find_by_id(&self, id: &RecipientId) -> Result<Option<Recipient>, InfraError>;

    /// 所有者の受信者一覧を取得する（メールアドレス順）
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<Recipient>, InfraError>;

    /// 受信者を削除する
    ///
    /// 配信試行の `recipient_id` は NULL になり、スナップショットのみが残る。
    async fn delete(&self, id: &RecipientId) -> Result<(), InfraError>;
}

/// DB の recipients テーブルの行
#[derive(sqlx::FromRow)]
pub(crate) struct RecipientRow {
    pub(crate) id:         Uuid,
    pub(crate) owner_id:   Uuid,
    pub(crate) email:      String,
    pub(crate) full_name:  Option<String>,
    pub(crate) comment:    Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl TryFrom<RecipientRow> for Recipient {
    type Error = InfraError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        Ok(Recipient::from_db(RecipientRecord {
            id:         RecipientId::from_uuid(row.id),
            owner_id:   UserId::from_uuid(row.owner_id),
            email:      Email::new(row.email)?,
            full_name:  row.full_name.map(RecipientName::new).transpose()?,
            comment:    row.comment,
            created_at: row.created_at,
        }))
    }
}

/// PostgreSQL 実装の RecipientRepository
#[derive(Debug, Clone)]
pub struct PostgresRecipientRepository {
    pool: PgPool,
}

impl PostgresRecipientRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientRepository for PostgresRecipientRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(recipient_id = %recipient.id()))]
    async fn insert(&self, recipient: &Recipient) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO recipients (id, owner_id, email, full_name, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(recipient.id().as_uuid())
        .bind(recipient.owner_id().as_uuid())
        .bind(recipient.email().as_str())
        .bind(recipient.full_name().map(RecipientName::as_str))
        .bind(recipient.comment())
        .bind(recipient.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                InfraError::conflict("Recipient", recipient.email().as_str())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &RecipientId) -> Result<Option<Recipient>, InfraError> {
        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT id, owner_id, email, full_name, comment, created_at
            FROM recipients
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Recipient::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<Recipient>, InfraError> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT id, owner_id, email, full_name, comment, created_at
            FROM recipients
            WHERE owner_id = $1
            ORDER BY email
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Recipient::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn delete(&self, id: &RecipientId) -> Result<(), InfraError> {
        sqlx::query("DELETE FROM recipients WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn RecipientRepository>>();
    }
}

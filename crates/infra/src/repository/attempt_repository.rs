//! # AttemptRepository
//!
//! 配信試行の永続化を担当する。
//!
//! 配信試行は作成後に変更されない監査記録であり、このリポジトリは
//! 挿入と参照のみを提供する。`(mailing_id, recipient_id)` の一意制約により、
//! 送信ループと停止処理の補完が競合しても受信者ごとの試行は一件に保たれる。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::{
    attempt::{Attempt, AttemptId, AttemptRecord, AttemptStatus},
    mailing::MailingId,
    recipient::RecipientId,
    user::{Email, UserId},
    value_objects::RecipientName,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// 配信試行リポジトリトレイト
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// 配信試行を記録する
    ///
    /// 同じ受信者の試行が既に存在する場合は何もせず `false` を返す。
    async fn record(&self, attempt: &Attempt) -> Result<bool, InfraError>;

    /// トランザクション内で配信試行を記録する
    async fn record_in_tx(&self, tx: &mut TxContext, attempt: &Attempt)
    -> Result<bool, InfraError>;

    /// トランザクション内で、試行済みの受信者 ID を取得する
    async fn find_attempted_recipient_ids_in_tx(
        &self,
        tx: &mut TxContext,
        mailing_id: &MailingId,
    ) -> Result<HashSet<RecipientId>, InfraError>;

    /// メール配信の試行履歴を試行日時順で取得する
    async fn find_by_mailing(&self, mailing_id: &MailingId) -> Result<Vec<Attempt>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id:                  Uuid,
    mailing_id:          Uuid,
    recipient_id:        Option<Uuid>,
    recipient_email:     String,
    recipient_full_name: Option<String>,
    status:              String,
    server_response:     String,
    owner_id:            Uuid,
    attempted_at:        DateTime<Utc>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = InfraError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AttemptStatus>()
            .map_err(|e| InfraError::unexpected(format!("不正なステータス {}: {e}", row.status)))?;

        Ok(Attempt::from_db(AttemptRecord {
            id: AttemptId::from_uuid(row.id),
            mailing_id: MailingId::from_uuid(row.mailing_id),
            recipient_id: row.recipient_id.map(RecipientId::from_uuid),
            recipient_email: Email::new(row.recipient_email)?,
            recipient_full_name: row
                .recipient_full_name
                .map(RecipientName::new)
                .transpose()?,
            status,
            server_response: row.server_response,
            owner_id: UserId::from_uuid(row.owner_id),
            attempted_at: row.attempted_at,
        }))
    }
}

/// 試行を挿入し、挿入されたかどうかを返す
async fn insert_attempt(conn: &mut PgConnection, attempt: &Attempt) -> Result<bool, InfraError> {
    let status: &str = attempt.status().into();
    let result = sqlx::query(
        r#"
        INSERT INTO attempts (
            id, mailing_id, recipient_id, recipient_email, recipient_full_name,
            status, server_response, owner_id, attempted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT ON CONSTRAINT attempts_mailing_recipient_key DO NOTHING
        "#,
    )
    .bind(attempt.id().as_uuid())
    .bind(attempt.mailing_id().as_uuid())
    .bind(attempt.recipient_id().map(|id| *id.as_uuid()))
    .bind(attempt.recipient_email().as_str())
    .bind(attempt.recipient_full_name().map(RecipientName::as_str))
    .bind(status)
    .bind(attempt.server_response())
    .bind(attempt.owner_id().as_uuid())
    .bind(attempt.attempted_at())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// PostgreSQL 実装の AttemptRepository
#[derive(Debug, Clone)]
pub struct PostgresAttemptRepository {
    pool: PgPool,
}

impl PostgresAttemptRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for PostgresAttemptRepository {
    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(mailing_id = %attempt.mailing_id(), status = %attempt.status())
    )]
    async fn record(&self, attempt: &Attempt) -> Result<bool, InfraError> {
        let mut conn = self.pool.acquire().await?;
        insert_attempt(&mut conn, attempt).await
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(mailing_id = %attempt.mailing_id(), status = %attempt.status())
    )]
    async fn record_in_tx(
        &self,
        tx: &mut TxContext,
        attempt: &Attempt,
    ) -> Result<bool, InfraError> {
        insert_attempt(tx.conn()?, attempt).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%mailing_id))]
    async fn find_attempted_recipient_ids_in_tx(
        &self,
        tx: &mut TxContext,
        mailing_id: &MailingId,
    ) -> Result<HashSet<RecipientId>, InfraError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT recipient_id
            FROM attempts
            WHERE mailing_id = $1 AND recipient_id IS NOT NULL
            "#,
        )
        .bind(mailing_id.as_uuid())
        .fetch_all(tx.conn()?)
        .await?;

        Ok(ids.into_iter().map(RecipientId::from_uuid).collect())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%mailing_id))]
    async fn find_by_mailing(&self, mailing_id: &MailingId) -> Result<Vec<Attempt>, InfraError> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT
                id, mailing_id, recipient_id, recipient_email, recipient_full_name,
                status, server_response, owner_id, attempted_at
            FROM attempts
            WHERE mailing_id = $1
            ORDER BY attempted_at, id
            "#,
        )
        .bind(mailing_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn AttemptRepository>>();
    }
}

//! # MailingRepository
//!
//! メール配信の永続化と状態遷移を担当する。
//!
//! ## 状態遷移の原子性
//!
//! 配信権の獲得（created → launched）と完了（launched → accomplished）は
//! 期待する現在ステータスを WHERE 句に含めた条件付き UPDATE で行う。
//! 影響行数が 0 の場合は他のプロセスが先に遷移させたことを意味し、
//! `Ok(false)` を返す。これにより同時に複数の配信要求や停止要求が来ても
//! 遷移はちょうど一度だけ成功する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::{
    mailing::{Mailing, MailingId, MailingRecord, MailingStatus},
    message::MessageId,
    recipient::{Recipient, RecipientId},
    user::UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::recipient_repository::RecipientRow;
use crate::{db::TxContext, error::InfraError};

/// メール配信リポジトリトレイト
#[async_trait]
pub trait MailingRepository: Send + Sync {
    /// メール配信を受信者リストとともに挿入する
    async fn insert(&self, mailing: &Mailing) -> Result<(), InfraError>;

    /// ID でメール配信を取得する
    async fn find_by_id(&self, id: &MailingId) -> Result<Option<Mailing>, InfraError>;

    /// 現在のステータスのみを取得する
    ///
    /// 送信ループが各送信の直前に「まだ配信中か」を確認するために使う。
    async fn find_status(&self, id: &MailingId) -> Result<Option<MailingStatus>, InfraError>;

    /// メール配信の受信者を登録順で取得する
    ///
    /// 削除済みの受信者は含まれない。
    async fn find_recipients(&self, id: &MailingId) -> Result<Vec<Recipient>, InfraError>;

    /// 配信予定日時を過ぎた未配信のメール配信を取得する
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Mailing>, InfraError>;

    /// 所有者の配信中のメール配信を取得する
    async fn find_launched_by_owner(&self, owner_id: &UserId)
    -> Result<Vec<Mailing>, InfraError>;

    /// 配信権を獲得する（created → launched）
    ///
    /// 遷移に成功した場合のみ `true` を返す。
    async fn try_claim(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError>;

    /// メール配信を完了させる（launched → accomplished）
    ///
    /// 遷移に成功した場合のみ `true` を返す。
    async fn try_complete(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError>;

    /// トランザクション内でメール配信を完了させる（launched → accomplished）
    ///
    /// 停止処理が完了と試行の補完を同じトランザクションで行うために使う。
    async fn try_complete_in_tx(
        &self,
        tx: &mut TxContext,
        id: &MailingId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError>;

    /// 配信予定日時を設定する
    ///
    /// created 状態の場合のみ更新し、更新できた場合に `true` を返す。
    async fn try_schedule(&self, id: &MailingId, at: DateTime<Utc>) -> Result<bool, InfraError>;
}

/// DB の mailings テーブルの行（受信者 ID は配列として集約する）
#[derive(sqlx::FromRow)]
struct MailingRow {
    id:            Uuid,
    owner_id:      Uuid,
    message_id:    Uuid,
    recipient_ids: Vec<Uuid>,
    status:        String,
    scheduled_at:  Option<DateTime<Utc>>,
    first_sent_at: Option<DateTime<Utc>>,
    completed_at:  Option<DateTime<Utc>>,
    created_at:    DateTime<Utc>,
}

impl TryFrom<MailingRow> for Mailing {
    type Error = InfraError;

    fn try_from(row: MailingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<MailingStatus>()
            .map_err(|e| InfraError::unexpected(format!("不正なステータス {}: {e}", row.status)))?;

        Ok(Mailing::from_db(MailingRecord {
            id: MailingId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            message_id: MessageId::from_uuid(row.message_id),
            recipient_ids: row
                .recipient_ids
                .into_iter()
                .map(RecipientId::from_uuid)
                .collect(),
            status,
            scheduled_at: row.scheduled_at,
            first_sent_at: row.first_sent_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })?)
    }
}

const SELECT_MAILING: &str = r#"
    SELECT
        m.id,
        m.owner_id,
        m.message_id,
        ARRAY(
            SELECT mr.recipient_id
            FROM mailing_recipients mr
            WHERE mr.mailing_id = m.id
            ORDER BY mr.position
        ) AS recipient_ids,
        m.status,
        m.scheduled_at,
        m.first_sent_at,
        m.completed_at,
        m.created_at
    FROM mailings m
"#;

/// PostgreSQL 実装の MailingRepository
#[derive(Debug, Clone)]
pub struct PostgresMailingRepository {
    pool: PgPool,
}

impl PostgresMailingRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailingRepository for PostgresMailingRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(mailing_id = %mailing.id()))]
    async fn insert(&self, mailing: &Mailing) -> Result<(), InfraError> {
        let status: &str = mailing.status().into();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO mailings (
                id, owner_id, message_id, status,
                scheduled_at, first_sent_at, completed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(mailing.id().as_uuid())
        .bind(mailing.owner_id().as_uuid())
        .bind(mailing.message_id().as_uuid())
        .bind(status)
        .bind(mailing.scheduled_at())
        .bind(mailing.first_sent_at())
        .bind(mailing.completed_at())
        .bind(mailing.created_at())
        .execute(&mut *tx)
        .await?;

        let recipient_ids: Vec<Uuid> = mailing
            .recipient_ids()
            .iter()
            .map(|id| *id.as_uuid())
            .collect();
        sqlx::query(
            r#"
            INSERT INTO mailing_recipients (mailing_id, recipient_id, position)
            SELECT $1, r.recipient_id, r.position::INTEGER
            FROM UNNEST($2::UUID[]) WITH ORDINALITY AS r(recipient_id, position)
            "#,
        )
        .bind(mailing.id().as_uuid())
        .bind(&recipient_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &MailingId) -> Result<Option<Mailing>, InfraError> {
        let sql = format!("{SELECT_MAILING} WHERE m.id = $1");
        let row = sqlx::query_as::<_, MailingRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Mailing::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_status(&self, id: &MailingId) -> Result<Option<MailingStatus>, InfraError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM mailings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        status
            .map(|s| {
                s.parse::<MailingStatus>()
                    .map_err(|e| InfraError::unexpected(format!("不正なステータス {s}: {e}")))
            })
            .transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_recipients(&self, id: &MailingId) -> Result<Vec<Recipient>, InfraError> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT r.id, r.owner_id, r.email, r.full_name, r.comment, r.created_at
            FROM mailing_recipients mr
            INNER JOIN recipients r ON r.id = mr.recipient_id
            WHERE mr.mailing_id = $1
            ORDER BY mr.position
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Recipient::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Mailing>, InfraError> {
        let sql = format!(
            "{SELECT_MAILING} WHERE m.status = 'created' AND m.scheduled_at <= $1 \
             ORDER BY m.scheduled_at"
        );
        let rows = sqlx::query_as::<_, MailingRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Mailing::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn find_launched_by_owner(
        &self,
        owner_id: &UserId,
    ) -> Result<Vec<Mailing>, InfraError> {
        let sql = format!(
            "{SELECT_MAILING} WHERE m.owner_id = $1 AND m.status = 'launched' \
             ORDER BY m.first_sent_at"
        );
        let rows = sqlx::query_as::<_, MailingRow>(&sql)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Mailing::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn try_claim(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE mailings
            SET status = 'launched', first_sent_at = $2
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn try_complete(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE mailings
            SET status = 'accomplished', completed_at = $2
            WHERE id = $1 AND status = 'launched'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn try_complete_in_tx(
        &self,
        tx: &mut TxContext,
        id: &MailingId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE mailings
            SET status = 'accomplished', completed_at = $2
            WHERE id = $1 AND status = 'launched'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(tx.conn()?)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn try_schedule(&self, id: &MailingId, at: DateTime<Utc>) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE mailings
            SET scheduled_at = $2
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn MailingRepository>>();
    }
}

//! # StatsRepository
//!
//! ダッシュボード用の所有者別集計を担当する。
//! 集計は単一のクエリで行い、スカラーサブクエリごとに件数を返す。

use async_trait::async_trait;
use mailflow_domain::user::UserId;
use sqlx::PgPool;

use crate::error::InfraError;

/// 所有者別の配信統計
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct MailingStats {
    /// メール配信の総数
    pub total_mailings:       i64,
    /// 配信中のメール配信数
    pub active_mailings:      i64,
    /// 配信中のメール配信に含まれる受信者数（延べ）
    pub active_recipients:    i64,
    /// 所有者の受信者数
    pub recipients:           i64,
    /// 成功した試行数
    pub successful_attempts:  i64,
    /// 失敗した試行数
    pub failed_attempts:      i64,
    /// 試行が一件以上あるメール配信数
    pub unique_sent_mailings: i64,
}

impl MailingStats {
    /// 送信済み（成功 + 失敗）の試行数
    pub fn total_sent(&self) -> i64 {
        self.successful_attempts + self.failed_attempts
    }
}

/// 統計リポジトリトレイト
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// 所有者の配信統計を取得する
    async fn mailing_stats(&self, owner_id: &UserId) -> Result<MailingStats, InfraError>;
}

/// PostgreSQL 実装の StatsRepository
#[derive(Debug, Clone)]
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn mailing_stats(&self, owner_id: &UserId) -> Result<MailingStats, InfraError> {
        let stats = sqlx::query_as::<_, MailingStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM mailings WHERE owner_id = $1) AS total_mailings,
                (SELECT COUNT(*) FROM mailings WHERE owner_id = $1 AND status = 'launched')
                    AS active_mailings,
                (
                    SELECT COUNT(*)
                    FROM mailing_recipients mr
                    INNER JOIN mailings m ON m.id = mr.mailing_id
                    WHERE m.owner_id = $1 AND m.status = 'launched'
                ) AS active_recipients,
                (SELECT COUNT(*) FROM recipients WHERE owner_id = $1) AS recipients,
                (SELECT COUNT(*) FROM attempts WHERE owner_id = $1 AND status = 'success')
                    AS successful_attempts,
                (SELECT COUNT(*) FROM attempts WHERE owner_id = $1 AND status = 'failed')
                    AS failed_attempts,
                (SELECT COUNT(DISTINCT mailing_id) FROM attempts WHERE owner_id = $1)
                    AS unique_sent_mailings
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sentは成功と失敗の合計() {
        let stats = MailingStats {
            successful_attempts: 3,
            failed_attempts: 2,
            ..Default::default()
        };

        assert_eq!(stats.total_sent(), 5);
    }

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn StatsRepository>>();
    }
}

//! # ダッシュボードユースケース
//!
//! 所有者ごとの配信統計（KPI）を取得する。
//!
//! ## 統計項目
//!
//! - メール配信の総数と配信中の数
//! - 配信中のメール配信に含まれる受信者数
//! - 所有者の受信者数
//! - 成功・失敗した試行数とその合計
//! - 試行が一件以上あるメール配信数

use std::sync::Arc;

use mailflow_domain::user::UserId;
use mailflow_infra::repository::StatsRepository;
use serde::Serialize;

use crate::error::ServiceError;

/// ダッシュボード統計情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_mailings:       i64,
    pub active_mailings:      i64,
    pub active_recipients:    i64,
    pub recipients:           i64,
    pub successful_attempts:  i64,
    pub failed_attempts:      i64,
    pub total_sent:           i64,
    pub unique_sent_mailings: i64,
}

pub struct DashboardUseCaseImpl {
    stats_repo: Arc<dyn StatsRepository>,
}

impl DashboardUseCaseImpl {
    pub fn new(stats_repo: Arc<dyn StatsRepository>) -> Self {
        Self { stats_repo }
    }

    /// ダッシュボード統計情報を取得する
    pub async fn get_stats(&self, owner_id: &UserId) -> Result<DashboardStats, ServiceError> {
        let stats = self.stats_repo.mailing_stats(owner_id).await?;

        Ok(DashboardStats {
            total_mailings:       stats.total_mailings,
            active_mailings:      stats.active_mailings,
            active_recipients:    stats.active_recipients,
            recipients:           stats.recipients,
            successful_attempts:  stats.successful_attempts,
            failed_attempts:      stats.failed_attempts,
            total_sent:           stats.total_sent(),
            unique_sent_mailings: stats.unique_sent_mailings,
        })
    }
}

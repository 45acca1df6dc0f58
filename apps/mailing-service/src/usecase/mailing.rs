//! # メール配信の操作
//!
//! HTTP から呼ばれるメール配信操作（送信、停止、予約、試行履歴）を実装する。
//! 操作者の権限をここで確認してから、配信エンジンと停止エンジンに委譲する。
//!
//! | 操作 | 許可 |
//! |------|------|
//! | 送信 / 停止 / 予約 | 所有者 |
//! | 試行履歴 | 所有者またはサービスマネージャー |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mailflow_domain::{
    attempt::Attempt,
    mailing::{Mailing, MailingId},
    user::{User, UserId},
};
use mailflow_infra::repository::{AttemptRepository, MailingRepository, UserRepository};

use super::{
    dispatch::{DispatchResult, DispatchUseCaseImpl},
    helpers::{FindResultExt, ensure_active, ensure_owner, ensure_owner_or_manager},
    schedule::ScheduleUseCaseImpl,
    stop::{MANUAL_STOP_REASON, StopOutcome, StopUseCaseImpl},
};
use crate::error::ServiceError;

pub struct MailingUseCaseImpl {
    user_repo:    Arc<dyn UserRepository>,
    mailing_repo: Arc<dyn MailingRepository>,
    attempt_repo: Arc<dyn AttemptRepository>,
    dispatch:     Arc<DispatchUseCaseImpl>,
    stop:         Arc<StopUseCaseImpl>,
    schedule:     Arc<ScheduleUseCaseImpl>,
}

impl MailingUseCaseImpl {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        mailing_repo: Arc<dyn MailingRepository>,
        attempt_repo: Arc<dyn AttemptRepository>,
        dispatch: Arc<DispatchUseCaseImpl>,
        stop: Arc<StopUseCaseImpl>,
        schedule: Arc<ScheduleUseCaseImpl>,
    ) -> Self {
        Self {
            user_repo,
            mailing_repo,
            attempt_repo,
            dispatch,
            stop,
            schedule,
        }
    }

    /// 操作者とメール配信を読み込む
    async fn load(
        &self,
        mailing_id: &MailingId,
        actor_id: &UserId,
    ) -> Result<(User, Mailing), ServiceError> {
        let actor = self
            .user_repo
            .find_by_id(actor_id)
            .await
            .or_not_found("ユーザー")?;
        let mailing = self
            .mailing_repo
            .find_by_id(mailing_id)
            .await
            .or_not_found("メール配信")?;
        Ok((actor, mailing))
    }

    /// メール配信を送信する
    pub async fn send(
        &self,
        mailing_id: &MailingId,
        actor_id: &UserId,
    ) -> Result<DispatchResult, ServiceError> {
        let (actor, mailing) = self.load(mailing_id, actor_id).await?;
        ensure_active(&actor)?;
        ensure_owner(&actor, &mailing, "送信")?;

        self.dispatch.run(&mailing).await
    }

    /// メール配信を停止する
    ///
    /// 理由が指定されない場合は手動停止の理由を使う。
    pub async fn stop(
        &self,
        mailing_id: &MailingId,
        actor_id: &UserId,
        reason: Option<&str>,
    ) -> Result<StopOutcome, ServiceError> {
        let (actor, mailing) = self.load(mailing_id, actor_id).await?;
        ensure_active(&actor)?;
        ensure_owner(&actor, &mailing, "停止")?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(MANUAL_STOP_REASON);
        self.stop.stop(&mailing, reason).await
    }

    /// 配信予定日時を設定する
    pub async fn schedule(
        &self,
        mailing_id: &MailingId,
        actor_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Mailing, ServiceError> {
        let (actor, mailing) = self.load(mailing_id, actor_id).await?;
        ensure_active(&actor)?;
        ensure_owner(&actor, &mailing, "予約")?;

        self.schedule.schedule(&mailing, at).await
    }

    /// 配信試行の履歴を取得する
    pub async fn list_attempts(
        &self,
        mailing_id: &MailingId,
        actor_id: &UserId,
    ) -> Result<Vec<Attempt>, ServiceError> {
        let (actor, mailing) = self.load(mailing_id, actor_id).await?;
        ensure_owner_or_manager(&actor, &mailing, "閲覧")?;

        Ok(self.attempt_repo.find_by_mailing(mailing.id()).await?)
    }
}

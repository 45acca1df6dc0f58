//! # ユーザーのブロック
//!
//! サービスマネージャーがユーザーをブロック、またはブロック解除する。
//! ブロックされたユーザーの配信中のメール配信は、ブロックを理由として停止する。
//! ブロックを解除しても停止したメール配信は再開しない。

use std::sync::Arc;

use mailflow_domain::user::UserId;
use mailflow_infra::repository::{MailingRepository, UserRepository};
use mailflow_shared::{event_log::event, log_business_event};
use serde::Serialize;

use super::{
    helpers::{FindResultExt, ensure_service_manager},
    stop::{StopOutcome, StopUseCaseImpl, USER_BLOCKED_STOP_REASON},
};
use crate::error::ServiceError;

/// ブロックの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockUserResult {
    pub user_id:          UserId,
    /// 停止したメール配信の数
    pub stopped_mailings: usize,
}

/// ブロック解除の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnblockUserResult {
    pub user_id:    UserId,
    pub is_blocked: bool,
}

pub struct UserUseCaseImpl {
    user_repo:    Arc<dyn UserRepository>,
    mailing_repo: Arc<dyn MailingRepository>,
    stop:         Arc<StopUseCaseImpl>,
}

impl UserUseCaseImpl {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        mailing_repo: Arc<dyn MailingRepository>,
        stop: Arc<StopUseCaseImpl>,
    ) -> Self {
        Self {
            user_repo,
            mailing_repo,
            stop,
        }
    }

    /// ユーザーをブロックし、配信中のメール配信を停止する
    #[tracing::instrument(skip_all, fields(%actor_id, %target_id))]
    pub async fn block_user(
        &self,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<BlockUserResult, ServiceError> {
        let actor = self
            .user_repo
            .find_by_id(actor_id)
            .await
            .or_not_found("ユーザー")?;
        ensure_service_manager(&actor)?;

        let target = self
            .user_repo
            .find_by_id(target_id)
            .await
            .or_not_found("ユーザー")?
            .blocked()?;
        self.user_repo.update_blocked(target.id(), true).await?;

        let mut stopped_mailings = 0;
        for mailing in self.mailing_repo.find_launched_by_owner(target.id()).await? {
            if let StopOutcome::Stopped { .. } =
                self.stop.stop(&mailing, USER_BLOCKED_STOP_REASON).await?
            {
                stopped_mailings += 1;
            }
        }

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_BLOCKED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %target.id(),
            event.actor_id = %actor.id(),
            event.result = event::result::SUCCESS,
            stopped_mailings,
            "ユーザーをブロックしました"
        );

        Ok(BlockUserResult {
            user_id: target.id().clone(),
            stopped_mailings,
        })
    }

    /// ユーザーのブロックを解除する
    #[tracing::instrument(skip_all, fields(%actor_id, %target_id))]
    pub async fn unblock_user(
        &self,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<UnblockUserResult, ServiceError> {
        let actor = self
            .user_repo
            .find_by_id(actor_id)
            .await
            .or_not_found("ユーザー")?;
        ensure_service_manager(&actor)?;

        let target = self
            .user_repo
            .find_by_id(target_id)
            .await
            .or_not_found("ユーザー")?
            .unblocked();
        self.user_repo.update_blocked(target.id(), false).await?;

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_UNBLOCKED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %target.id(),
            event.actor_id = %actor.id(),
            event.result = event::result::SUCCESS,
            "ユーザーのブロックを解除しました"
        );

        Ok(UnblockUserResult {
            user_id:    target.id().clone(),
            is_blocked: target.is_blocked(),
        })
    }
}

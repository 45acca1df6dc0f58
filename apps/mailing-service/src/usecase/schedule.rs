//! # 配信予約
//!
//! 未配信のメール配信に配信予定日時を設定する。スケジューラは予定日時を過ぎた
//! 未配信のメール配信を配信エンジンに渡す。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mailflow_domain::mailing::Mailing;
use mailflow_infra::repository::MailingRepository;
use mailflow_shared::{event_log::event, log_business_event};

use super::helpers::FindResultExt;
use crate::error::ServiceError;

pub struct ScheduleUseCaseImpl {
    mailing_repo: Arc<dyn MailingRepository>,
}

impl ScheduleUseCaseImpl {
    pub fn new(mailing_repo: Arc<dyn MailingRepository>) -> Self {
        Self { mailing_repo }
    }

    /// 配信予定日時を設定し、更新後のメール配信を返す
    ///
    /// created 以外の場合は `Conflict` を返す。
    #[tracing::instrument(skip_all, fields(mailing_id = %mailing.id(), %at))]
    pub async fn schedule(
        &self,
        mailing: &Mailing,
        at: DateTime<Utc>,
    ) -> Result<Mailing, ServiceError> {
        if !self.mailing_repo.try_schedule(mailing.id(), at).await? {
            return Err(ServiceError::Conflict(
                "配信を開始したメール配信は予約できません".to_string(),
            ));
        }

        log_business_event!(
            event.category = event::category::MAILING,
            event.action = event::action::MAILING_SCHEDULED,
            event.entity_type = event::entity_type::MAILING,
            event.entity_id = %mailing.id(),
            event.result = event::result::SUCCESS,
            scheduled_at = %at,
            "配信を予約しました"
        );

        self.mailing_repo
            .find_by_id(mailing.id())
            .await
            .or_not_found("メール配信")
    }
}

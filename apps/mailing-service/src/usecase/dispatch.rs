//! # 配信エンジン
//!
//! メール配信のメッセージを全受信者へ送信し、受信者ごとの配信試行を記録する。
//!
//! ## 処理の流れ
//!
//! 1. ガード: created 以外なら `AlreadyLaunched`、受信者がいなければ `NoRecipients`
//! 2. 配信権の獲得: created → launched の条件付き更新。影響行数 0 なら `AlreadyLaunched`
//! 3. 送信: `Semaphore` で同時数を制限しつつ受信者ごとにタスクを起動する。
//!    送信の成否にかかわらず試行を記録し、ループは中断しない
//! 4. 全タスクの終了を待ってから launched → accomplished に遷移する
//!
//! 配信エンジンは権限を確認しない。呼び出し元（HTTP、CLI、スケジューラ）の責務。

use std::sync::Arc;

use mailflow_domain::{
    attempt::{Attempt, AttemptStatus},
    clock::Clock,
    mail::EmailMessage,
    mailing::{Mailing, MailingId, MailingStatus},
    message::Message,
    recipient::Recipient,
};
use mailflow_infra::{
    InfraError,
    mail::MailTransport,
    repository::{AttemptRepository, MailingRepository, MessageRepository},
};
use mailflow_shared::{
    event_log::{
        error::{category, kind},
        event,
    },
    log_business_event,
};
use serde::Serialize;
use tokio::sync::Semaphore;

use super::helpers::FindResultExt;
use crate::error::ServiceError;

/// 配信の結果種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchOutcome {
    /// 配信を実行した
    Ok,
    /// 既に配信が開始されていた（他の呼び出しが配信権を獲得済み）
    AlreadyLaunched,
    /// 受信者がいない
    NoRecipients,
}

/// 配信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub outcome:       DispatchOutcome,
    pub success_count: usize,
    pub failure_count: usize,
}

impl DispatchResult {
    fn skipped(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// 配信エンジン
pub struct DispatchUseCaseImpl {
    mailing_repo: Arc<dyn MailingRepository>,
    message_repo: Arc<dyn MessageRepository>,
    attempt_repo: Arc<dyn AttemptRepository>,
    transport:    Arc<dyn MailTransport>,
    clock:        Arc<dyn Clock>,
    from_address: String,
    concurrency:  usize,
}

impl DispatchUseCaseImpl {
    pub fn new(
        mailing_repo: Arc<dyn MailingRepository>,
        message_repo: Arc<dyn MessageRepository>,
        attempt_repo: Arc<dyn AttemptRepository>,
        transport: Arc<dyn MailTransport>,
        clock: Arc<dyn Clock>,
        from_address: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            mailing_repo,
            message_repo,
            attempt_repo,
            transport,
            clock,
            from_address: from_address.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// ID でメール配信を読み込んで配信する
    pub async fn run_by_id(&self, mailing_id: &MailingId) -> Result<DispatchResult, ServiceError> {
        let mailing = self
            .mailing_repo
            .find_by_id(mailing_id)
            .await
            .or_not_found("メール配信")?;
        self.run(&mailing).await
    }

    /// メール配信を実行する
    #[tracing::instrument(skip_all, fields(mailing_id = %mailing.id()))]
    pub async fn run(&self, mailing: &Mailing) -> Result<DispatchResult, ServiceError> {
        if mailing.status() != MailingStatus::Created {
            tracing::debug!(status = %mailing.status(), "配信済みのため何もしない");
            return Ok(DispatchResult::skipped(DispatchOutcome::AlreadyLaunched));
        }

        let recipients = self.mailing_repo.find_recipients(mailing.id()).await?;
        if recipients.is_empty() {
            tracing::debug!("受信者がいないため何もしない");
            return Ok(DispatchResult::skipped(DispatchOutcome::NoRecipients));
        }

        let message = self
            .message_repo
            .find_by_id(mailing.message_id())
            .await
            .or_not_found("メッセージ")?;

        if !self.mailing_repo.try_claim(mailing.id(), self.clock.now()).await? {
            tracing::debug!("他の呼び出しが配信権を獲得済み");
            return Ok(DispatchResult::skipped(DispatchOutcome::AlreadyLaunched));
        }
        log_business_event!(
            event.category = event::category::MAILING,
            event.action = event::action::MAILING_CLAIMED,
            event.entity_type = event::entity_type::MAILING,
            event.entity_id = %mailing.id(),
            event.result = event::result::SUCCESS,
            recipients = recipients.len(),
            "配信を開始しました"
        );

        let (success_count, failure_count) = self.send_all(mailing, &message, recipients).await?;

        let completed = self
            .mailing_repo
            .try_complete(mailing.id(), self.clock.now())
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    "全受信者の試行を記録したが完了に遷移できなかった: {e}"
                );
            })?;
        if completed {
            log_business_event!(
                event.category = event::category::MAILING,
                event.action = event::action::MAILING_COMPLETED,
                event.entity_type = event::entity_type::MAILING,
                event.entity_id = %mailing.id(),
                event.result = event::result::SUCCESS,
                success_count,
                failure_count,
                "配信が完了しました"
            );
        } else {
            tracing::warn!("配信中に停止されたため完了遷移は行わない");
        }

        Ok(DispatchResult {
            outcome: DispatchOutcome::Ok,
            success_count,
            failure_count,
        })
    }

    /// 全受信者へ送信し、(成功数, 失敗数) を返す
    ///
    /// 途中で記録に失敗したタスクがあっても残りのタスクの終了を待ち、
    /// 最初のエラーを返す。
    async fn send_all(
        &self,
        mailing: &Mailing,
        message: &Message,
        recipients: Vec<Recipient>,
    ) -> Result<(usize, usize), ServiceError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mailing = Arc::new(mailing.clone());
        let message = Arc::new(message.clone());
        let mut handles = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ServiceError::Internal(format!("Semaphore の取得に失敗: {e}")))?;
            let delivery = Delivery {
                mailing:      Arc::clone(&mailing),
                message:      Arc::clone(&message),
                from_address: self.from_address.clone(),
                mailing_repo: Arc::clone(&self.mailing_repo),
                attempt_repo: Arc::clone(&self.attempt_repo),
                transport:    Arc::clone(&self.transport),
                clock:        Arc::clone(&self.clock),
            };
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                delivery.deliver(recipient).await
            }));
        }

        let mut success_count = 0;
        let mut failure_count = 0;
        let mut first_error: Option<ServiceError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(Some(AttemptStatus::Success))) => success_count += 1,
                Ok(Ok(Some(AttemptStatus::Failed))) => failure_count += 1,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => first_error = first_error.or(Some(e.into())),
                Err(e) => {
                    first_error = first_error.or(Some(ServiceError::Internal(format!(
                        "送信タスクが異常終了しました: {e}"
                    ))));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok((success_count, failure_count)),
        }
    }
}

/// 受信者 1 人分の送信タスク
struct Delivery {
    mailing:      Arc<Mailing>,
    message:      Arc<Message>,
    from_address: String,
    mailing_repo: Arc<dyn MailingRepository>,
    attempt_repo: Arc<dyn AttemptRepository>,
    transport:    Arc<dyn MailTransport>,
    clock:        Arc<dyn Clock>,
}

impl Delivery {
    /// 送信して試行を記録する
    ///
    /// 停止済みで送信しなかった場合、または停止処理が先に試行を記録していた場合は
    /// `None` を返す。
    #[tracing::instrument(skip_all, level = "debug", fields(recipient_id = %recipient.id()))]
    async fn deliver(&self, recipient: Recipient) -> Result<Option<AttemptStatus>, InfraError> {
        let status = self.mailing_repo.find_status(self.mailing.id()).await?;
        if status != Some(MailingStatus::Launched) {
            tracing::debug!("停止済みのため送信しない");
            return Ok(None);
        }

        let email =
            EmailMessage::compose(&self.message, &self.from_address, recipient.email());
        let attempt = match self.transport.send(&email).await {
            Ok(()) => Attempt::success(&self.mailing, &recipient, self.clock.now()),
            Err(e) => {
                tracing::warn!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::MAIL_TRANSPORT,
                    "送信に失敗: {e}"
                );
                Attempt::failed(&self.mailing, &recipient, e.to_string(), self.clock.now())
            }
        };

        let recorded = self
            .attempt_repo
            .record(&attempt)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    recipient.email = recipient.email().as_str(),
                    attempt.status = %attempt.status(),
                    "配信試行の記録に失敗: {e}"
                );
            })?;
        if recorded {
            Ok(Some(attempt.status()))
        } else {
            tracing::debug!("停止処理が先に試行を記録済み");
            Ok(None)
        }
    }
}

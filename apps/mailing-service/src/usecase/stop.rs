//! # 停止エンジン
//!
//! 配信中のメール配信を完了状態にし、まだ試行のない受信者について
//! 停止理由を診断メッセージとした失敗の試行を補完する。
//!
//! 完了遷移と補完は同じトランザクションで行う。完了遷移は launched を条件とした
//! 条件付き更新のため、同じメール配信への停止が同時に来ても補完は一度だけ行われる。
//! 配信エンジンとの競合は `(mailing_id, recipient_id)` の一意制約で吸収される。

use std::{collections::HashSet, sync::Arc};

use mailflow_domain::{
    attempt::Attempt,
    clock::Clock,
    mailing::Mailing,
    recipient::RecipientId,
};
use mailflow_infra::{
    db::TransactionManager,
    repository::{AttemptRepository, MailingRepository},
};
use mailflow_shared::{event_log::event, log_business_event};

use crate::error::ServiceError;

/// 手動停止時の停止理由
pub const MANUAL_STOP_REASON: &str = "ユーザーが手動でメール配信を停止しました";

/// ユーザーのブロックに伴う停止理由
pub const USER_BLOCKED_STOP_REASON: &str = "ユーザーがブロックされたためメール配信を停止しました";

/// 停止の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 配信中ではなかったため何もしなかった
    NotLaunched,
    /// 停止した。`backfilled` は補完した失敗の試行の数
    Stopped { backfilled: usize },
}

/// 停止エンジン
pub struct StopUseCaseImpl {
    mailing_repo: Arc<dyn MailingRepository>,
    attempt_repo: Arc<dyn AttemptRepository>,
    tx_manager:   Arc<dyn TransactionManager>,
    clock:        Arc<dyn Clock>,
}

impl StopUseCaseImpl {
    pub fn new(
        mailing_repo: Arc<dyn MailingRepository>,
        attempt_repo: Arc<dyn AttemptRepository>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mailing_repo,
            attempt_repo,
            tx_manager,
            clock,
        }
    }

    /// メール配信を停止する
    ///
    /// 永続化されたステータスが launched の場合のみ停止する。
    #[tracing::instrument(skip_all, fields(mailing_id = %mailing.id()))]
    pub async fn stop(&self, mailing: &Mailing, reason: &str) -> Result<StopOutcome, ServiceError> {
        let recipients = self.mailing_repo.find_recipients(mailing.id()).await?;
        let now = self.clock.now();

        let mut tx = self.tx_manager.begin().await?;
        if !self
            .mailing_repo
            .try_complete_in_tx(&mut tx, mailing.id(), now)
            .await?
        {
            tracing::debug!("配信中ではないため何もしない");
            return Ok(StopOutcome::NotLaunched);
        }

        let attempted = self
            .attempt_repo
            .find_attempted_recipient_ids_in_tx(&mut tx, mailing.id())
            .await?;
        let missing: HashSet<&RecipientId> = mailing
            .recipients_without_attempt(&attempted)
            .into_iter()
            .collect();
        let mut backfilled = 0;
        for recipient in recipients.iter().filter(|r| missing.contains(r.id())) {
            let attempt = Attempt::failed(mailing, recipient, reason, now);
            if self.attempt_repo.record_in_tx(&mut tx, &attempt).await? {
                backfilled += 1;
            }
        }
        tx.commit().await?;

        log_business_event!(
            event.category = event::category::MAILING,
            event.action = event::action::MAILING_STOPPED,
            event.entity_type = event::entity_type::MAILING,
            event.entity_id = %mailing.id(),
            event.result = event::result::SUCCESS,
            backfilled,
            reason,
            "配信を停止しました"
        );

        Ok(StopOutcome::Stopped { backfilled })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mailflow_domain::mailing::MailingStatus;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{test_utils::MailingTestBuilder, usecase::dispatch::DispatchOutcome};

    #[tokio::test]
    async fn test_未配信のメール配信の停止は何もしない() {
        let setup = MailingTestBuilder::new().build().await;
        let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;

        let outcome = setup.stop.stop(&mailing, MANUAL_STOP_REASON).await.unwrap();

        assert_eq!(outcome, StopOutcome::NotLaunched);
        assert_eq!(
            setup.mailings.get(mailing.id()).unwrap().status(),
            MailingStatus::Created
        );
        assert!(setup.attempts.all().is_empty());
    }

    #[tokio::test]
    async fn test_完了済みのメール配信の停止は何もしない() {
        let setup = MailingTestBuilder::new().build().await;
        let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;
        setup.dispatch.run(&mailing).await.unwrap();

        let outcome = setup.stop.stop(&mailing, MANUAL_STOP_REASON).await.unwrap();

        assert_eq!(outcome, StopOutcome::NotLaunched);
        assert_eq!(setup.attempts.all().len(), 1);
    }

    #[tokio::test]
    async fn test_配信中のメール配信を停止すると未試行の受信者に失敗の試行を補完する() {
        let builder = MailingTestBuilder::new();
        let setup = builder.build().await;
        let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io", "c@x.io"]).await;
        setup.launch(&mailing).await;
        setup.record_success(&mailing, "a@x.io").await;

        let outcome = setup.stop.stop(&mailing, MANUAL_STOP_REASON).await.unwrap();

        assert_eq!(outcome, StopOutcome::Stopped { backfilled: 2 });
        let stored = setup.mailings.get(mailing.id()).unwrap();
        assert_eq!(stored.status(), MailingStatus::Accomplished);
        assert_eq!(stored.completed_at(), Some(builder.now()));
        let attempts = setup.attempts.all();
        assert_eq!(attempts.len(), 3);
        let stopped: Vec<_> = attempts.iter().filter(|a| !a.is_success()).collect();
        assert_eq!(stopped.len(), 2);
        assert!(stopped.iter().all(|a| a.server_response() == MANUAL_STOP_REASON));
    }

    #[tokio::test]
    async fn test_二回目の停止は何もしない() {
        let setup = MailingTestBuilder::new().build().await;
        let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;
        setup.launch(&mailing).await;

        let first = setup.stop.stop(&mailing, MANUAL_STOP_REASON).await.unwrap();
        let second = setup.stop.stop(&mailing, MANUAL_STOP_REASON).await.unwrap();

        assert_eq!(first, StopOutcome::Stopped { backfilled: 1 });
        assert_eq!(second, StopOutcome::NotLaunched);
        assert_eq!(setup.attempts.all().len(), 1);
    }

    #[tokio::test]
    async fn test_配信中の停止と配信が競合しても受信者ごとの試行は一件() {
        let setup = MailingTestBuilder::new()
            .with_concurrency(1)
            .with_send_delay(Duration::from_millis(20))
            .build()
            .await;
        let mailing = setup
            .mailing_with_recipients(&["a@x.io", "b@x.io", "c@x.io", "d@x.io"])
            .await;

        let (dispatched, stopped) = tokio::join!(setup.dispatch.run(&mailing), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            setup.stop.stop(&mailing, MANUAL_STOP_REASON).await
        });

        let dispatched = dispatched.unwrap();
        assert_eq!(dispatched.outcome, DispatchOutcome::Ok);
        let StopOutcome::Stopped { backfilled } = stopped.unwrap() else {
            panic!("配信中に停止できること");
        };
        let attempts = setup.attempts.all();
        assert_eq!(attempts.len(), 4);
        assert_eq!(
            dispatched.success_count + dispatched.failure_count + backfilled,
            4
        );
        assert!(setup.transport.sent().len() < 4);
        assert_eq!(
            setup.mailings.get(mailing.id()).unwrap().status(),
            MailingStatus::Accomplished
        );
    }
}

//! # 配信スケジューラ
//!
//! 一定間隔で配信予定日時を過ぎたメール配信を探し、配信エンジンで順に配信する。
//!
//! `start` で起動し、返された [`SchedulerHandle`] の `stop` で停止する。
//! 停止は実行中のポーリングが終わるのを待ってから完了する。
//! 一つのメール配信の失敗は他のメール配信の配信を妨げない。

use std::{sync::Arc, time::Duration};

use mailflow_domain::clock::Clock;
use mailflow_infra::repository::MailingRepository;
use mailflow_shared::event_log::error::{category, kind};
use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    error::ServiceError,
    usecase::dispatch::{DispatchOutcome, DispatchUseCaseImpl},
};

/// 1 回のポーリングの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// 配信予定日時を過ぎていたメール配信の数
    pub due:        usize,
    /// 配信を実行した数
    pub dispatched: usize,
    /// 他の呼び出しが先に配信した、または受信者がいなかった数
    pub skipped:    usize,
    /// 配信がエラーになった数
    pub failed:     usize,
}

pub struct MailingScheduler {
    dispatch:     Arc<DispatchUseCaseImpl>,
    mailing_repo: Arc<dyn MailingRepository>,
    clock:        Arc<dyn Clock>,
    interval:     Duration,
}

impl MailingScheduler {
    pub fn new(
        dispatch: Arc<DispatchUseCaseImpl>,
        mailing_repo: Arc<dyn MailingRepository>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            dispatch,
            mailing_repo,
            clock,
            interval,
        }
    }

    /// 配信予定日時を過ぎたメール配信をすべて配信する
    ///
    /// 個々の配信エラーはログに記録して集計するだけで、呼び出し元には返さない。
    #[tracing::instrument(skip_all, level = "debug")]
    pub async fn tick(&self) -> Result<TickSummary, ServiceError> {
        let due = self.mailing_repo.find_due(self.clock.now()).await?;
        let mut summary = TickSummary {
            due: due.len(),
            ..Default::default()
        };

        for mailing in &due {
            match self.dispatch.run(mailing).await {
                Ok(result) if result.outcome == DispatchOutcome::Ok => summary.dispatched += 1,
                Ok(result) => {
                    tracing::debug!(
                        mailing_id = %mailing.id(),
                        outcome = %result.outcome,
                        "配信をスキップ"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        error.category = category::INFRASTRUCTURE,
                        error.kind = kind::INTERNAL,
                        mailing_id = %mailing.id(),
                        "予約配信に失敗しました: {e}"
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.due > 0 {
            tracing::info!(
                due = summary.due,
                dispatched = summary.dispatched,
                skipped = summary.skipped,
                failed = summary.failed,
                "予約配信を処理しました"
            );
        }
        Ok(summary)
    }

    /// バックグラウンドでポーリングを開始する
    ///
    /// 最初のポーリングは起動から 1 間隔後に行う。
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                "スケジューラを開始しました"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            tracing::error!(
                                error.category = category::INFRASTRUCTURE,
                                error.kind = kind::DATABASE,
                                "配信予定のメール配信を取得できませんでした: {e}"
                            );
                        }
                    }
                }
            }

            tracing::info!("スケジューラを停止しました");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// 起動中のスケジューラ
pub struct SchedulerHandle {
    shutdown_tx: oneshot::Sender<()>,
    task:        JoinHandle<()>,
}

impl SchedulerHandle {
    /// 停止を通知し、ポーリングのループが終わるまで待つ
    pub async fn stop(self) {
        // ループが既に終了している場合は受信側が閉じている
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(
                error.category = category::INFRASTRUCTURE,
                error.kind = kind::INTERNAL,
                "スケジューラのタスクが異常終了しました: {e}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use mailflow_domain::{
        mailing::{Mailing, MailingId, MailingStatus, NewMailing},
        message::MessageId,
    };
    use mailflow_infra::repository::MailingRepository;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::{MailingTestBuilder, MailingTestSetup};

    fn scheduler(setup: &MailingTestSetup, interval: Duration) -> Arc<MailingScheduler> {
        Arc::new(MailingScheduler::new(
            setup.dispatch.clone(),
            Arc::new(setup.mailings.clone()),
            setup.clock.clone(),
            interval,
        ))
    }

    async fn scheduled_mailing(
        setup: &MailingTestSetup,
        emails: &[&str],
        after_minutes: i64,
    ) -> Mailing {
        let mailing = setup.mailing_with_recipients(emails).await;
        setup
            .schedule
            .schedule(&mailing, setup.clock.now() + ChronoDuration::minutes(after_minutes))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_配信予定日時を過ぎたメール配信だけが配信される() {
        let setup = MailingTestBuilder::new().build().await;
        let sut = scheduler(&setup, Duration::from_secs(60));
        let later = scheduled_mailing(&setup, &["a@x.io"], 5).await;
        let unscheduled = setup.mailing_with_recipients(&["b@x.io"]).await;

        let before = sut.tick().await.unwrap();
        setup.clock.advance(ChronoDuration::minutes(5));
        let after = sut.tick().await.unwrap();

        assert_eq!(before, TickSummary::default());
        assert_eq!(
            after,
            TickSummary {
                due:        1,
                dispatched: 1,
                skipped:    0,
                failed:     0,
            }
        );
        assert_eq!(
            setup.mailings.get(later.id()).unwrap().status(),
            MailingStatus::Accomplished
        );
        assert_eq!(
            setup.mailings.get(unscheduled.id()).unwrap().status(),
            MailingStatus::Created
        );
        assert_eq!(setup.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_配信済みのメール配信は次のポーリングで再配信されない() {
        let setup = MailingTestBuilder::new().build().await;
        let sut = scheduler(&setup, Duration::from_secs(60));
        scheduled_mailing(&setup, &["a@x.io"], 0).await;

        sut.tick().await.unwrap();
        let second = sut.tick().await.unwrap();

        assert_eq!(second.due, 0);
        assert_eq!(setup.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_一つの配信が失敗しても他の配信は続行される() {
        let setup = MailingTestBuilder::new().build().await;
        let sut = scheduler(&setup, Duration::from_secs(60));
        let recipients = setup.mailing_with_recipients(&["a@x.io"]).await;
        // メッセージが存在しないメール配信
        let broken = Mailing::new(NewMailing {
            id: MailingId::new(),
            owner_id: setup.owner.id().clone(),
            message_id: MessageId::new(),
            recipient_ids: recipients.recipient_ids().to_vec(),
            scheduled_at: Some(setup.clock.now()),
            now: setup.clock.now(),
        });
        setup.mailings.insert(&broken).await.unwrap();
        let healthy = scheduled_mailing(&setup, &["b@x.io"], 0).await;

        let summary = sut.tick().await.unwrap();

        assert_eq!(summary.due, 2);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            setup.mailings.get(healthy.id()).unwrap().status(),
            MailingStatus::Accomplished
        );
        assert_eq!(
            setup.mailings.get(broken.id()).unwrap().status(),
            MailingStatus::Created
        );
    }

    #[tokio::test]
    async fn test_起動したスケジューラは停止するまでポーリングする() {
        let setup = MailingTestBuilder::new().build().await;
        let sut = scheduler(&setup, Duration::from_millis(10));
        let mailing = scheduled_mailing(&setup, &["a@x.io"], 0).await;

        let handle = sut.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        assert_eq!(
            setup.mailings.get(mailing.id()).unwrap().status(),
            MailingStatus::Accomplished
        );

        // 停止後は新しい予約配信を処理しない
        let after_stop = scheduled_mailing(&setup, &["b@x.io"], 0).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            setup.mailings.get(after_stop.id()).unwrap().status(),
            MailingStatus::Created
        );
    }
}

//! メール配信テストビルダー
//!
//! モックリポジトリ、モック送信、固定時刻を共有したユースケース一式を組み立てる。

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use mailflow_domain::{
    attempt::Attempt,
    clock::{Clock, FixedClock},
    mailing::{Mailing, MailingId, NewMailing},
    message::{Message, MessageId},
    recipient::{NewRecipient, Recipient, RecipientId},
    user::{Email, User, UserId, UserRole},
    value_objects::MessageSubject,
};
use mailflow_infra::{
    mock::{
        MockAttemptRepository,
        MockMailTransport,
        MockMailingRepository,
        MockMessageRepository,
        MockRecipientRepository,
        MockStatsRepository,
        MockTransactionManager,
        MockUserRepository,
    },
    repository::{AttemptRepository, MailingRepository, MessageRepository, RecipientRepository},
};

use crate::{
    app_builder::AppState,
    usecase::{
        dashboard::DashboardUseCaseImpl,
        dispatch::DispatchUseCaseImpl,
        mailing::MailingUseCaseImpl,
        schedule::ScheduleUseCaseImpl,
        stop::StopUseCaseImpl,
        user::UserUseCaseImpl,
    },
};

/// テストで使う送信元アドレス
pub const TEST_FROM_ADDRESS: &str = "noreply@mailflow.test";

/// メール配信テストのセットアップデータ
///
/// すべてのユースケースは同じモックと同じ [`FixedClock`] を共有する。
pub struct MailingTestSetup {
    pub owner:           User,
    pub message:         Message,
    pub clock:           Arc<FixedClock>,
    pub users:           MockUserRepository,
    pub recipients:      MockRecipientRepository,
    pub messages:        MockMessageRepository,
    pub mailings:        MockMailingRepository,
    pub attempts:        MockAttemptRepository,
    pub stats:           MockStatsRepository,
    pub transport:       MockMailTransport,
    pub dispatch:        Arc<DispatchUseCaseImpl>,
    pub stop:            Arc<StopUseCaseImpl>,
    pub schedule:        Arc<ScheduleUseCaseImpl>,
    pub mailing_usecase: Arc<MailingUseCaseImpl>,
    pub user_usecase:    Arc<UserUseCaseImpl>,
    pub dashboard:       Arc<DashboardUseCaseImpl>,
}

/// メール配信テストビルダー
///
/// ```ignore
/// use mailflow_mailing_service::test_utils::MailingTestBuilder;
///
/// #[tokio::test]
/// async fn test_example() {
///     let setup = MailingTestBuilder::new().with_concurrency(2).build().await;
///     let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io"]).await;
///
///     let result = setup.dispatch.run(&mailing).await.unwrap();
/// }
/// ```
pub struct MailingTestBuilder {
    now:         DateTime<Utc>,
    concurrency: usize,
    send_delay:  Option<Duration>,
}

impl Default for MailingTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MailingTestBuilder {
    /// デフォルト値で新しいビルダーを作成
    pub fn new() -> Self {
        Self {
            now:         DateTime::from_timestamp(1_700_000_000, 0).expect("固定時刻は有効"),
            concurrency: 4,
            send_delay:  None,
        }
    }

    /// 同時送信数を指定
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// モック送信の遅延を指定
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// ビルダーの now を取得
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// 所有者（メンバー）とメッセージを登録したセットアップを作成する
    pub async fn build(&self) -> MailingTestSetup {
        let clock = Arc::new(FixedClock::new(self.now));
        let users = MockUserRepository::new();
        let recipients = MockRecipientRepository::new();
        let messages = MockMessageRepository::new();
        let mailings = MockMailingRepository::new(recipients.clone());
        let attempts = MockAttemptRepository::new();
        let stats = MockStatsRepository::new();
        let transport = match self.send_delay {
            Some(delay) => MockMailTransport::new().with_delay(delay),
            None => MockMailTransport::new(),
        };

        let owner = User::new(
            UserId::new(),
            Email::new("owner@example.com").unwrap(),
            UserRole::Member,
            self.now,
        );
        users.add_user(owner.clone());

        let message = Message::new(
            MessageId::new(),
            owner.id().clone(),
            MessageSubject::new("お知らせ").unwrap(),
            "本文です",
            self.now,
        )
        .unwrap();
        messages.insert(&message).await.unwrap();

        let dispatch = Arc::new(DispatchUseCaseImpl::new(
            Arc::new(mailings.clone()),
            Arc::new(messages.clone()),
            Arc::new(attempts.clone()),
            Arc::new(transport.clone()),
            clock.clone(),
            TEST_FROM_ADDRESS,
            self.concurrency,
        ));
        let stop = Arc::new(StopUseCaseImpl::new(
            Arc::new(mailings.clone()),
            Arc::new(attempts.clone()),
            Arc::new(MockTransactionManager),
            clock.clone(),
        ));
        let schedule = Arc::new(ScheduleUseCaseImpl::new(Arc::new(mailings.clone())));
        let mailing_usecase = Arc::new(MailingUseCaseImpl::new(
            Arc::new(users.clone()),
            Arc::new(mailings.clone()),
            Arc::new(attempts.clone()),
            dispatch.clone(),
            stop.clone(),
            schedule.clone(),
        ));
        let user_usecase = Arc::new(UserUseCaseImpl::new(
            Arc::new(users.clone()),
            Arc::new(mailings.clone()),
            stop.clone(),
        ));
        let dashboard = Arc::new(DashboardUseCaseImpl::new(Arc::new(stats.clone())));

        MailingTestSetup {
            owner,
            message,
            clock,
            users,
            recipients,
            messages,
            mailings,
            attempts,
            stats,
            transport,
            dispatch,
            stop,
            schedule,
            mailing_usecase,
            user_usecase,
            dashboard,
        }
    }
}

impl MailingTestSetup {
    /// ユーザーを追加する
    pub async fn add_user(&self, email: &str, role: UserRole) -> User {
        let user = User::new(
            UserId::new(),
            Email::new(email).unwrap(),
            role,
            self.clock_now(),
        );
        self.users.add_user(user.clone());
        user
    }

    /// 所有者のメール配信を作成する（created 状態）
    ///
    /// 同じアドレスの受信者が既にあれば再利用する。
    pub async fn mailing_with_recipients(&self, emails: &[&str]) -> Mailing {
        let existing = self.recipients.find_by_owner(self.owner.id()).await.unwrap();
        let mut recipient_ids = Vec::with_capacity(emails.len());
        for email in emails {
            let id = match existing.iter().find(|r| r.email().as_str() == *email) {
                Some(recipient) => recipient.id().clone(),
                None => {
                    let recipient = Recipient::new(NewRecipient {
                        id:        RecipientId::new(),
                        owner_id:  self.owner.id().clone(),
                        email:     Email::new(*email).unwrap(),
                        full_name: None,
                        comment:   None,
                        now:       self.clock_now(),
                    });
                    self.recipients.insert(&recipient).await.unwrap();
                    recipient.id().clone()
                }
            };
            recipient_ids.push(id);
        }

        let mailing = Mailing::new(NewMailing {
            id: MailingId::new(),
            owner_id: self.owner.id().clone(),
            message_id: self.message.id().clone(),
            recipient_ids,
            scheduled_at: None,
            now: self.clock_now(),
        });
        self.mailings.insert(&mailing).await.unwrap();
        mailing
    }

    /// メール配信を launched に遷移させる
    pub async fn launch(&self, mailing: &Mailing) {
        assert!(
            self.mailings
                .try_claim(mailing.id(), self.clock_now())
                .await
                .unwrap()
        );
    }

    /// 指定したアドレスの受信者に成功の試行を記録する
    pub async fn record_success(&self, mailing: &Mailing, email: &str) {
        let launched = self.mailings.get(mailing.id()).unwrap();
        let recipients = self.mailings.find_recipients(mailing.id()).await.unwrap();
        let recipient = recipients
            .iter()
            .find(|r| r.email().as_str() == email)
            .unwrap();
        let attempt = Attempt::success(&launched, recipient, self.clock_now());
        assert!(self.attempts.record(&attempt).await.unwrap());
    }

    /// 共有のモックから HTTP ハンドラ用の状態を作成する
    pub fn app_state(&self) -> AppState {
        AppState {
            mailing:   self.mailing_usecase.clone(),
            user:      self.user_usecase.clone(),
            dashboard: self.dashboard.clone(),
        }
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

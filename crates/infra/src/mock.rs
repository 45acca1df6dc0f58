//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのリポジトリとメール送信の実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! mailflow-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 書き込みは即座に反映される。トランザクションのロールバックは再現しない。

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::{
    DomainError,
    attempt::Attempt,
    mail::{EmailMessage, MailTransportError},
    mailing::{Mailing, MailingId, MailingStatus},
    message::{Message, MessageId},
    recipient::{Recipient, RecipientId},
    user::{User, UserId},
};

use crate::{
    db::{TransactionManager, TxContext},
    error::InfraError,
    mail::MailTransport,
    repository::{
        AttemptRepository,
        MailingRepository,
        MailingStats,
        MessageRepository,
        RecipientRepository,
        StatsRepository,
        UserRepository,
    },
};

// ===== MockTransactionManager =====

#[derive(Clone, Default)]
pub struct MockTransactionManager;

#[async_trait]
impl TransactionManager for MockTransactionManager {
    async fn begin(&self) -> Result<TxContext, InfraError> {
        Ok(TxContext::mock())
    }
}

// ===== MockUserRepository =====

#[derive(Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn insert(&self, user: &User) -> Result<(), InfraError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email() == user.email()) {
            return Err(InfraError::conflict("User", user.email().as_str()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id() == id)
            .cloned())
    }

    async fn update_blocked(&self, id: &UserId, is_blocked: bool) -> Result<(), InfraError> {
        let mut users = self.users.lock().unwrap();
        if let Some(pos) = users.iter().position(|u| u.id() == id) {
            let u = &users[pos];
            users[pos] = User::from_db(
                u.id().clone(),
                u.email().clone(),
                u.role(),
                is_blocked,
                u.created_at(),
            );
        }
        Ok(())
    }
}

// ===== MockRecipientRepository =====

#[derive(Clone, Default)]
pub struct MockRecipientRepository {
    recipients: Arc<Mutex<Vec<Recipient>>>,
}

impl MockRecipientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipientRepository for MockRecipientRepository {
    async fn insert(&self, recipient: &Recipient) -> Result<(), InfraError> {
        let mut recipients = self.recipients.lock().unwrap();
        if recipients
            .iter()
            .any(|r| r.owner_id() == recipient.owner_id() && r.email() == recipient.email())
        {
            return Err(InfraError::conflict("Recipient", recipient.email().as_str()));
        }
        recipients.push(recipient.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &RecipientId) -> Result<Option<Recipient>, InfraError> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id)
            .cloned())
    }

    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<Recipient>, InfraError> {
        let mut found: Vec<Recipient> = self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id() == owner_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.email().as_str().cmp(b.email().as_str()));
        Ok(found)
    }

    async fn delete(&self, id: &RecipientId) -> Result<(), InfraError> {
        self.recipients.lock().unwrap().retain(|r| r.id() != id);
        Ok(())
    }
}

// ===== MockMessageRepository =====

#[derive(Clone, Default)]
pub struct MockMessageRepository {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl MockMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MockMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), InfraError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, InfraError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id() == id)
            .cloned())
    }
}

// ===== MockMailingRepository =====

/// インメモリのメール配信リポジトリ
///
/// 受信者の解決には共有の [`MockRecipientRepository`] を使う。
#[derive(Clone, Default)]
pub struct MockMailingRepository {
    mailings:      Arc<Mutex<Vec<Mailing>>>,
    recipients:    MockRecipientRepository,
    fail_complete: Arc<AtomicBool>,
    claim_calls:   Arc<AtomicUsize>,
}

impl MockMailingRepository {
    pub fn new(recipients: MockRecipientRepository) -> Self {
        Self {
            recipients,
            ..Default::default()
        }
    }

    /// 以降の `try_complete` をエラーにする
    pub fn fail_on_complete(&self) {
        self.fail_complete.store(true, Ordering::SeqCst);
    }

    /// `try_claim` が呼ばれた回数
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    /// 保存されているメール配信を取得する（テストの検証用）
    pub fn get(&self, id: &MailingId) -> Option<Mailing> {
        self.mailings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// ステータスが一致する場合のみ、ドメインの遷移メソッドで遷移させる
    fn transition(
        &self,
        id: &MailingId,
        from: MailingStatus,
        update: impl FnOnce(Mailing) -> Result<Mailing, DomainError>,
    ) -> Result<bool, InfraError> {
        let mut mailings = self.mailings.lock().unwrap();
        let Some(pos) = mailings
            .iter()
            .position(|m| m.id() == id && m.status() == from)
        else {
            return Ok(false);
        };
        mailings[pos] = update(mailings[pos].clone())?;
        Ok(true)
    }

    fn complete(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        self.transition(id, MailingStatus::Launched, |m| m.accomplished(now))
    }
}

#[async_trait]
impl MailingRepository for MockMailingRepository {
    async fn insert(&self, mailing: &Mailing) -> Result<(), InfraError> {
        self.mailings.lock().unwrap().push(mailing.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &MailingId) -> Result<Option<Mailing>, InfraError> {
        Ok(self.get(id))
    }

    async fn find_status(&self, id: &MailingId) -> Result<Option<MailingStatus>, InfraError> {
        Ok(self.get(id).map(|m| m.status()))
    }

    async fn find_recipients(&self, id: &MailingId) -> Result<Vec<Recipient>, InfraError> {
        let Some(mailing) = self.get(id) else {
            return Ok(Vec::new());
        };
        let mut recipients = Vec::new();
        for recipient_id in mailing.recipient_ids() {
            if let Some(r) = self.recipients.find_by_id(recipient_id).await? {
                recipients.push(r);
            }
        }
        Ok(recipients)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Mailing>, InfraError> {
        Ok(self
            .mailings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.is_due(now))
            .cloned()
            .collect())
    }

    async fn find_launched_by_owner(
        &self,
        owner_id: &UserId,
    ) -> Result<Vec<Mailing>, InfraError> {
        Ok(self
            .mailings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.owner_id() == owner_id && m.status() == MailingStatus::Launched)
            .cloned()
            .collect())
    }

    async fn try_claim(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.transition(id, MailingStatus::Created, |m| m.launched(now))
    }

    async fn try_complete(&self, id: &MailingId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(InfraError::unexpected("complete failed"));
        }
        self.complete(id, now)
    }

    async fn try_complete_in_tx(
        &self,
        _tx: &mut TxContext,
        id: &MailingId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        self.complete(id, now)
    }

    async fn try_schedule(&self, id: &MailingId, at: DateTime<Utc>) -> Result<bool, InfraError> {
        self.transition(id, MailingStatus::Created, |m| m.scheduled(at))
    }
}

// ===== MockAttemptRepository =====

#[derive(Clone, Default)]
pub struct MockAttemptRepository {
    attempts:    Arc<Mutex<Vec<Attempt>>>,
    fail_record: Arc<AtomicBool>,
}

impl MockAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降のトランザクション外の `record` をエラーにする
    pub fn fail_on_record(&self) {
        self.fail_record.store(true, Ordering::SeqCst);
    }

    /// 記録済みの全試行を取得する（テストの検証用）
    pub fn all(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    fn insert_if_absent(&self, attempt: &Attempt) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        let exists = attempt.recipient_id().is_some()
            && attempts.iter().any(|a| {
                a.mailing_id() == attempt.mailing_id() && a.recipient_id() == attempt.recipient_id()
            });
        if exists {
            return false;
        }
        attempts.push(attempt.clone());
        true
    }
}

#[async_trait]
impl AttemptRepository for MockAttemptRepository {
    async fn record(&self, attempt: &Attempt) -> Result<bool, InfraError> {
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(InfraError::unexpected("record failed"));
        }
        Ok(self.insert_if_absent(attempt))
    }

    async fn record_in_tx(
        &self,
        _tx: &mut TxContext,
        attempt: &Attempt,
    ) -> Result<bool, InfraError> {
        Ok(self.insert_if_absent(attempt))
    }

    async fn find_attempted_recipient_ids_in_tx(
        &self,
        _tx: &mut TxContext,
        mailing_id: &MailingId,
    ) -> Result<HashSet<RecipientId>, InfraError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.mailing_id() == mailing_id)
            .filter_map(|a| a.recipient_id().cloned())
            .collect())
    }

    async fn find_by_mailing(&self, mailing_id: &MailingId) -> Result<Vec<Attempt>, InfraError> {
        let mut found: Vec<Attempt> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.mailing_id() == mailing_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.attempted_at());
        Ok(found)
    }
}

// ===== MockStatsRepository =====

#[derive(Clone, Default)]
pub struct MockStatsRepository {
    stats: Arc<Mutex<HashMap<UserId, MailingStats>>>,
}

impl MockStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&self, owner_id: UserId, stats: MailingStats) {
        self.stats.lock().unwrap().insert(owner_id, stats);
    }
}

#[async_trait]
impl StatsRepository for MockStatsRepository {
    async fn mailing_stats(&self, owner_id: &UserId) -> Result<MailingStats, InfraError> {
        Ok(self
            .stats
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ===== MockMailTransport =====

/// インメモリのメール送信
///
/// 宛先ごとの失敗注入、送信遅延、同時送信数の計測ができる。
#[derive(Clone, Default)]
pub struct MockMailTransport {
    sent:          Arc<Mutex<Vec<EmailMessage>>>,
    failures:      Arc<Mutex<HashMap<String, MailTransportError>>>,
    delay:         Option<Duration>,
    in_flight:     Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各送信に遅延を入れる
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 指定した宛先への送信を失敗させる
    pub fn fail_for(&self, to: &str, error: MailTransportError) {
        self.failures.lock().unwrap().insert(to.to_string(), error);
    }

    /// 送信（試行）されたメールを取得する
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// 観測された最大同時送信数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailTransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(email.clone());

        match self.failures.lock().unwrap().get(&email.to) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

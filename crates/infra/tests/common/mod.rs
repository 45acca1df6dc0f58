//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するエンティティ生成ヘルパー。
//! Rust の統合テスト規約に従い `tests/common/mod.rs` に配置。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use mailflow_domain::{
    mailing::{Mailing, MailingId, NewMailing},
    message::{Message, MessageId},
    recipient::{NewRecipient, Recipient, RecipientId},
    user::{Email, User, UserId, UserRole},
    value_objects::{MessageSubject, RecipientName},
};
use mailflow_infra::repository::{
    MailingRepository,
    MessageRepository,
    PostgresMailingRepository,
    PostgresMessageRepository,
    PostgresRecipientRepository,
    PostgresUserRepository,
    RecipientRepository,
    UserRepository,
};
use sqlx::PgPool;

/// テスト用の固定日時
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// ユーザーを作成して保存する
pub async fn insert_user(pool: &PgPool, email: &str, role: UserRole) -> User {
    let user = User::new(UserId::new(), Email::new(email).unwrap(), role, test_now());
    PostgresUserRepository::new(pool.clone())
        .insert(&user)
        .await
        .unwrap();
    user
}

/// 受信者を作成して保存する
pub async fn insert_recipient(pool: &PgPool, owner_id: &UserId, email: &str) -> Recipient {
    let recipient = Recipient::new(NewRecipient {
        id:        RecipientId::new(),
        owner_id:  owner_id.clone(),
        email:     Email::new(email).unwrap(),
        full_name: Some(RecipientName::new("山田 太郎").unwrap()),
        comment:   None,
        now:       test_now(),
    });
    PostgresRecipientRepository::new(pool.clone())
        .insert(&recipient)
        .await
        .unwrap();
    recipient
}

/// メッセージを作成して保存する
pub async fn insert_message(pool: &PgPool, owner_id: &UserId) -> Message {
    let message = Message::new(
        MessageId::new(),
        owner_id.clone(),
        MessageSubject::new("お知らせ").unwrap(),
        "本文です".to_string(),
        test_now(),
    )
    .unwrap();
    PostgresMessageRepository::new(pool.clone())
        .insert(&message)
        .await
        .unwrap();
    message
}

/// メール配信を作成して保存する
pub async fn insert_mailing(
    pool: &PgPool,
    owner_id: &UserId,
    message_id: &MessageId,
    recipients: &[&Recipient],
    scheduled_at: Option<DateTime<Utc>>,
) -> Mailing {
    let mailing = Mailing::new(NewMailing {
        id: MailingId::new(),
        owner_id: owner_id.clone(),
        message_id: message_id.clone(),
        recipient_ids: recipients.iter().map(|r| r.id().clone()).collect(),
        scheduled_at,
        now: test_now(),
    });
    PostgresMailingRepository::new(pool.clone())
        .insert(&mailing)
        .await
        .unwrap();
    mailing
}

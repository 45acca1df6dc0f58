//! # 配信試行（Attempt）
//!
//! 1 通のメール送信結果を表す不変の監査記録。作成後に更新・削除されることはない。
//!
//! 受信者のメールアドレスと氏名は作成時点のスナップショットとして保持する。
//! 受信者が後から削除されても履歴を解決できるよう、`recipient_id` は
//! 削除後に `None` となり得る。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    mailing::{Mailing, MailingId},
    recipient::{Recipient, RecipientId},
    user::{Email, UserId},
    value_objects::RecipientName,
};

/// 送信成功時に記録するサーバー応答
pub const SUCCESS_RESPONSE: &str = "OK";

define_uuid_id! {
    /// 配信試行 ID
    pub struct AttemptId;
}

/// 配信試行ステータス
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// 配信試行エンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id:                  AttemptId,
    mailing_id:          MailingId,
    recipient_id:        Option<RecipientId>,
    recipient_email:     Email,
    recipient_full_name: Option<RecipientName>,
    status:              AttemptStatus,
    server_response:     String,
    owner_id:            UserId,
    attempted_at:        DateTime<Utc>,
}

/// 配信試行の DB 復元パラメータ
pub struct AttemptRecord {
    pub id:                  AttemptId,
    pub mailing_id:          MailingId,
    pub recipient_id:        Option<RecipientId>,
    pub recipient_email:     Email,
    pub recipient_full_name: Option<RecipientName>,
    pub status:              AttemptStatus,
    pub server_response:     String,
    pub owner_id:            UserId,
    pub attempted_at:        DateTime<Utc>,
}

impl Attempt {
    /// 送信成功の試行を作成する
    ///
    /// サーバー応答は [`SUCCESS_RESPONSE`]、所有者はメール配信の所有者となる。
    pub fn success(mailing: &Mailing, recipient: &Recipient, now: DateTime<Utc>) -> Self {
        Self::record(
            mailing,
            recipient,
            AttemptStatus::Success,
            SUCCESS_RESPONSE.to_string(),
            now,
        )
    }

    /// 送信失敗の試行を作成する
    ///
    /// `diagnostic` には送信エラーの内容、または停止理由を渡す。
    pub fn failed(
        mailing: &Mailing,
        recipient: &Recipient,
        diagnostic: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::record(
            mailing,
            recipient,
            AttemptStatus::Failed,
            diagnostic.into(),
            now,
        )
    }

    fn record(
        mailing: &Mailing,
        recipient: &Recipient,
        status: AttemptStatus,
        server_response: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttemptId::new(),
            mailing_id: mailing.id().clone(),
            recipient_id: Some(recipient.id().clone()),
            recipient_email: recipient.email().clone(),
            recipient_full_name: recipient.full_name().cloned(),
            status,
            server_response,
            owner_id: mailing.owner_id().clone(),
            attempted_at: now,
        }
    }

    /// 既存のデータから復元する
    pub fn from_db(record: AttemptRecord) -> Self {
        Self {
            id:                  record.id,
            mailing_id:          record.mailing_id,
            recipient_id:        record.recipient_id,
            recipient_email:     record.recipient_email,
            recipient_full_name: record.recipient_full_name,
            status:              record.status,
            server_response:     record.server_response,
            owner_id:            record.owner_id,
            attempted_at:        record.attempted_at,
        }
    }

    pub fn id(&self) -> &AttemptId {
        &self.id
    }

    pub fn mailing_id(&self) -> &MailingId {
        &self.mailing_id
    }

    pub fn recipient_id(&self) -> Option<&RecipientId> {
        self.recipient_id.as_ref()
    }

    pub fn recipient_email(&self) -> &Email {
        &self.recipient_email
    }

    pub fn recipient_full_name(&self) -> Option<&RecipientName> {
        self.recipient_full_name.as_ref()
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn server_response(&self) -> &str {
        &self.server_response
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn attempted_at(&self) -> DateTime<Utc> {
        self.attempted_at
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }
}

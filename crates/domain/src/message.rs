//! # メッセージ
//!
//! 件名と本文からなる配信内容。複数のメール配信から再利用される。

use chrono::{DateTime, Utc};

use crate::{DomainError, user::UserId, value_objects::MessageSubject};

define_uuid_id! {
    /// メッセージ ID
    pub struct MessageId;
}

/// メッセージエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id:         MessageId,
    owner_id:   UserId,
    subject:    MessageSubject,
    body:       String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// 新しいメッセージを作成する
    ///
    /// 本文が空（空白のみを含む）の場合は `DomainError::Validation` を返す。
    pub fn new(
        id: MessageId,
        owner_id: UserId,
        subject: MessageSubject,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(DomainError::Validation("本文は必須です".to_string()));
        }
        Ok(Self {
            id,
            owner_id,
            subject,
            body,
            created_at: now,
        })
    }

    /// 既存のデータから復元する
    pub fn from_db(
        id: MessageId,
        owner_id: UserId,
        subject: MessageSubject,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            subject,
            body,
            created_at,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn subject(&self) -> &MessageSubject {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//! # 受信者
//!
//! メール配信の宛先。所有者ごとにメールアドレスが一意になる。
//! 異なる所有者が同じアドレスを別々の受信者として登録することは許容される。

use chrono::{DateTime, Utc};

use crate::{
    user::{Email, UserId},
    value_objects::RecipientName,
};

define_uuid_id! {
    /// 受信者 ID
    pub struct RecipientId;
}

/// 受信者エンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    id:         RecipientId,
    owner_id:   UserId,
    email:      Email,
    full_name:  Option<RecipientName>,
    comment:    Option<String>,
    created_at: DateTime<Utc>,
}

/// 受信者の新規作成パラメータ
pub struct NewRecipient {
    pub id:        RecipientId,
    pub owner_id:  UserId,
    pub email:     Email,
    pub full_name: Option<RecipientName>,
    pub comment:   Option<String>,
    pub now:       DateTime<Utc>,
}

/// 受信者の DB 復元パラメータ
pub struct RecipientRecord {
    pub id:         RecipientId,
    pub owner_id:   UserId,
    pub email:      Email,
    pub full_name:  Option<RecipientName>,
    pub comment:    Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    pub fn new(params: NewRecipient) -> Self {
        Self {
            id:         params.id,
            owner_id:   params.owner_id,
            email:      params.email,
            full_name:  params.full_name,
            comment:    params.comment.filter(|c| !c.trim().is_empty()),
            created_at: params.now,
        }
    }

    pub fn from_db(record: RecipientRecord) -> Self {
        Self {
            id:         record.id,
            owner_id:   record.owner_id,
            email:      record.email,
            full_name:  record.full_name,
            comment:    record.comment,
            created_at: record.created_at,
        }
    }

    pub fn id(&self) -> &RecipientId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn full_name(&self) -> Option<&RecipientName> {
        self.full_name.as_ref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

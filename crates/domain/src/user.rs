//! # ユーザー
//!
//! メール配信リソースの所有者となるユーザーと、そのロールを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`User`] | ユーザー | 受信者・メッセージ・メール配信の所有者 |
//! | [`UserRole`] | ロール | 一般ユーザーとサービスマネージャー |
//!
//! サービスマネージャーは全所有者のデータを閲覧でき、ユーザーをブロックできる。
//! 他ユーザーのエンティティを変更することはできない（停止を除く）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

define_uuid_id! {
    /// ユーザー ID（一意識別子）
    pub struct UserId;
}

/// メールアドレス（値オブジェクト）
///
/// `local@domain` の形式を要求する。ドメイン部にはドットが必要。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 前後の空白を除去した上で空文字列ではない
    /// - `@` がちょうど 1 つ含まれ、前後が空でない
    /// - ドメイン部に `.` を含み、先頭・末尾が `.` ではない
    /// - 空白を含まない
    /// - 最大 254 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(invalid_email());
        };

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || value.chars().any(char::is_whitespace)
        {
            return Err(invalid_email());
        }

        if value.len() > 254 {
            return Err(DomainError::Validation(
                "メールアドレスは254文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有権を持つ文字列に変換する
    pub fn into_string(self) -> String {
        self.0
    }
}

fn invalid_email() -> DomainError {
    DomainError::Validation("メールアドレスの形式が不正です".to_string())
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーロール
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    /// 一般ユーザー（自分のリソースのみ操作可能）
    Member,
    /// サービスマネージャー（全所有者の閲覧、ユーザーのブロック）
    ServiceManager,
}

/// ユーザーエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id:         UserId,
    email:      Email,
    role:       UserRole,
    is_blocked: bool,
    created_at: DateTime<Utc>,
}

impl User {
    /// 新しいユーザーを作成する
    pub fn new(id: UserId, email: Email, role: UserRole, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            role,
            is_blocked: false,
            created_at: now,
        }
    }

    /// 既存のデータから復元する
    pub fn from_db(
        id: UserId,
        email: Email,
        role: UserRole,
        is_blocked: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            role,
            is_blocked,
            created_at,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// サービスマネージャーかどうか
    pub fn is_service_manager(&self) -> bool {
        self.role == UserRole::ServiceManager
    }

    /// 指定した所有者のリソースを閲覧できるか
    pub fn can_view_owned_by(&self, owner_id: &UserId) -> bool {
        self.id == *owner_id || self.is_service_manager()
    }

    /// ブロック状態に遷移する
    ///
    /// サービスマネージャー自身はブロックできない。
    /// 既にブロック済みの場合はそのまま返す。
    pub fn blocked(self) -> Result<Self, DomainError> {
        if self.is_service_manager() {
            return Err(DomainError::Forbidden(
                "サービスマネージャーはブロックできません".to_string(),
            ));
        }
        Ok(Self {
            is_blocked: true,
            ..self
        })
    }

    /// ブロックを解除する
    ///
    /// 停止済みのメール配信は再開しない。
    pub fn unblocked(self) -> Self {
        Self {
            is_blocked: false,
            ..self
        }
    }
}

//! # Mailflow ドメイン層
//!
//! メール配信（Mailing）のビジネスルールを担うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **エンティティ**: 受信者、メッセージ、メール配信、配信試行
//! - **値オブジェクト**: ID、メールアドレス、件名などの検証済みの値
//! - **ステートマシン**: メール配信のステータス遷移を ADT で表現する
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! mailing-service → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、SMTP）には一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`mailing`] - メール配信とそのステータス遷移
//! - [`attempt`] - 受信者ごとの配信試行記録（不変）
//! - [`recipient`] / [`message`] - 配信対象と配信内容
//! - [`user`] - 所有者とロール
//! - [`mail`] - メール送信の入出力型
//!
//! ## 使用例
//!
//! ```rust
//! use mailflow_domain::{DomainError, mailing::MailingId};
//!
//! let mailing_id = MailingId::new();
//!
//! let error = DomainError::NotFound {
//!     entity_type: "Mailing",
//!     id:          mailing_id.to_string(),
//! };
//! assert!(error.to_string().contains("Mailing"));
//! ```

#[macro_use]
mod macros;

pub mod attempt;
pub mod clock;
pub mod error;
pub mod mail;
pub mod mailing;
pub mod message;
pub mod recipient;
pub mod user;
pub mod value_objects;

pub use error::DomainError;

//! # メール送信基盤
//!
//! 受信者 1 人あたり 1 回呼ばれるメール送信を抽象化する。
//!
//! - **SMTP**: lettre の `AsyncSmtpTransport` で送信する。タイムアウト付き
//! - **Noop**: 送信せずログ出力のみ行う（開発・テスト用）
//!
//! 実装は環境変数 `MAIL_BACKEND` で切り替える。

mod noop;
mod smtp;

use async_trait::async_trait;
use mailflow_domain::mail::{EmailMessage, MailTransportError};
pub use noop::NoopMailTransport;
pub use smtp::SmtpMailTransport;

/// メール送信トレイト
///
/// 送信は同期的な 1 通単位の操作で、成功するかエラー文字列付きで失敗する。
/// 失敗は呼び出し側で受信者単位の試行記録として扱われる。
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// メールを 1 通送信する
    async fn send(&self, email: &EmailMessage) -> Result<(), MailTransportError>;
}

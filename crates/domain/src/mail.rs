//! # メール送信
//!
//! メール送信基盤（SMTP など）に渡す入力と、その失敗を表す型を定義する。
//! 送信そのものはインフラ層の `MailTransport` が担う。

use thiserror::Error;

use crate::{message::Message, user::Email};

/// 送信するメール 1 通分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信元アドレス
    pub from:    String,
    /// 送信先アドレス
    pub to:      String,
    /// 件名
    pub subject: String,
    /// プレーンテキスト本文
    pub body:    String,
}

impl EmailMessage {
    /// メッセージと宛先からメールを組み立てる
    pub fn compose(message: &Message, from: &str, to: &Email) -> Self {
        Self {
            from:    from.to_string(),
            to:      to.as_str().to_string(),
            subject: message.subject().as_str().to_string(),
            body:    message.body().to_string(),
        }
    }
}

/// メール送信エラー
///
/// 受信者単位で記録される想定内の失敗。`Display` の文字列が
/// 配信試行の診断メッセージとしてそのまま保存される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailTransportError {
    /// 送信元・送信先アドレスやメール本体の組み立てに失敗
    #[error("{0}")]
    InvalidMessage(String),

    /// SMTP サーバーが送信を拒否した、または接続に失敗した
    #[error("{0}")]
    SendFailed(String),

    /// タイムアウト
    #[error("SMTP timeout")]
    Timeout,
}

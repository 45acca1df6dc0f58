//! SMTP メール送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 1 台の到達不能なサーバーで配信全体が止まらないよう、
//! 接続とコマンドに加えて送信全体にもタイムアウトを設ける。

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Message, header::ContentType},
};
use mailflow_domain::mail::{EmailMessage, MailTransportError};

use super::MailTransport;

/// SMTP メール送信
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout:   Duration,
}

impl SmtpMailTransport {
    /// 新しい SMTP 送信インスタンスを作成
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    /// - `timeout`: 1 通あたりの送信タイムアウト
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout))
            .build();

        Self { transport, timeout }
    }
}

fn build_message(email: &EmailMessage) -> Result<Message, MailTransportError> {
    Message::builder()
        .from(
            email.from.parse().map_err(|e| {
                MailTransportError::InvalidMessage(format!("送信元アドレス不正: {e}"))
            })?,
        )
        .to(email
            .to
            .parse()
            .map_err(|e| MailTransportError::InvalidMessage(format!("宛先アドレス不正: {e}")))?)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| MailTransportError::InvalidMessage(format!("メッセージ構築失敗: {e}")))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailTransportError> {
        let message = build_message(email)?;

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(_response)) => Ok(()),
            Ok(Err(e)) if e.is_timeout() => Err(MailTransportError::Timeout),
            Ok(Err(e)) => Err(MailTransportError::SendFailed(e.to_string())),
            Err(_elapsed) => Err(MailTransportError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn email(to: &str) -> EmailMessage {
        EmailMessage {
            from:    "noreply@mailflow.example".to_string(),
            to:      to.to_string(),
            subject: "件名".to_string(),
            body:    "本文".to_string(),
        }
    }

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmtpMailTransport>();
    }

    #[test]
    fn test_宛先アドレスが不正な場合はメッセージ構築エラーになる() {
        let result = build_message(&email("not an address"));

        assert!(matches!(result, Err(MailTransportError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn test_接続できないサーバーへの送信はエラーとして返る() {
        // 127.0.0.1:1 は接続拒否される
        let transport = SmtpMailTransport::new("127.0.0.1", 1, Duration::from_secs(2));

        let result = transport.send(&email("a@x.io")).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_タイムアウトの診断メッセージは固定文言になる() {
        assert_eq!(MailTransportError::Timeout.to_string(), "SMTP timeout");
    }
}

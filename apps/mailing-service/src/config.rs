//! # Mailing Service 設定
//!
//! 環境変数から HTTP サーバー、メール送信、スケジューラの設定を読み込む。
//! CLI（`send-mailing`）も同じ設定を使う。

use std::{env, str::FromStr, time::Duration};

use anyhow::Context as _;

/// Mailing Service の設定
#[derive(Debug, Clone)]
pub struct MailingServiceConfig {
    /// バインドアドレス
    pub host:                     String,
    /// ポート番号
    pub port:                     u16,
    /// データベース接続 URL
    pub database_url:             String,
    /// データベース接続プールの最大接続数
    pub database_max_connections: u32,
    /// 1 回の配信で同時に送信する最大数
    pub dispatch_concurrency:     usize,
    /// メール送信設定
    pub mail:                     MailConfig,
    /// スケジューラ設定
    pub scheduler:                SchedulerConfig,
}

/// メール送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MailBackend {
    /// SMTP サーバー経由で送信
    Smtp,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// メール送信の設定
///
/// `MAIL_BACKEND` 環境変数で送信バックエンドを切り替える。
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend:      MailBackend,
    pub smtp_host:    String,
    pub smtp_port:    u16,
    /// SMTP 送信 1 回あたりのタイムアウト
    pub smtp_timeout: Duration,
    /// 送信元メールアドレス
    pub from_address: String,
}

/// スケジューラの設定
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// false の場合、サーバー起動時にスケジューラを開始しない
    pub enabled:  bool,
    /// 予定日時到来の確認間隔
    pub interval: Duration,
}

impl MailingServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            host: lookup("MAILING_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "MAILING_PORT", 13002)?,
            database_url: lookup("DATABASE_URL").context("DATABASE_URL が設定されていません")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            dispatch_concurrency: parse_or(&lookup, "DISPATCH_CONCURRENCY", 4_usize)?.max(1),
            mail: MailConfig::from_lookup(&lookup)?,
            scheduler: SchedulerConfig::from_lookup(&lookup)?,
        })
    }
}

impl MailConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            backend:      parse_or(lookup, "MAIL_BACKEND", MailBackend::Noop)?,
            smtp_host:    lookup("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
            smtp_port:    parse_or(lookup, "SMTP_PORT", 1025)?,
            smtp_timeout: Duration::from_secs(parse_or(lookup, "SMTP_TIMEOUT_SECS", 10)?),
            from_address: lookup("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|| "noreply@mailflow.example.com".to_string()),
        })
    }
}

impl SchedulerConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            enabled:  parse_or(lookup, "SCHEDULER_ENABLED", true)?,
            interval: Duration::from_secs(parse_or(lookup, "SCHEDULER_INTERVAL_SECS", 60)?),
        })
    }
}

/// 値があればパースし、なければデフォルト値を返す
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} の値が不正です（{raw}）: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_未設定の項目はデフォルト値になる() {
        let config =
            MailingServiceConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db")]))
                .unwrap();

        assert_eq!(config.port, 13002);
        assert_eq!(config.dispatch_concurrency, 4);
        assert_eq!(config.mail.backend, MailBackend::Noop);
        assert_eq!(config.mail.smtp_timeout, Duration::from_secs(10));
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_環境変数の値で上書きできる() {
        let config = MailingServiceConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("MAIL_BACKEND", "smtp"),
            ("SMTP_PORT", "2525"),
            ("DISPATCH_CONCURRENCY", "8"),
            ("SCHEDULER_ENABLED", "false"),
            ("SCHEDULER_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.mail.backend, MailBackend::Smtp);
        assert_eq!(config.mail.smtp_port, 2525);
        assert_eq!(config.dispatch_concurrency, 8);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_並列数0は1に切り上げる() {
        let config = MailingServiceConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("DISPATCH_CONCURRENCY", "0"),
        ]))
        .unwrap();

        assert_eq!(config.dispatch_concurrency, 1);
    }

    #[test]
    fn test_database_urlがないとエラーになる() {
        let result = MailingServiceConfig::from_lookup(lookup_from(&[]));

        assert!(result.is_err());
    }

    #[test]
    fn test_不正なバックエンドはエラーになる() {
        let result = MailingServiceConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("MAIL_BACKEND", "ses"),
        ]));

        assert!(result.is_err());
    }
}

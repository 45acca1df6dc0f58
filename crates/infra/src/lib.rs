//! # Mailflow インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **リポジトリ実装**: 受信者、メッセージ、メール配信、配信試行、ユーザーの永続化
//! - **メール送信**: SMTP（lettre）とログ出力のみの Noop 実装
//!
//! ## 依存関係
//!
//! ```text
//! mailing-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`mail`] - メール送信
//! - [`repository`] - リポジトリ実装
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use mailflow_infra::{db, repository::PostgresMailingRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/mailflow", 10).await?;
//!     db::run_migrations(&pool).await?;
//!     let mailings = PostgresMailingRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod mail;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use db::{PgTransactionManager, TransactionManager, TxContext};
pub use error::{InfraError, InfraErrorKind};
pub use mail::{MailTransport, NoopMailTransport, SmtpMailTransport};

//! # リポジトリ実装
//!
//! 永続化のトレイトと PostgreSQL 実装を提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: ユースケース層はトレイト（`Arc<dyn ...>`）にのみ依存する
//! - **条件付き更新**: 状態遷移は期待する現在ステータスを WHERE 句に含め、影響行数で成否を返す
//! - **テスタビリティ**: `test-utils` feature でインメモリ実装を提供する（[`crate::mock`]）

pub mod attempt_repository;
pub mod mailing_repository;
pub mod message_repository;
pub mod recipient_repository;
pub mod stats_repository;
pub mod user_repository;

pub use attempt_repository::{AttemptRepository, PostgresAttemptRepository};
pub use mailing_repository::{MailingRepository, PostgresMailingRepository};
pub use message_repository::{MessageRepository, PostgresMessageRepository};
pub use recipient_repository::{PostgresRecipientRepository, RecipientRepository};
pub use stats_repository::{MailingStats, PostgresStatsRepository, StatsRepository};
pub use user_repository::{PostgresUserRepository, UserRepository};

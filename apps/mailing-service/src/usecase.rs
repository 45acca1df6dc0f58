//! # ユースケース層
//!
//! Mailing Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリとメール送信を `Arc<dyn Trait>` で外部から注入
//! - **エンジンと権限の分離**: 配信エンジンと停止エンジンは権限を確認しない。
//!   HTTP から呼ばれる操作は [`mailing`] と [`user`] で権限を確認してから委譲する
//!
//! ## モジュール構成
//!
//! - `dispatch`: 配信エンジン（配信権の獲得、受信者ごとの送信と記録、完了）
//! - `stop`: 停止エンジン（完了への遷移と未送信受信者の失敗記録）
//! - `schedule`: 配信予定日時の設定
//! - `dashboard`: 所有者ごとの統計
//! - `mailing` / `user`: HTTP 向けの権限付き操作

pub(crate) mod helpers;

pub mod dashboard;
pub mod dispatch;
pub mod mailing;
pub mod schedule;
pub mod stop;
pub mod user;

pub use dashboard::{DashboardStats, DashboardUseCaseImpl};
pub use dispatch::{DispatchOutcome, DispatchResult, DispatchUseCaseImpl};
pub use mailing::MailingUseCaseImpl;
pub use schedule::ScheduleUseCaseImpl;
pub use stop::{MANUAL_STOP_REASON, StopOutcome, StopUseCaseImpl, USER_BLOCKED_STOP_REASON};
pub use user::{BlockUserResult, UnblockUserResult, UserUseCaseImpl};

//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、権限チェックとビジネスロジックはユースケースに委譲

pub mod dashboard;
pub mod health;
pub mod mailing;
pub mod user;

pub use dashboard::{DashboardState, get_dashboard_stats};
pub use health::{ReadinessState, health_check, readiness_check};
pub use mailing::{MailingState, list_attempts, schedule_mailing, send_mailing, stop_mailing};
pub use user::{UserState, block_user, unblock_user};

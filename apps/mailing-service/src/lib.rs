//! # Mailing Service ライブラリ
//!
//! メール配信の配信エンジン、停止エンジン、スケジューラ、HTTP ハンドラを公開する。
//! サーバー（`mailing-service`）と CLI（`send-mailing`）の両方から使う。

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod scheduler;
pub mod usecase;

// テストユーティリティ（内部実装、ドキュメントからは隠す）
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

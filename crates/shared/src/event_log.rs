//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` に `error.category` + `error.kind` フィールドを直接追加する。
//! 定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用する。JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` を付与し、`tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: [`event::category`] の定数
/// - `event.action`: [`event::action`] の定数
/// - `event.entity_type` / `event.entity_id`: 対象エンティティ
/// - `event.result`: [`event::result`] の定数
///
/// ```
/// use mailflow_shared::{event_log::event, log_business_event};
///
/// log_business_event!(
///     event.category = event::category::MAILING,
///     event.action = event::action::MAILING_CLAIMED,
///     event.entity_type = event::entity_type::MAILING,
///     event.entity_id = "0190a000-0000-7000-8000-000000000000",
///     event.result = event::result::SUCCESS,
///     "配信権を獲得"
/// );
/// ```
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const MAILING: &str = "mailing";
        pub const USER: &str = "user";
    }

    /// イベントアクション
    pub mod action {
        // メール配信
        pub const MAILING_CLAIMED: &str = "mailing.claimed";
        pub const MAILING_COMPLETED: &str = "mailing.completed";
        pub const MAILING_STOPPED: &str = "mailing.stopped";
        pub const MAILING_SCHEDULED: &str = "mailing.scheduled";

        // ユーザー
        pub const USER_BLOCKED: &str = "user.blocked";
        pub const USER_UNBLOCKED: &str = "user.unblocked";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const MAILING: &str = "mailing";
        pub const USER: &str = "user";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（SMTP サーバー）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const MAIL_TRANSPORT: &str = "mail_transport";
        pub const INTERNAL: &str = "internal";
    }
}

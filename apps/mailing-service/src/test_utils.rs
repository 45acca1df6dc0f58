//! テストユーティリティ
//!
//! ユースケースとハンドラのテストで共有するセットアップを提供する。

mod mailing_test_builder;

pub use mailing_test_builder::{MailingTestBuilder, MailingTestSetup};

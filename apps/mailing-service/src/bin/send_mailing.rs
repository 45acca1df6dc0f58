//! # send-mailing
//!
//! メール配信を ID 指定で即時に配信するオペレーター向け CLI。
//! HTTP の送信と同じ配信エンジンを使うため、スケジューラや HTTP と同時に
//! 実行しても受信者ごとの送信は一回だけになる。
//!
//! ## 使用方法
//!
//! ```bash
//! DATABASE_URL=postgres://... send-mailing 0190a000-0000-7000-8000-000000000000
//! ```
//!
//! 存在しない ID の場合は標準エラーに出力し、終了コード 1 で終了する。

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailflow_domain::mailing::MailingId;
use mailflow_infra::{
    db,
    repository::{MailingRepository, PostgresMailingRepository},
};
use mailflow_mailing_service::{
    app_builder::build_services,
    config::MailingServiceConfig,
    usecase::{DispatchOutcome, DispatchResult, DispatchUseCaseImpl},
};
use mailflow_shared::observability::{TracingConfig, init_tracing};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "send-mailing")]
#[command(about = "メール配信を ID 指定で配信する", long_about = None)]
#[command(version)]
struct Cli {
    /// 配信するメール配信の ID
    #[arg(value_name = "MAILING_ID")]
    mailing_id: Uuid,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(&TracingConfig::from_env("send-mailing"));

    let config = MailingServiceConfig::from_env().context("設定の読み込みに失敗しました")?;
    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("データベース接続に失敗しました")?;

    let mailing_repo = PostgresMailingRepository::new(pool.clone());
    let services = build_services(&config, pool);
    run(
        &MailingId::from_uuid(cli.mailing_id),
        &mailing_repo,
        &services.dispatch,
    )
    .await
}

/// メール配信を読み込んで配信する
///
/// 存在しない ID の場合は配信エンジンを呼ばずに失敗の終了コードを返す。
async fn run(
    mailing_id: &MailingId,
    mailing_repo: &dyn MailingRepository,
    dispatch: &DispatchUseCaseImpl,
) -> anyhow::Result<ExitCode> {
    let Some(mailing) = mailing_repo.find_by_id(mailing_id).await? else {
        eprintln!("メール配信が見つかりません: {mailing_id}");
        return Ok(ExitCode::FAILURE);
    };

    let result = dispatch.run(&mailing).await?;
    println!("{}", describe(mailing_id, &result));

    Ok(ExitCode::SUCCESS)
}

/// 配信結果をオペレーター向けの 1 行にする
fn describe(mailing_id: &MailingId, result: &DispatchResult) -> String {
    match result.outcome {
        DispatchOutcome::Ok => format!(
            "メール配信 {mailing_id} を配信しました（成功: {}件、失敗: {}件）",
            result.success_count, result.failure_count
        ),
        DispatchOutcome::AlreadyLaunched => {
            format!("メール配信 {mailing_id} は既に配信が開始されています")
        }
        DispatchOutcome::NoRecipients => {
            format!("メール配信 {mailing_id} には受信者がいません")
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use mailflow_domain::mailing::MailingStatus;
    use mailflow_mailing_service::test_utils::MailingTestBuilder;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cli定義が正しい() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_uuidでないidは拒否される() {
        let result = Cli::try_parse_from(["send-mailing", "42"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_配信結果に件数が含まれる() {
        let id = MailingId::new();
        let result = DispatchResult {
            outcome:       DispatchOutcome::Ok,
            success_count: 2,
            failure_count: 1,
        };

        assert_eq!(
            describe(&id, &result),
            format!("メール配信 {id} を配信しました（成功: 2件、失敗: 1件）")
        );
    }

    #[tokio::test]
    async fn test_存在しないidは配信エンジンを呼ばずに失敗する() {
        let setup = MailingTestBuilder::new().build().await;

        let code = run(&MailingId::new(), &setup.mailings, &setup.dispatch)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(setup.mailings.claim_calls(), 0);
        assert!(setup.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_存在するidは配信して成功する() {
        let setup = MailingTestBuilder::new().build().await;
        let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io"]).await;

        let code = run(mailing.id(), &setup.mailings, &setup.dispatch)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(setup.transport.sent().len(), 2);
        assert_eq!(
            setup.mailings.get(mailing.id()).unwrap().status(),
            MailingStatus::Accomplished
        );
    }
}

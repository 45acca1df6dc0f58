//! # Mailing Service サーバー
//!
//! メール配信の送信、停止、予約を受け付ける内部 API サーバー。
//! 同じプロセスで配信スケジューラを動かし、予定日時を過ぎたメール配信を配信する。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `MAILING_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `MAILING_PORT` | No | ポート番号（デフォルト: `13002`） |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `DATABASE_MAX_CONNECTIONS` | No | 接続プールの最大接続数（デフォルト: `10`） |
//! | `DISPATCH_CONCURRENCY` | No | 1 回の配信の同時送信数（デフォルト: `4`） |
//! | `MAIL_BACKEND` | No | `smtp` または `noop`（デフォルト: `noop`） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | SMTP サーバー（デフォルト: `localhost:1025`） |
//! | `SMTP_TIMEOUT_SECS` | No | 送信 1 回のタイムアウト秒数（デフォルト: `10`） |
//! | `MAIL_FROM_ADDRESS` | No | 送信元アドレス |
//! | `SCHEDULER_ENABLED` | No | スケジューラを起動するか（デフォルト: `true`） |
//! | `SCHEDULER_INTERVAL_SECS` | No | ポーリング間隔秒数（デフォルト: `60`） |
//! | `LOG_FORMAT` | No | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p mailflow-mailing-service --bin mailing-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::get};
use mailflow_domain::clock::SystemClock;
use mailflow_infra::{db, repository::PostgresMailingRepository};
use mailflow_mailing_service::{
    app_builder::{build_router, build_services},
    config::MailingServiceConfig,
    handler::{ReadinessState, readiness_check},
    scheduler::MailingScheduler,
};
use mailflow_shared::observability::{TracingConfig, init_tracing, make_request_span};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    let tracing_config = TracingConfig::from_env("mailing-service");
    init_tracing(&tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "mailing-service").entered();

    // 設定読み込み
    let config = MailingServiceConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        "Mailing Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("データベース接続に失敗しました")?;
    tracing::info!("データベースに接続しました");

    db::run_migrations(&pool)
        .await
        .context("マイグレーションの実行に失敗しました")?;
    tracing::info!("マイグレーションを適用しました");

    // Readiness Check 用 State（pool が move される前に clone）
    let readiness_state = Arc::new(ReadinessState { pool: pool.clone() });

    let services = build_services(&config, pool.clone());

    let scheduler = config.scheduler.enabled.then(|| {
        Arc::new(MailingScheduler::new(
            services.dispatch.clone(),
            Arc::new(PostgresMailingRepository::new(pool)),
            Arc::new(SystemClock),
            config.scheduler.interval,
        ))
        .start()
    });
    if scheduler.is_none() {
        tracing::info!("スケジューラは無効です");
    }

    // ルーター構築
    // レイヤー順序: 下に書いたものが外側
    let app = build_router(services.app_state)
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Mailing Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.stop().await;
    }
    tracing::info!("Mailing Service サーバーを停止しました");

    Ok(())
}

/// Ctrl+C を待つ
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("シグナルハンドラの登録に失敗しました: {e}");
    }
    tracing::info!("停止シグナルを受信しました");
}

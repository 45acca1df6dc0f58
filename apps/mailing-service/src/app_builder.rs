//! # Mailing Service アプリケーション構築
//!
//! リポジトリ、メール送信、ユースケースの組み立てとルーター定義を担当する。
//! `main.rs` と `send-mailing` CLI はインフラ初期化に集中する。

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use mailflow_domain::clock::SystemClock;
use mailflow_infra::{
    MailTransport,
    NoopMailTransport,
    PgTransactionManager,
    SmtpMailTransport,
    repository::{
        PostgresAttemptRepository,
        PostgresMailingRepository,
        PostgresMessageRepository,
        PostgresStatsRepository,
        PostgresUserRepository,
    },
};
use sqlx::PgPool;

use crate::{
    config::{MailBackend, MailConfig, MailingServiceConfig},
    handler::{
        DashboardState,
        MailingState,
        UserState,
        block_user,
        get_dashboard_stats,
        health_check,
        list_attempts,
        schedule_mailing,
        send_mailing,
        stop_mailing,
        unblock_user,
    },
    usecase::{
        DashboardUseCaseImpl,
        DispatchUseCaseImpl,
        MailingUseCaseImpl,
        ScheduleUseCaseImpl,
        StopUseCaseImpl,
        UserUseCaseImpl,
    },
};

/// HTTP ハンドラが使うユースケース
#[derive(Clone)]
pub struct AppState {
    pub mailing:   Arc<MailingUseCaseImpl>,
    pub user:      Arc<UserUseCaseImpl>,
    pub dashboard: Arc<DashboardUseCaseImpl>,
}

/// PostgreSQL に接続したユースケース一式
pub struct Services {
    /// スケジューラと CLI が直接使う配信エンジン
    pub dispatch:  Arc<DispatchUseCaseImpl>,
    pub app_state: AppState,
}

/// 設定からメール送信の実装を選ぶ
pub fn build_mail_transport(config: &MailConfig) -> Arc<dyn MailTransport> {
    match config.backend {
        MailBackend::Smtp => Arc::new(SmtpMailTransport::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_timeout,
        )),
        MailBackend::Noop => Arc::new(NoopMailTransport),
    }
}

/// PostgreSQL リポジトリでユースケースを組み立てる
pub fn build_services(config: &MailingServiceConfig, pool: PgPool) -> Services {
    let clock = Arc::new(SystemClock);
    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let mailing_repo = Arc::new(PostgresMailingRepository::new(pool.clone()));
    let attempt_repo = Arc::new(PostgresAttemptRepository::new(pool.clone()));

    let dispatch = Arc::new(DispatchUseCaseImpl::new(
        mailing_repo.clone(),
        Arc::new(PostgresMessageRepository::new(pool.clone())),
        attempt_repo.clone(),
        build_mail_transport(&config.mail),
        clock.clone(),
        config.mail.from_address.clone(),
        config.dispatch_concurrency,
    ));
    let stop = Arc::new(StopUseCaseImpl::new(
        mailing_repo.clone(),
        attempt_repo.clone(),
        Arc::new(PgTransactionManager::new(pool.clone())),
        clock,
    ));
    let schedule = Arc::new(ScheduleUseCaseImpl::new(mailing_repo.clone()));

    let app_state = AppState {
        mailing:   Arc::new(MailingUseCaseImpl::new(
            user_repo.clone(),
            mailing_repo.clone(),
            attempt_repo,
            dispatch.clone(),
            stop.clone(),
            schedule,
        )),
        user:      Arc::new(UserUseCaseImpl::new(user_repo, mailing_repo, stop)),
        dashboard: Arc::new(DashboardUseCaseImpl::new(Arc::new(
            PostgresStatsRepository::new(pool),
        ))),
    };

    Services {
        dispatch,
        app_state,
    }
}

/// ルーターを構築する
///
/// Readiness Check と HTTP レイヤーは `main.rs` で追加する。
pub fn build_router(state: AppState) -> Router {
    let mailing_state = Arc::new(MailingState {
        usecase: state.mailing,
    });
    let user_state = Arc::new(UserState {
        usecase: state.user,
    });
    let dashboard_state = Arc::new(DashboardState {
        usecase: state.dashboard,
    });

    Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/internal/mailings/{id}/send", post(send_mailing))
                .route("/internal/mailings/{id}/stop", post(stop_mailing))
                .route("/internal/mailings/{id}/schedule", post(schedule_mailing))
                .route("/internal/mailings/{id}/attempts", get(list_attempts))
                .with_state(mailing_state),
        )
        .merge(
            Router::new()
                .route("/internal/users/{id}/block", post(block_user))
                .route("/internal/users/{id}/unblock", post(unblock_user))
                .with_state(user_state),
        )
        .merge(
            Router::new()
                .route("/internal/dashboard/stats", get(get_dashboard_stats))
                .with_state(dashboard_state),
        )
}

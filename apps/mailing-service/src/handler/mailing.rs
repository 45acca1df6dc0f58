//! # メール配信ハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /internal/mailings/{id}/send` - メール配信を送信する
//! - `POST /internal/mailings/{id}/stop` - 配信中のメール配信を停止する
//! - `POST /internal/mailings/{id}/schedule` - 配信予定日時を設定する
//! - `GET /internal/mailings/{id}/attempts?user_id={user_id}` - 配信試行の履歴

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use mailflow_domain::{
    attempt::Attempt,
    mailing::{Mailing, MailingId},
    user::UserId,
};
use mailflow_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    usecase::{
        dispatch::{DispatchOutcome, DispatchResult},
        mailing::MailingUseCaseImpl,
        stop::StopOutcome,
    },
};

/// メール配信 API の共有状態
pub struct MailingState {
    pub usecase: Arc<MailingUseCaseImpl>,
}

// --- リクエスト/レスポンス型 ---

/// 操作者を指定するリクエスト
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub user_id: Uuid,
}

/// 操作者を指定するクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

/// 停止リクエスト
#[derive(Debug, Deserialize)]
pub struct StopMailingRequest {
    pub user_id: Uuid,
    pub reason:  Option<String>,
}

/// 予約リクエスト
#[derive(Debug, Deserialize)]
pub struct ScheduleMailingRequest {
    pub user_id:      Uuid,
    pub scheduled_at: DateTime<Utc>,
}

/// 配信結果 DTO
#[derive(Debug, Serialize)]
pub struct DispatchResultDto {
    pub outcome:       DispatchOutcome,
    pub success_count: usize,
    pub failure_count: usize,
}

impl From<DispatchResult> for DispatchResultDto {
    fn from(result: DispatchResult) -> Self {
        Self {
            outcome:       result.outcome,
            success_count: result.success_count,
            failure_count: result.failure_count,
        }
    }
}

/// 停止結果 DTO
#[derive(Debug, Serialize)]
pub struct StopResultDto {
    /// この呼び出しで停止したか
    pub stopped:    bool,
    pub backfilled: usize,
}

impl From<StopOutcome> for StopResultDto {
    fn from(outcome: StopOutcome) -> Self {
        match outcome {
            StopOutcome::NotLaunched => Self {
                stopped:    false,
                backfilled: 0,
            },
            StopOutcome::Stopped { backfilled } => Self {
                stopped: true,
                backfilled,
            },
        }
    }
}

/// メール配信 DTO
#[derive(Debug, Serialize)]
pub struct MailingDto {
    pub id:              Uuid,
    pub owner_id:        Uuid,
    pub message_id:      Uuid,
    pub status:          String,
    pub recipient_count: usize,
    pub scheduled_at:    Option<String>,
    pub first_sent_at:   Option<String>,
    pub completed_at:    Option<String>,
    pub created_at:      String,
}

impl From<Mailing> for MailingDto {
    fn from(mailing: Mailing) -> Self {
        Self {
            id:              *mailing.id().as_uuid(),
            owner_id:        *mailing.owner_id().as_uuid(),
            message_id:      *mailing.message_id().as_uuid(),
            status:          mailing.status().to_string(),
            recipient_count: mailing.recipient_ids().len(),
            scheduled_at:    mailing.scheduled_at().map(|t| t.to_rfc3339()),
            first_sent_at:   mailing.first_sent_at().map(|t| t.to_rfc3339()),
            completed_at:    mailing.completed_at().map(|t| t.to_rfc3339()),
            created_at:      mailing.created_at().to_rfc3339(),
        }
    }
}

/// 配信試行 DTO
///
/// 受信者が削除された後も、記録時点のメールアドレスと氏名を返す。
#[derive(Debug, Serialize)]
pub struct AttemptDto {
    pub id:                  Uuid,
    pub recipient_id:        Option<Uuid>,
    pub recipient_email:     String,
    pub recipient_full_name: Option<String>,
    pub status:              String,
    pub server_response:     String,
    pub attempted_at:        String,
}

impl From<Attempt> for AttemptDto {
    fn from(attempt: Attempt) -> Self {
        Self {
            id:                  *attempt.id().as_uuid(),
            recipient_id:        attempt.recipient_id().map(|id| *id.as_uuid()),
            recipient_email:     attempt.recipient_email().as_str().to_string(),
            recipient_full_name: attempt
                .recipient_full_name()
                .map(|name| name.as_str().to_string()),
            status:              attempt.status().to_string(),
            server_response:     attempt.server_response().to_string(),
            attempted_at:        attempt.attempted_at().to_rfc3339(),
        }
    }
}

// --- ハンドラ ---

/// メール配信を送信する
///
/// 配信が完了するまで待ってから結果を返す。
#[tracing::instrument(skip_all, fields(%mailing_id))]
pub async fn send_mailing(
    State(state): State<Arc<MailingState>>,
    Path(mailing_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Response, ServiceError> {
    let result = state
        .usecase
        .send(
            &MailingId::from_uuid(mailing_id),
            &UserId::from_uuid(req.user_id),
        )
        .await?;

    let response = ApiResponse::new(DispatchResultDto::from(result));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 配信中のメール配信を停止する
#[tracing::instrument(skip_all, fields(%mailing_id))]
pub async fn stop_mailing(
    State(state): State<Arc<MailingState>>,
    Path(mailing_id): Path<Uuid>,
    Json(req): Json<StopMailingRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .usecase
        .stop(
            &MailingId::from_uuid(mailing_id),
            &UserId::from_uuid(req.user_id),
            req.reason.as_deref(),
        )
        .await?;

    let response = ApiResponse::new(StopResultDto::from(outcome));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 配信予定日時を設定する
#[tracing::instrument(skip_all, fields(%mailing_id))]
pub async fn schedule_mailing(
    State(state): State<Arc<MailingState>>,
    Path(mailing_id): Path<Uuid>,
    Json(req): Json<ScheduleMailingRequest>,
) -> Result<Response, ServiceError> {
    let mailing = state
        .usecase
        .schedule(
            &MailingId::from_uuid(mailing_id),
            &UserId::from_uuid(req.user_id),
            req.scheduled_at,
        )
        .await?;

    let response = ApiResponse::new(MailingDto::from(mailing));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 配信試行の履歴を取得する
#[tracing::instrument(skip_all, fields(%mailing_id))]
pub async fn list_attempts(
    State(state): State<Arc<MailingState>>,
    Path(mailing_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Response, ServiceError> {
    let attempts = state
        .usecase
        .list_attempts(
            &MailingId::from_uuid(mailing_id),
            &UserId::from_uuid(query.user_id),
        )
        .await?;

    let response = ApiResponse::new(
        attempts
            .into_iter()
            .map(AttemptDto::from)
            .collect::<Vec<_>>(),
    );
    Ok((StatusCode::OK, Json(response)).into_response())
}

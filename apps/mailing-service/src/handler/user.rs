//! # ユーザーハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /internal/users/{id}/block` - ユーザーをブロックする（サービスマネージャーのみ）
//! - `POST /internal/users/{id}/unblock` - ブロックを解除する（サービスマネージャーのみ）

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mailflow_domain::user::UserId;
use mailflow_shared::ApiResponse;
use uuid::Uuid;

use crate::{error::ServiceError, handler::mailing::ActorRequest, usecase::user::UserUseCaseImpl};

/// ユーザー API の共有状態
pub struct UserState {
    pub usecase: Arc<UserUseCaseImpl>,
}

/// ユーザーをブロックする
///
/// ブロックしたユーザーの配信中のメール配信も停止する。
#[tracing::instrument(skip_all, fields(%user_id))]
pub async fn block_user(
    State(state): State<Arc<UserState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Response, ServiceError> {
    let result = state
        .usecase
        .block_user(&UserId::from_uuid(req.user_id), &UserId::from_uuid(user_id))
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(result))).into_response())
}

/// ユーザーのブロックを解除する
#[tracing::instrument(skip_all, fields(%user_id))]
pub async fn unblock_user(
    State(state): State<Arc<UserState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<Response, ServiceError> {
    let result = state
        .usecase
        .unblock_user(&UserId::from_uuid(req.user_id), &UserId::from_uuid(user_id))
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(result))).into_response())
}

//! # ダッシュボード API ハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mailflow_domain::user::UserId;
use mailflow_shared::ApiResponse;

use crate::{
    error::ServiceError,
    handler::mailing::UserQuery,
    usecase::dashboard::DashboardUseCaseImpl,
};

/// ダッシュボードハンドラーの State
pub struct DashboardState {
    pub usecase: Arc<DashboardUseCaseImpl>,
}

/// ダッシュボード統計を取得する
///
/// ## エンドポイント
/// GET /internal/dashboard/stats?user_id={user_id}
#[tracing::instrument(skip_all)]
pub async fn get_dashboard_stats(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<UserQuery>,
) -> Result<Response, ServiceError> {
    let stats = state
        .usecase
        .get_stats(&UserId::from_uuid(query.user_id))
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(stats))).into_response())
}

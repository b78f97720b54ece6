use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::activity::{Activity, ActivityPage};
use serde::Deserialize;
use services::services::{
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_PAGE_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

pub async fn get_project_feed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<ResponseJson<ApiResponse<ActivityPage>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let page = Activity::find_by_project(
        &state.db().pool,
        project_id,
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        query.skip.unwrap_or(0),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_user_feed(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<FeedQuery>,
) -> Result<ResponseJson<ApiResponse<ActivityPage>>, ApiError> {
    let page = Activity::find_by_user(
        &state.db().pool,
        user.id,
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        query.skip.unwrap_or(0),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(page)))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/project/{project_id}", get(get_project_feed))
        .route("/user", get(get_user_feed));

    Router::new().nest("/activity", inner)
}

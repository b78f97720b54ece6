use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{CreateUser, User};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn get_users(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err("Name is required".into());
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err("A valid email is required".into());
    }

    let user = User::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/users",
        Router::new().route("/", get(get_users).post(create_user)),
    )
}

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::{
    models::{
        activity::CreateActivity,
        comment::{Comment, CreateComment},
        task::Task,
    },
    types::{ActivityAction, ActivityEntityType},
};
use serde::Deserialize;
use serde_json::json;
use services::services::{
    activity::ActivityRecorder,
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::{Actor, ProjectEvent},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_comment_middleware};

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    if payload.content.trim().is_empty() {
        return Err("Comment content is required".into());
    }

    let task = Task::find_by_id(&state.db().pool, payload.task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::AddComment,
    )
    .await?;

    let comment = Comment::create(&state.db().pool, &payload, Uuid::new_v4(), user.id).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: task.project_id,
            user_id: user.id,
            action: ActivityAction::CommentAdded,
            entity_type: ActivityEntityType::Comment,
            entity_id: comment.id,
            details: json!({ "task_id": task.id, "task_title": task.title }),
        },
    )
    .await;

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::CommentAdded {
            comment: comment.clone(),
            task_id: task.id,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn get_task_comments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Comment>>>, ApiError> {
    let task = Task::find_by_id(&state.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let comments = Comment::find_by_task(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(comment): Extension<Comment>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    if payload.content.trim().is_empty() {
        return Err("Comment content is required".into());
    }
    if comment.author_id != user.id {
        return Err(ApiError::Forbidden(
            "You can only edit your own comments".to_string(),
        ));
    }

    let updated = Comment::update_content(&state.db().pool, comment.id, payload.content).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(comment): Extension<Comment>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if comment.author_id != user.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own comments".to_string(),
        ));
    }

    Comment::delete(&state.db().pool, comment.id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Comment deleted successfully",
    )))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let comment_id_router = Router::new()
        .route("/", put(update_comment).delete(delete_comment))
        .layer(from_fn_with_state(state.clone(), load_comment_middleware));

    let inner = Router::new()
        .route("/", post(create_comment))
        .route("/task/{task_id}", get(get_task_comments))
        .nest("/{comment_id}", comment_id_router);

    Router::new().nest("/comments", inner)
}

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::{
    models::{
        activity::CreateActivity,
        attachment::{Attachment, CreateAttachment},
        task::Task,
    },
    types::{ActivityAction, ActivityEntityType},
};
use serde_json::json;
use services::services::{
    activity::ActivityRecorder,
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::{Actor, ProjectEvent},
};
use url::Url;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

async fn load_task(state: &AppState, task_id: Uuid) -> Result<Task, ApiError> {
    Task::find_by_id(&state.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Attachment>>>, ApiError> {
    let task = load_task(&state, task_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let attachments = Attachment::find_by_task(&state.db().pool, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(attachments)))
}

pub async fn add_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<CreateAttachment>,
) -> Result<ResponseJson<ApiResponse<Attachment>>, ApiError> {
    if payload.filename.trim().is_empty() {
        return Err("Filename is required".into());
    }
    if Url::parse(&payload.url).is_err() {
        return Err("Invalid attachment URL".into());
    }

    let task = load_task(&state, task_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::ManageAttachment,
    )
    .await?;

    let attachment =
        Attachment::create(&state.db().pool, task_id, &payload, user.id, Uuid::new_v4()).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: task.project_id,
            user_id: user.id,
            action: ActivityAction::FileUploaded,
            entity_type: ActivityEntityType::Task,
            entity_id: task.id,
            details: json!({ "task_title": task.title, "filename": attachment.filename }),
        },
    )
    .await;

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::FileUploaded {
            file: attachment.clone(),
            task_id,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(attachment)))
}

pub async fn remove_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((task_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let task = load_task(&state, task_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::ManageAttachment,
    )
    .await?;

    Attachment::delete(&state.db().pool, attachment_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Attachment removed successfully",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attachments).post(add_attachment))
        .route("/{attachment_id}", delete(remove_attachment))
}

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::{
    models::{
        activity::CreateActivity,
        task::{CreateTask, Task, TaskFilter, UpdateTask},
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

use crate::{
    AppState,
    error::ApiError,
    middleware::load_task_middleware,
    routes::attachments,
};

#[derive(Debug, Deserialize)]
pub struct MoveTaskRequest {
    pub to_status: String,
    pub new_order: Option<i32>,
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err("Task title is required".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        payload.project_id,
        ProjectAction::CreateTask,
    )
    .await?;

    let task = Task::create(&state.db().pool, &payload, Uuid::new_v4(), user.id).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: task.project_id,
            user_id: user.id,
            action: ActivityAction::TaskCreated,
            entity_type: ActivityEntityType::Task,
            entity_id: task.id,
            details: json!({ "task_title": task.title }),
        },
    )
    .await;

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::TaskCreated {
            task: task.clone(),
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn get_project_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Query(filter): Query<TaskFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let tasks = Task::find_by_project(&state.db().pool, project_id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(existing_task): Extension<Task>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err("Task title cannot be empty".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        existing_task.project_id,
        ProjectAction::UpdateTask,
    )
    .await?;

    let (task, changes) = Task::update(&state.db().pool, existing_task.id, &payload).await?;

    if !changes.is_empty() {
        ActivityRecorder::record(
            &state.db().pool,
            CreateActivity {
                project_id: task.project_id,
                user_id: user.id,
                action: ActivityAction::TaskUpdated,
                entity_type: ActivityEntityType::Task,
                entity_id: task.id,
                details: json!({ "task_title": task.title, "changes": changes }),
            },
        )
        .await;
    }

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::TaskUpdated {
            task: task.clone(),
            changes,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn move_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(existing_task): Extension<Task>,
    Json(payload): Json<MoveTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    if payload.to_status.trim().is_empty() {
        return Err("Target status is required".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        existing_task.project_id,
        ProjectAction::MoveTask,
    )
    .await?;

    let (task, from_status) = Task::move_to(
        &state.db().pool,
        existing_task.id,
        &payload.to_status,
        payload.new_order,
    )
    .await?;

    if from_status != task.status {
        ActivityRecorder::record(
            &state.db().pool,
            CreateActivity {
                project_id: task.project_id,
                user_id: user.id,
                action: ActivityAction::TaskMoved,
                entity_type: ActivityEntityType::Task,
                entity_id: task.id,
                details: json!({
                    "task_title": task.title,
                    "from_status": from_status,
                    "to_status": task.status,
                }),
            },
        )
        .await;
    }

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::TaskMoved {
            task: task.clone(),
            from_status,
            to_status: task.status.clone(),
            new_order: payload.new_order,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        task.project_id,
        ProjectAction::DeleteTask,
    )
    .await?;

    let rows = Task::delete(&state.db().pool, task.id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: task.project_id,
            user_id: user.id,
            action: ActivityAction::TaskDeleted,
            entity_type: ActivityEntityType::Task,
            entity_id: task.id,
            details: json!({ "task_title": task.title }),
        },
    )
    .await;

    state.realtime().announce(
        task.project_id,
        &ProjectEvent::TaskDeleted {
            task_id: task.id,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Task deleted successfully",
    )))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_actions = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/move", put(move_task))
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    // Attachment routes extract their own path params, so they sit outside
    // the single-param loader middleware.
    let task_id_router = task_actions.nest("/attachments", attachments::router());

    let inner = Router::new()
        .route("/", post(create_task))
        .route("/project/{project_id}", get(get_project_tasks))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Utc};
use db::models::{task::Task, time_log::TimeLog};
use serde::{Deserialize, Serialize};
use services::services::{
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::{Actor, ProjectEvent},
    time_tracking::TimeTracker,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct StartTimerRequest {
    pub task_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualTimeLogRequest {
    pub task_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskTimeLogs {
    pub time_logs: Vec<TimeLog>,
    pub total_hours: f64,
}

async fn authorize_for_task(
    state: &AppState,
    user: &AuthUser,
    task_id: Uuid,
    action: ProjectAction,
) -> Result<Task, ApiError> {
    let task = Task::find_by_id(&state.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    PermissionGate::authorize(&state.db().pool, user.id, task.project_id, action).await?;
    Ok(task)
}

pub async fn start_timer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<StartTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimeLog>>, ApiError> {
    authorize_for_task(&state, &user, payload.task_id, ProjectAction::TrackTime).await?;

    let (time_log, project_id) =
        TimeTracker::start(&state.db().pool, payload.task_id, user.id, payload.note).await?;

    state.realtime().announce(
        project_id,
        &ProjectEvent::TimerStarted {
            task_id: payload.task_id,
            time_log: time_log.clone(),
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(time_log)))
}

pub async fn stop_timer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(time_log_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TimeLog>>, ApiError> {
    let (time_log, project_id) = TimeTracker::stop(&state.db().pool, time_log_id, user.id).await?;

    state.realtime().announce(
        project_id,
        &ProjectEvent::TimerStopped {
            task_id: time_log.task_id,
            time_log: time_log.clone(),
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(time_log)))
}

pub async fn add_manual_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ManualTimeLogRequest>,
) -> Result<ResponseJson<ApiResponse<TimeLog>>, ApiError> {
    authorize_for_task(&state, &user, payload.task_id, ProjectAction::TrackTime).await?;

    let time_log = TimeTracker::add_manual(
        &state.db().pool,
        payload.task_id,
        user.id,
        payload.start_time,
        payload.end_time,
        payload.note,
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(time_log)))
}

pub async fn get_task_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskTimeLogs>>, ApiError> {
    authorize_for_task(&state, &user, task_id, ProjectAction::ViewProject).await?;

    let time_logs = TimeLog::find_by_task(&state.db().pool, task_id).await?;
    let total_hours = time_logs.iter().map(|log| log.duration_hours).sum();

    Ok(ResponseJson(ApiResponse::success(TaskTimeLogs {
        time_logs,
        total_hours,
    })))
}

pub async fn get_running_timer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Option<TimeLog>>>, ApiError> {
    let running = TimeTracker::running_for_user(&state.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(running)))
}

pub async fn delete_time_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(time_log_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    TimeLog::delete(&state.db().pool, time_log_id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Time log deleted successfully",
    )))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/start", post(start_timer))
        .route("/manual", post(add_manual_log))
        .route("/task/{task_id}", get(get_task_logs))
        .route("/user/current", get(get_running_timer))
        .route("/{time_log_id}/stop", put(stop_timer))
        .route("/{time_log_id}", delete(delete_time_log));

    Router::new().nest("/time-logs", inner)
}

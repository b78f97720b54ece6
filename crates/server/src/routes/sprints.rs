use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    models::{
        activity::CreateActivity,
        sprint::{CreateSprint, Sprint, UpdateSprint},
    },
    types::{ActivityAction, ActivityEntityType},
};
use serde_json::json;
use services::services::{
    activity::ActivityRecorder,
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::{Actor, ProjectEvent, SprintAction},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

async fn load_sprint(state: &AppState, sprint_id: Uuid) -> Result<Sprint, ApiError> {
    Sprint::find_by_id(&state.db().pool, sprint_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Sprint not found".to_string()))
}

pub async fn create_sprint(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSprint>,
) -> Result<ResponseJson<ApiResponse<Sprint>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err("Sprint name is required".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        payload.project_id,
        ProjectAction::ManageSprint,
    )
    .await?;

    let sprint = Sprint::create(&state.db().pool, &payload, Uuid::new_v4()).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: sprint.project_id,
            user_id: user.id,
            action: ActivityAction::SprintCreated,
            entity_type: ActivityEntityType::Sprint,
            entity_id: sprint.id,
            details: json!({ "sprint_name": sprint.name }),
        },
    )
    .await;

    state.realtime().announce(
        sprint.project_id,
        &ProjectEvent::SprintUpdated {
            sprint: sprint.clone(),
            action: SprintAction::Created,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(sprint)))
}

pub async fn get_project_sprints(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Sprint>>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let sprints = Sprint::find_by_project(&state.db().pool, project_id).await?;
    let mut refreshed = Vec::with_capacity(sprints.len());
    for sprint in sprints {
        refreshed.push(Sprint::refresh_status(&state.db().pool, sprint.id).await?);
    }

    Ok(ResponseJson(ApiResponse::success(refreshed)))
}

pub async fn get_sprint(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(sprint_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Sprint>>, ApiError> {
    let sprint = load_sprint(&state, sprint_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        sprint.project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let refreshed = Sprint::refresh_status(&state.db().pool, sprint_id).await?;
    Ok(ResponseJson(ApiResponse::success(refreshed)))
}

pub async fn update_sprint(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(sprint_id): Path<Uuid>,
    Json(payload): Json<UpdateSprint>,
) -> Result<ResponseJson<ApiResponse<Sprint>>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err("Sprint name cannot be empty".into());
    }

    let sprint = load_sprint(&state, sprint_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        sprint.project_id,
        ProjectAction::ManageSprint,
    )
    .await?;

    let updated = Sprint::update(&state.db().pool, sprint_id, &payload).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id: updated.project_id,
            user_id: user.id,
            action: ActivityAction::SprintUpdated,
            entity_type: ActivityEntityType::Sprint,
            entity_id: updated.id,
            details: json!({ "sprint_name": updated.name }),
        },
    )
    .await;

    state.realtime().announce(
        updated.project_id,
        &ProjectEvent::SprintUpdated {
            sprint: updated.clone(),
            action: SprintAction::Updated,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_sprint(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(sprint_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let sprint = load_sprint(&state, sprint_id).await?;
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        sprint.project_id,
        ProjectAction::ManageSprint,
    )
    .await?;

    Sprint::delete(&state.db().pool, sprint_id).await?;

    state.realtime().announce(
        sprint.project_id,
        &ProjectEvent::SprintUpdated {
            sprint: sprint.clone(),
            action: SprintAction::Deleted,
            user: Actor::from(&user),
        },
    );

    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Sprint deleted successfully",
    )))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", post(create_sprint))
        .route("/project/{project_id}", get(get_project_sprints))
        .route(
            "/{sprint_id}",
            get(get_sprint).put(update_sprint).delete(delete_sprint),
        );

    Router::new().nest("/sprints", inner)
}

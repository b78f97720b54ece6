use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::{
    models::{
        activity::CreateActivity,
        project::{
            CreateProject, Project, ProjectWithDetails, UpdateProject, WorkflowStage,
            WorkflowStageInput,
        },
    },
    types::{ActivityAction, ActivityEntityType, Role},
};
use serde::Deserialize;
use serde_json::json;
use services::services::{
    activity::ActivityRecorder,
    auth::AuthUser,
    permissions::{PermissionGate, ProjectAction},
    realtime::ProjectEvent,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub workflow: Vec<WorkflowStageInput>,
}

async fn details_or_internal(
    state: &AppState,
    project_id: Uuid,
) -> Result<ProjectWithDetails, ApiError> {
    Project::find_with_details(&state.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::Internal("Project disappeared mid-request".to_string()))
}

pub async fn get_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectWithDetails>>>, ApiError> {
    let projects = Project::find_for_user(&state.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectWithDetails>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err("Project name is required".into());
    }

    let project_id = Uuid::new_v4();
    Project::create(&state.db().pool, &payload, project_id, user.id).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id,
            user_id: user.id,
            action: ActivityAction::ProjectCreated,
            entity_type: ActivityEntityType::Project,
            entity_id: project_id,
            details: json!({ "project_name": payload.name }),
        },
    )
    .await;

    let details = details_or_internal(&state, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectWithDetails>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::ViewProject,
    )
    .await?;

    let details = details_or_internal(&state, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectWithDetails>>, ApiError> {
    if payload.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err("Project name cannot be empty".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::UpdateProject,
    )
    .await?;

    Project::update(&state.db().pool, project_id, &payload).await?;
    let details = details_or_internal(&state, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::DeleteProject,
    )
    .await?;

    Project::soft_delete(&state.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Project deleted successfully",
    )))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<ResponseJson<ApiResponse<ProjectWithDetails>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::AddMember,
    )
    .await?;

    let role = payload.role.unwrap_or_default();
    Project::add_member(&state.db().pool, project_id, payload.user_id, role).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id,
            user_id: user.id,
            action: ActivityAction::MemberAdded,
            entity_type: ActivityEntityType::Project,
            entity_id: project_id,
            details: json!({ "added_user_id": payload.user_id, "role": role }),
        },
    )
    .await;

    let details = details_or_internal(&state, project_id).await?;
    if let Some(new_member) = details
        .members
        .iter()
        .find(|m| m.user_id == payload.user_id)
        .cloned()
    {
        state.realtime().announce(
            project_id,
            &ProjectEvent::MemberAdded {
                project: details.clone(),
                new_member,
            },
        );
    }

    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<ProjectWithDetails>>, ApiError> {
    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::RemoveMember,
    )
    .await?;

    Project::remove_member(&state.db().pool, project_id, member_id).await?;

    ActivityRecorder::record(
        &state.db().pool,
        CreateActivity {
            project_id,
            user_id: user.id,
            action: ActivityAction::MemberRemoved,
            entity_type: ActivityEntityType::Project,
            entity_id: project_id,
            details: json!({ "removed_user_id": member_id }),
        },
    )
    .await;

    let details = details_or_internal(&state, project_id).await?;
    state.realtime().announce(
        project_id,
        &ProjectEvent::MemberRemoved {
            project: details.clone(),
            removed_user_id: member_id,
        },
    );

    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateWorkflowRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkflowStage>>>, ApiError> {
    if payload.workflow.is_empty() {
        return Err("Workflow must contain at least one stage".into());
    }
    if payload.workflow.iter().any(|s| s.name.trim().is_empty()) {
        return Err("Stage name is required".into());
    }

    PermissionGate::authorize(
        &state.db().pool,
        user.id,
        project_id,
        ProjectAction::UpdateWorkflow,
    )
    .await?;

    let workflow =
        Project::replace_workflow(&state.db().pool, project_id, &payload.workflow).await?;

    state.realtime().announce(
        project_id,
        &ProjectEvent::WorkflowUpdated {
            workflow: workflow.clone(),
        },
    );

    Ok(ResponseJson(ApiResponse::success(workflow)))
}

pub fn router() -> Router<AppState> {
    let inner = Router::new()
        .route("/", get(get_projects).post(create_project))
        .route(
            "/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/{project_id}/members", post(add_member))
        .route("/{project_id}/members/{user_id}", delete(remove_member))
        .route("/{project_id}/workflow", put(update_workflow));

    Router::new().nest("/projects", inner)
}

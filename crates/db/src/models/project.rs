use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{project, project_member, user, workflow_stage},
    models::ids,
    types::Role,
};

/// Stages every new project starts with.
const DEFAULT_WORKFLOW: [(&str, &str, i32, &str); 4] = [
    ("todo", "To Do", 1, "#94a3b8"),
    ("inprogress", "In Progress", 2, "#3b82f6"),
    ("review", "Review", 3, "#f59e0b"),
    ("done", "Done", 4, "#10b981"),
];

const DEFAULT_STAGE_COLOR: &str = "#6366f1";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("User is already a member of this project")]
    AlreadyMember,
    #[error("User is not a member of this project")]
    MemberNotFound,
    #[error("Cannot remove project owner")]
    OwnerImmutable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithDetails {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub workflow: Vec<WorkflowStage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowStageInput {
    pub id: Option<String>,
    pub name: String,
    pub order: i32,
    pub color: Option<String>,
}

fn stage_id_from_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

impl Project {
    fn from_model(model: project::Model, owner_uuid: Uuid) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            owner_id: owner_uuid,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn resolve<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Self, DbErr> {
        let owner_uuid = ids::user_uuid_by_id(db, model.owner_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Owner not found".to_string()))?;
        Ok(Self::from_model(model, owner_uuid))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::resolve(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_with_details<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<ProjectWithDetails>, DbErr> {
        let Some(project) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let members = Self::members(db, id).await?;
        let workflow = Self::workflow(db, id).await?;
        Ok(Some(ProjectWithDetails {
            project,
            members,
            workflow,
        }))
    }

    /// Active projects the user owns or belongs to, most recently updated
    /// first.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<ProjectWithDetails>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };

        let member_project_ids: Vec<i64> = project_member::Entity::find()
            .select_only()
            .column(project_member::Column::ProjectId)
            .filter(project_member::Column::UserId.eq(user_row_id))
            .into_tuple()
            .all(db)
            .await?;

        let records = project::Entity::find()
            .filter(project::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(project::Column::OwnerId.eq(user_row_id))
                    .add(project::Column::Id.is_in(member_project_ids)),
            )
            .order_by_desc(project::Column::UpdatedAt)
            .all(db)
            .await?;

        let mut projects = Vec::with_capacity(records.len());
        for model in records {
            let uuid = model.uuid;
            let project = Self::resolve(db, model).await?;
            let members = Self::members(db, uuid).await?;
            let workflow = Self::workflow(db, uuid).await?;
            projects.push(ProjectWithDetails {
                project,
                members,
                workflow,
            });
        }
        Ok(projects)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        project_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, ProjectError> {
        let owner_row_id = ids::user_id_by_uuid(db, owner_id)
            .await?
            .ok_or(ProjectError::UserNotFound)?;

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            owner_id: Set(owner_row_id),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        // The owner is also an explicit Admin member, mirroring the
        // member list shown on the board.
        let membership = project_member::ActiveModel {
            project_id: Set(model.id),
            user_id: Set(owner_row_id),
            role: Set(Role::Admin),
            joined_at: Set(now.into()),
            ..Default::default()
        };
        membership.insert(db).await?;

        for (stage_id, name, position, color) in DEFAULT_WORKFLOW {
            let stage = workflow_stage::ActiveModel {
                project_id: Set(model.id),
                stage_id: Set(stage_id.to_string()),
                name: Set(name.to_string()),
                position: Set(position),
                color: Set(color.to_string()),
                ..Default::default()
            };
            stage.insert(db).await?;
        }

        Ok(Self::from_model(model, owner_id))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;

        let mut active: project::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::resolve(db, updated).await?)
    }

    /// Soft delete: the project disappears from listings but its history
    /// stays queryable.
    pub async fn soft_delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;

        let mut active: project::ActiveModel = record.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    pub async fn members<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMember>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };

        let memberships = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .order_by_asc(project_member::Column::JoinedAt)
            .all(db)
            .await?;

        let user_ids: Vec<i64> = memberships.iter().map(|m| m.user_id).collect();
        let users: HashMap<i64, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut members = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(user) = users.get(&membership.user_id) else {
                continue;
            };
            members.push(ProjectMember {
                user_id: user.uuid,
                name: user.name.clone(),
                email: user.email.clone(),
                role: membership.role,
                joined_at: membership.joined_at.into(),
            });
        }
        Ok(members)
    }

    /// Explicit membership role, if any. Owner status is handled separately
    /// by the permission gate.
    pub async fn membership_role<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Role>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(None);
        };
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(None);
        };

        let membership = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .one(db)
            .await?;
        Ok(membership.map(|m| m.role))
    }

    pub async fn add_member<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), ProjectError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(ProjectError::UserNotFound)?;

        let existing = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ProjectError::AlreadyMember);
        }

        let membership = project_member::ActiveModel {
            project_id: Set(project_row_id),
            user_id: Set(user_row_id),
            role: Set(role),
            joined_at: Set(Utc::now().into()),
            ..Default::default()
        };
        membership.insert(db).await?;
        Ok(())
    }

    pub async fn remove_member<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(project_id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(ProjectError::UserNotFound)?;

        if record.owner_id == user_row_id {
            return Err(ProjectError::OwnerImmutable);
        }

        let result = project_member::Entity::delete_many()
            .filter(project_member::Column::ProjectId.eq(record.id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ProjectError::MemberNotFound);
        }
        Ok(())
    }

    pub async fn workflow<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<WorkflowStage>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };

        let stages = workflow_stage::Entity::find()
            .filter(workflow_stage::Column::ProjectId.eq(project_row_id))
            .order_by_asc(workflow_stage::Column::Position)
            .all(db)
            .await?;

        Ok(stages
            .into_iter()
            .map(|s| WorkflowStage {
                id: s.stage_id,
                name: s.name,
                order: s.position,
                color: s.color,
            })
            .collect())
    }

    /// Replace the stage list wholesale. Stage ids are kept when supplied so
    /// existing task statuses stay valid across renames.
    pub async fn replace_workflow<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        stages: &[WorkflowStageInput],
    ) -> Result<Vec<WorkflowStage>, ProjectError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;

        workflow_stage::Entity::delete_many()
            .filter(workflow_stage::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;

        for stage in stages {
            let stage_id = stage
                .id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| stage_id_from_name(&stage.name));
            let active = workflow_stage::ActiveModel {
                project_id: Set(project_row_id),
                stage_id: Set(stage_id),
                name: Set(stage.name.clone()),
                position: Set(stage.order),
                color: Set(stage
                    .color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STAGE_COLOR.to_string())),
                ..Default::default()
            };
            active.insert(db).await?;
        }

        Ok(Self::workflow(db, project_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::user::{CreateUser, User},
    };

    async fn setup() -> (DBService, Uuid) {
        let db = DBService::new_in_memory().await.unwrap();
        let owner_id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                avatar: None,
            },
            owner_id,
        )
        .await
        .unwrap();
        (db, owner_id)
    }

    async fn add_user(db: &DBService, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: email.split('@').next().unwrap().to_string(),
                email: email.to_string(),
                avatar: None,
            },
            id,
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn new_project_gets_default_workflow_and_owner_membership() {
        let (db, owner_id) = setup().await;

        let project_id = Uuid::new_v4();
        let project = Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            owner_id,
        )
        .await
        .unwrap();

        assert_eq!(project.owner_id, owner_id);

        let details = Project::find_with_details(&db.pool, project_id)
            .await
            .unwrap()
            .unwrap();
        let stage_ids: Vec<&str> = details.workflow.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(stage_ids, vec!["todo", "inprogress", "review", "done"]);
        assert_eq!(details.members.len(), 1);
        assert_eq!(details.members[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn add_member_rejects_duplicates() {
        let (db, owner_id) = setup().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            owner_id,
        )
        .await
        .unwrap();

        let member_id = add_user(&db, "bob@example.com").await;
        Project::add_member(&db.pool, project_id, member_id, Role::TeamMember)
            .await
            .unwrap();

        let err = Project::add_member(&db.pool, project_id, member_id, Role::TeamMember)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyMember));
    }

    #[tokio::test]
    async fn owner_cannot_be_removed() {
        let (db, owner_id) = setup().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            owner_id,
        )
        .await
        .unwrap();

        let err = Project::remove_member(&db.pool, project_id, owner_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::OwnerImmutable));
    }

    #[tokio::test]
    async fn replace_workflow_derives_missing_stage_ids() {
        let (db, owner_id) = setup().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            owner_id,
        )
        .await
        .unwrap();

        let stages = Project::replace_workflow(
            &db.pool,
            project_id,
            &[
                WorkflowStageInput {
                    id: None,
                    name: "Backlog".to_string(),
                    order: 1,
                    color: None,
                },
                WorkflowStageInput {
                    id: Some("done".to_string()),
                    name: "Shipped".to_string(),
                    order: 2,
                    color: None,
                },
            ],
        )
        .await
        .unwrap();

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].id, "backlog");
        assert_eq!(stages[1].id, "done");
        assert_eq!(stages[1].name, "Shipped");
    }

    #[tokio::test]
    async fn soft_deleted_projects_leave_user_listings() {
        let (db, owner_id) = setup().await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            owner_id,
        )
        .await
        .unwrap();

        assert_eq!(Project::find_for_user(&db.pool, owner_id).await.unwrap().len(), 1);

        Project::soft_delete(&db.pool, project_id).await.unwrap();
        assert!(Project::find_for_user(&db.pool, owner_id).await.unwrap().is_empty());
    }
}

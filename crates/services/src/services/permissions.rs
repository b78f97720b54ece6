use db::{ConnectionTrait, DbErr, models::project::Project, types::Role};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("You do not have access to this project")]
    NoAccess,
    #[error("This action requires {0} role or higher")]
    RequiresRole(Role),
    #[error("Only the project owner can perform this action")]
    OwnerOnly,
}

/// Minimum privilege an action demands. `Owner` sits above Admin-by-role:
/// an Admin member still cannot delete someone else's project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    Membership,
    AtLeast(Role),
    Owner,
}

/// Every gated action, in one place. Route handlers and the socket layer
/// consult this table instead of hard-coding role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    ViewProject,
    JoinRoom,
    CreateTask,
    UpdateTask,
    MoveTask,
    DeleteTask,
    AddComment,
    TrackTime,
    ManageAttachment,
    UpdateProject,
    AddMember,
    RemoveMember,
    UpdateWorkflow,
    ManageSprint,
    DeleteProject,
}

impl ProjectAction {
    pub fn requirement(self) -> RoleRequirement {
        use ProjectAction::*;
        match self {
            ViewProject | JoinRoom | CreateTask | UpdateTask | MoveTask | DeleteTask
            | AddComment | TrackTime | ManageAttachment => RoleRequirement::Membership,
            UpdateProject | AddMember | RemoveMember | UpdateWorkflow | ManageSprint => {
                RoleRequirement::AtLeast(Role::ProjectManager)
            }
            DeleteProject => RoleRequirement::Owner,
        }
    }
}

/// A granted authorization: the project snapshot the decision was made
/// against plus the caller's effective role.
#[derive(Debug, Clone)]
pub struct ProjectAccess {
    pub project: Project,
    pub effective_role: Role,
}

pub struct PermissionGate;

impl PermissionGate {
    /// Authorize `user_id` against `project_id` for `action`. Pure function
    /// of the current project snapshot; re-evaluated on every call because
    /// roles change between requests.
    pub async fn authorize<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        project_id: Uuid,
        action: ProjectAction,
    ) -> Result<ProjectAccess, PermissionError> {
        let project = Project::find_by_id(db, project_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(PermissionError::ProjectNotFound)?;

        // The owner holds the highest role whether or not a membership row
        // exists, and passes owner-only checks nobody else can.
        if project.owner_id == user_id {
            return Ok(ProjectAccess {
                project,
                effective_role: Role::Admin,
            });
        }

        let role = Project::membership_role(db, project_id, user_id)
            .await?
            .ok_or(PermissionError::NoAccess)?;

        match action.requirement() {
            RoleRequirement::Membership => {}
            RoleRequirement::AtLeast(required) => {
                if role.rank() < required.rank() {
                    return Err(PermissionError::RequiresRole(required));
                }
            }
            RoleRequirement::Owner => return Err(PermissionError::OwnerOnly),
        }

        Ok(ProjectAccess {
            project,
            effective_role: role,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::{CreateProject, Project},
            user::{CreateUser, User},
        },
    };

    use super::*;

    async fn make_user(db: &DBService, email: &str) -> Uuid {
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

    async fn setup() -> (DBService, Uuid, Uuid) {
        let db = DBService::new_in_memory().await.unwrap();
        let owner_id = make_user(&db, "owner@example.com").await;
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
        (db, project_id, owner_id)
    }

    #[tokio::test]
    async fn owner_is_admin_and_passes_owner_only_checks() {
        let (db, project_id, owner_id) = setup().await;

        // Ownership short-circuits before any membership lookup, so the
        // owner clears even the owner-only bar no membership role can.
        let access =
            PermissionGate::authorize(&db.pool, owner_id, project_id, ProjectAction::DeleteProject)
                .await
                .unwrap();
        assert_eq!(access.effective_role, Role::Admin);
    }

    #[tokio::test]
    async fn non_member_has_no_access() {
        let (db, project_id, _) = setup().await;
        let stranger = make_user(&db, "stranger@example.com").await;

        let err =
            PermissionGate::authorize(&db.pool, stranger, project_id, ProjectAction::ViewProject)
                .await
                .unwrap_err();
        assert!(matches!(err, PermissionError::NoAccess));
    }

    #[tokio::test]
    async fn rank_order_is_respected() {
        let (db, project_id, _) = setup().await;

        let manager = make_user(&db, "pm@example.com").await;
        Project::add_member(&db.pool, project_id, manager, Role::ProjectManager)
            .await
            .unwrap();
        let member = make_user(&db, "dev@example.com").await;
        Project::add_member(&db.pool, project_id, member, Role::TeamMember)
            .await
            .unwrap();

        // Higher rank passes a lower requirement.
        PermissionGate::authorize(&db.pool, manager, project_id, ProjectAction::AddMember)
            .await
            .unwrap();
        PermissionGate::authorize(&db.pool, manager, project_id, ProjectAction::CreateTask)
            .await
            .unwrap();

        // TeamMember fails ProjectManager-gated actions with the required
        // role named in the message.
        let err =
            PermissionGate::authorize(&db.pool, member, project_id, ProjectAction::RemoveMember)
                .await
                .unwrap_err();
        match err {
            PermissionError::RequiresRole(role) => {
                assert_eq!(role, Role::ProjectManager);
                assert_eq!(
                    format!("{}", PermissionError::RequiresRole(role)),
                    "This action requires Project Manager role or higher"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn admin_member_is_not_the_owner() {
        let (db, project_id, _) = setup().await;

        let admin = make_user(&db, "admin@example.com").await;
        Project::add_member(&db.pool, project_id, admin, Role::Admin)
            .await
            .unwrap();

        let err =
            PermissionGate::authorize(&db.pool, admin, project_id, ProjectAction::DeleteProject)
                .await
                .unwrap_err();
        assert!(matches!(err, PermissionError::OwnerOnly));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let (db, _, owner_id) = setup().await;

        let err = PermissionGate::authorize(
            &db.pool,
            owner_id,
            Uuid::new_v4(),
            ProjectAction::ViewProject,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PermissionError::ProjectNotFound));
    }
}

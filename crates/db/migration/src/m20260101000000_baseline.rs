use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(uuid_col(Users::Uuid))
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Avatar).string())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_uuid")
                    .table(Users::Table)
                    .col(Users::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(fk_id_col(manager, Projects::OwnerId))
                    .col(
                        ColumnDef::new(Projects::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_uuid")
                    .table(Projects::Table)
                    .col(Projects::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_owner_id")
                    .table(Projects::Table)
                    .col(Projects::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(ProjectMembers::Table)
                    .col(pk_id_col(manager, ProjectMembers::Id))
                    .col(fk_id_col(manager, ProjectMembers::ProjectId))
                    .col(fk_id_col(manager, ProjectMembers::UserId))
                    .col(
                        ColumnDef::new(ProjectMembers::Role)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("team_member")),
                    )
                    .col(timestamp_col(ProjectMembers::JoinedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_project_members_project_user")
                    .table(ProjectMembers::Table)
                    .col(ProjectMembers::ProjectId)
                    .col(ProjectMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(WorkflowStages::Table)
                    .col(pk_id_col(manager, WorkflowStages::Id))
                    .col(fk_id_col(manager, WorkflowStages::ProjectId))
                    .col(ColumnDef::new(WorkflowStages::StageId).string_len(64).not_null())
                    .col(ColumnDef::new(WorkflowStages::Name).string().not_null())
                    .col(ColumnDef::new(WorkflowStages::Position).integer().not_null())
                    .col(
                        ColumnDef::new(WorkflowStages::Color)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("#6366f1")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_workflow_stages_project_stage")
                    .table(WorkflowStages::Table)
                    .col(WorkflowStages::ProjectId)
                    .col(WorkflowStages::StageId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(64)
                            .not_null()
                            .default(Expr::val("todo")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("medium")),
                    )
                    .col(fk_id_nullable_col(manager, Tasks::AssigneeId))
                    .col(fk_id_col(manager, Tasks::ReporterId))
                    .col(
                        ColumnDef::new(Tasks::Labels)
                            .json_binary()
                            .not_null()
                            .default(Expr::val("[]")),
                    )
                    .col(ColumnDef::new(Tasks::DueDate).timestamp())
                    .col(fk_id_nullable_col(manager, Tasks::SprintId))
                    .col(
                        ColumnDef::new(Tasks::EstimatedHours)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(
                        ColumnDef::new(Tasks::SortOrder)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_project_status")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_assignee_id")
                    .table(Tasks::Table)
                    .col(Tasks::AssigneeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_sprint_id")
                    .table(Tasks::Table)
                    .col(Tasks::SprintId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Sprints::Table)
                    .col(pk_id_col(manager, Sprints::Id))
                    .col(uuid_col(Sprints::Uuid))
                    .col(fk_id_col(manager, Sprints::ProjectId))
                    .col(ColumnDef::new(Sprints::Name).string().not_null())
                    .col(ColumnDef::new(Sprints::Goal).text())
                    .col(
                        ColumnDef::new(Sprints::Status)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("planning")),
                    )
                    .col(ColumnDef::new(Sprints::StartDate).timestamp().not_null())
                    .col(ColumnDef::new(Sprints::EndDate).timestamp().not_null())
                    .col(timestamp_col(Sprints::CreatedAt))
                    .col(timestamp_col(Sprints::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_sprints_uuid")
                    .table(Sprints::Table)
                    .col(Sprints::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_sprints_project_id")
                    .table(Sprints::Table)
                    .col(Sprints::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Comments::Table)
                    .col(pk_id_col(manager, Comments::Id))
                    .col(uuid_col(Comments::Uuid))
                    .col(fk_id_col(manager, Comments::TaskId))
                    .col(fk_id_col(manager, Comments::AuthorId))
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(fk_id_nullable_col(manager, Comments::ParentCommentId))
                    .col(
                        ColumnDef::new(Comments::Mentions)
                            .json_binary()
                            .not_null()
                            .default(Expr::val("[]")),
                    )
                    .col(timestamp_col(Comments::CreatedAt))
                    .col(timestamp_col(Comments::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_comments_uuid")
                    .table(Comments::Table)
                    .col(Comments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_comments_task_created")
                    .table(Comments::Table)
                    .col(Comments::TaskId)
                    .col(Comments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TimeLogs::Table)
                    .col(pk_id_col(manager, TimeLogs::Id))
                    .col(uuid_col(TimeLogs::Uuid))
                    .col(fk_id_col(manager, TimeLogs::TaskId))
                    .col(fk_id_col(manager, TimeLogs::UserId))
                    .col(ColumnDef::new(TimeLogs::StartTime).timestamp().not_null())
                    .col(ColumnDef::new(TimeLogs::EndTime).timestamp())
                    .col(
                        ColumnDef::new(TimeLogs::DurationHours)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(ColumnDef::new(TimeLogs::Note).text())
                    .col(
                        ColumnDef::new(TimeLogs::IsRunning)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(uuid_nullable_col(TimeLogs::RunningUserId))
                    .col(timestamp_col(TimeLogs::CreatedAt))
                    .col(timestamp_col(TimeLogs::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_time_logs_uuid")
                    .table(TimeLogs::Table)
                    .col(TimeLogs::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_time_logs_task_user")
                    .table(TimeLogs::Table)
                    .col(TimeLogs::TaskId)
                    .col(TimeLogs::UserId)
                    .to_owned(),
            )
            .await?;

        // NULLs don't collide in a unique index, so this enforces at most
        // one running timer per user at the storage layer.
        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_time_logs_running_user_id")
                    .table(TimeLogs::Table)
                    .col(TimeLogs::RunningUserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Activities::Table)
                    .col(pk_id_col(manager, Activities::Id))
                    .col(uuid_col(Activities::Uuid))
                    .col(fk_id_col(manager, Activities::ProjectId))
                    .col(fk_id_col(manager, Activities::UserId))
                    .col(ColumnDef::new(Activities::Action).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Activities::EntityType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(uuid_col(Activities::EntityUuid))
                    .col(
                        ColumnDef::new(Activities::Details)
                            .json_binary()
                            .not_null()
                            .default(Expr::val("{}")),
                    )
                    .col(timestamp_col(Activities::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_activities_uuid")
                    .table(Activities::Table)
                    .col(Activities::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_activities_project_created")
                    .table(Activities::Table)
                    .col(Activities::ProjectId)
                    .col(Activities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_activities_user_created")
                    .table(Activities::Table)
                    .col(Activities::UserId)
                    .col(Activities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Attachments::Table)
                    .col(pk_id_col(manager, Attachments::Id))
                    .col(uuid_col(Attachments::Uuid))
                    .col(fk_id_col(manager, Attachments::TaskId))
                    .col(ColumnDef::new(Attachments::Filename).string().not_null())
                    .col(ColumnDef::new(Attachments::Url).text().not_null())
                    .col(fk_id_col(manager, Attachments::UploadedBy))
                    .col(timestamp_col(Attachments::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_attachments_uuid")
                    .table(Attachments::Table)
                    .col(Attachments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_attachments_task_id")
                    .table(Attachments::Table)
                    .col(Attachments::TaskId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Activities::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TimeLogs::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sprints::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkflowStages::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectMembers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Uuid,
    Name,
    Email,
    Avatar,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    OwnerId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProjectMembers {
    Table,
    Id,
    ProjectId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
enum WorkflowStages {
    Table,
    Id,
    ProjectId,
    StageId,
    Name,
    Position,
    Color,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectId,
    Title,
    Description,
    Status,
    Priority,
    AssigneeId,
    ReporterId,
    Labels,
    DueDate,
    SprintId,
    EstimatedHours,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sprints {
    Table,
    Id,
    Uuid,
    ProjectId,
    Name,
    Goal,
    Status,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Comments {
    Table,
    Id,
    Uuid,
    TaskId,
    AuthorId,
    Content,
    ParentCommentId,
    Mentions,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TimeLogs {
    Table,
    Id,
    Uuid,
    TaskId,
    UserId,
    StartTime,
    EndTime,
    DurationHours,
    Note,
    IsRunning,
    RunningUserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Activities {
    Table,
    Id,
    Uuid,
    ProjectId,
    UserId,
    Action,
    EntityType,
    EntityUuid,
    Details,
    CreatedAt,
}

#[derive(Iden)]
enum Attachments {
    Table,
    Id,
    Uuid,
    TaskId,
    Filename,
    Url,
    UploadedBy,
    CreatedAt,
}

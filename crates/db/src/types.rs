use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Project role, totally ordered for permission checks.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "title_case")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "project_manager")]
    ProjectManager,
    #[default]
    #[sea_orm(string_value = "team_member")]
    TeamMember,
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::ProjectManager => 2,
            Role::TeamMember => 1,
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SprintStatus {
    #[default]
    #[sea_orm(string_value = "planning")]
    Planning,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Closed set of auditable actions; the activity feed never carries
/// anything outside this list.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityAction {
    #[sea_orm(string_value = "project_created")]
    ProjectCreated,
    #[sea_orm(string_value = "task_created")]
    TaskCreated,
    #[sea_orm(string_value = "task_updated")]
    TaskUpdated,
    #[sea_orm(string_value = "task_moved")]
    TaskMoved,
    #[sea_orm(string_value = "task_deleted")]
    TaskDeleted,
    #[sea_orm(string_value = "task_assigned")]
    TaskAssigned,
    #[sea_orm(string_value = "comment_added")]
    CommentAdded,
    #[sea_orm(string_value = "file_uploaded")]
    FileUploaded,
    #[sea_orm(string_value = "sprint_created")]
    SprintCreated,
    #[sea_orm(string_value = "sprint_updated")]
    SprintUpdated,
    #[sea_orm(string_value = "member_added")]
    MemberAdded,
    #[sea_orm(string_value = "member_removed")]
    MemberRemoved,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityEntityType {
    #[sea_orm(string_value = "task")]
    Task,
    #[sea_orm(string_value = "sprint")]
    Sprint,
    #[sea_orm(string_value = "comment")]
    Comment,
    #[sea_orm(string_value = "project")]
    Project,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_rank_is_totally_ordered() {
        assert!(Role::Admin.rank() > Role::ProjectManager.rank());
        assert!(Role::ProjectManager.rank() > Role::TeamMember.rank());
    }

    #[test]
    fn role_display_matches_user_facing_names() {
        assert_eq!(Role::ProjectManager.to_string(), "Project Manager");
        assert_eq!(Role::TeamMember.to_string(), "Team Member");
        assert_eq!(Role::Admin.to_string(), "Admin");
    }
}

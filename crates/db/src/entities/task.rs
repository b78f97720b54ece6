use sea_orm::JsonValue;
use sea_orm::entity::prelude::*;

use crate::types::TaskPriority;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// One of the owning project's workflow stage ids, by convention.
    pub status: String,
    pub priority: TaskPriority,
    pub assignee_id: Option<i64>,
    pub reporter_id: i64,
    pub labels: JsonValue,
    pub due_date: Option<DateTimeUtc>,
    pub sprint_id: Option<i64>,
    pub estimated_hours: f64,
    pub sort_order: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "time_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub task_id: i64,
    pub user_id: i64,
    pub start_time: DateTimeUtc,
    pub end_time: Option<DateTimeUtc>,
    pub duration_hours: f64,
    pub note: Option<String>,
    pub is_running: bool,
    /// Set to the owning user while running, NULL otherwise. A unique index
    /// on this column is the authoritative one-running-timer-per-user guard.
    pub running_user_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::sprint, models::ids, types::SprintStatus};

#[derive(Debug, Error)]
pub enum SprintError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Sprint not found")]
    SprintNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("End date must be after start date")]
    InvalidDateRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSprint {
    pub project_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSprint {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<SprintStatus>,
}

/// Status derived from the sprint window. Cancelled is sticky.
fn derived_status(current: SprintStatus, start: DateTime<Utc>, end: DateTime<Utc>) -> SprintStatus {
    if current == SprintStatus::Cancelled {
        return SprintStatus::Cancelled;
    }
    let now = Utc::now();
    if now < start {
        SprintStatus::Planning
    } else if now <= end {
        SprintStatus::Active
    } else {
        SprintStatus::Completed
    }
}

impl Sprint {
    async fn from_model<C: ConnectionTrait>(db: &C, model: sprint::Model) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            project_id,
            name: model.name,
            goal: model.goal,
            status: model.status,
            start_date: model.start_date.into(),
            end_date: model.end_date.into(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = sprint::Entity::find()
            .filter(sprint::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Self>, SprintError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(SprintError::ProjectNotFound)?;

        let models = sprint::Entity::find()
            .filter(sprint::Column::ProjectId.eq(project_row_id))
            .order_by_desc(sprint::Column::StartDate)
            .all(db)
            .await?;

        let mut sprints = Vec::with_capacity(models.len());
        for model in models {
            sprints.push(Self::from_model(db, model).await?);
        }
        Ok(sprints)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateSprint,
        sprint_id: Uuid,
    ) -> Result<Self, SprintError> {
        if data.end_date <= data.start_date {
            return Err(SprintError::InvalidDateRange);
        }
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(SprintError::ProjectNotFound)?;

        let now = Utc::now();
        let active = sprint::ActiveModel {
            uuid: Set(sprint_id),
            project_id: Set(project_row_id),
            name: Set(data.name.clone()),
            goal: Set(data.goal.clone()),
            status: Set(SprintStatus::Planning),
            start_date: Set(data.start_date.into()),
            end_date: Set(data.end_date.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateSprint,
    ) -> Result<Self, SprintError> {
        let record = sprint::Entity::find()
            .filter(sprint::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(SprintError::SprintNotFound)?;

        let start: DateTime<Utc> = payload.start_date.unwrap_or(record.start_date.into());
        let end: DateTime<Utc> = payload.end_date.unwrap_or(record.end_date.into());
        if end <= start {
            return Err(SprintError::InvalidDateRange);
        }

        let mut active: sprint::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.goal.is_some() {
            active.goal = Set(payload.goal.clone());
        }
        active.start_date = Set(start.into());
        active.end_date = Set(end.into());
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Re-derive the status from the sprint window and persist it when it
    /// drifted (read paths call this so boards see Active/Completed without
    /// a writer touching the sprint).
    pub async fn refresh_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Self, SprintError> {
        let record = sprint::Entity::find()
            .filter(sprint::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(SprintError::SprintNotFound)?;

        let next = derived_status(record.status, record.start_date.into(), record.end_date.into());
        if next == record.status {
            return Ok(Self::from_model(db, record).await?);
        }

        let mut active: sprint::ActiveModel = record.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = sprint::Entity::delete_many()
            .filter(sprint::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::time_log, models::ids};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Error)]
pub enum TimeLogError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Time log not found")]
    TimeLogNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("You already have a running timer. Please stop it first.")]
    TimerAlreadyRunning,
    #[error("Timer is not running")]
    TimerNotRunning,
    #[error("You can only manage your own time logs")]
    NotOwner,
    #[error("End time must be after start time")]
    InvalidTimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: f64,
    pub note: Option<String>,
    pub is_running: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `UNIQUE constraint` / `duplicate key` violations on the running-user
/// column are the persistence-layer guard firing; everything else is a real
/// database failure.
fn is_unique_violation(err: &DbErr) -> bool {
    let text = err.to_string();
    text.contains("UNIQUE constraint failed") || text.contains("duplicate key")
}

impl TimeLog {
    async fn from_model<C: ConnectionTrait>(db: &C, model: time_log::Model) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let user_id = ids::user_uuid_by_id(db, model.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        Ok(Self {
            id: model.uuid,
            task_id,
            user_id,
            start_time: model.start_time.into(),
            end_time: model.end_time.map(Into::into),
            duration_hours: model.duration_hours,
            note: model.note,
            is_running: model.is_running,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = time_log::Entity::find()
            .filter(time_log::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, TimeLogError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(TimeLogError::TaskNotFound)?;

        let models = time_log::Entity::find()
            .filter(time_log::Column::TaskId.eq(task_row_id))
            .order_by_desc(time_log::Column::StartTime)
            .all(db)
            .await?;

        let mut logs = Vec::with_capacity(models.len());
        for model in models {
            logs.push(Self::from_model(db, model).await?);
        }
        Ok(logs)
    }

    /// The user's currently running timer, if any. Global across tasks and
    /// projects.
    pub async fn find_running_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = time_log::Entity::find()
            .filter(time_log::Column::RunningUserId.eq(user_id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Start a timer. The pre-insert lookup is an optimization; the unique
    /// index on `running_user_id` is what actually holds the invariant when
    /// two starts race.
    pub async fn start<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        user_id: Uuid,
        note: Option<String>,
        log_id: Uuid,
    ) -> Result<Self, TimeLogError> {
        if Self::find_running_by_user(db, user_id).await?.is_some() {
            return Err(TimeLogError::TimerAlreadyRunning);
        }

        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(TimeLogError::TaskNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
            .map_err(TimeLogError::Database)?;

        let now = Utc::now();
        let active = time_log::ActiveModel {
            uuid: Set(log_id),
            task_id: Set(task_row_id),
            user_id: Set(user_row_id),
            start_time: Set(now.into()),
            end_time: Set(None),
            duration_hours: Set(0.0),
            note: Set(note),
            is_running: Set(true),
            running_user_id: Set(Some(user_id)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        match active.insert(db).await {
            Ok(model) => Ok(Self::from_model(db, model).await?),
            Err(err) if is_unique_violation(&err) => Err(TimeLogError::TimerAlreadyRunning),
            Err(err) => Err(TimeLogError::Database(err)),
        }
    }

    /// Stop a running timer. Only the owning user may stop it; the duration
    /// is derived from the stored timestamps, never supplied by the caller.
    pub async fn stop<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, TimeLogError> {
        let record = time_log::Entity::find()
            .filter(time_log::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TimeLogError::TimeLogNotFound)?;

        let owner_uuid = ids::user_uuid_by_id(db, record.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
            .map_err(TimeLogError::Database)?;
        if owner_uuid != user_id {
            return Err(TimeLogError::NotOwner);
        }
        if !record.is_running {
            return Err(TimeLogError::TimerNotRunning);
        }

        let end = Utc::now();
        let start: DateTime<Utc> = record.start_time.into();
        let duration_hours = (end - start).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR;

        let mut active: time_log::ActiveModel = record.into();
        active.end_time = Set(Some(end.into()));
        active.duration_hours = Set(duration_hours);
        active.is_running = Set(false);
        active.running_user_id = Set(None);
        active.updated_at = Set(end.into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Record a finished interval directly, e.g. retroactive bookkeeping.
    pub async fn create_manual<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        user_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        note: Option<String>,
        log_id: Uuid,
    ) -> Result<Self, TimeLogError> {
        if end_time <= start_time {
            return Err(TimeLogError::InvalidTimeRange);
        }

        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(TimeLogError::TaskNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
            .map_err(TimeLogError::Database)?;

        let duration_hours =
            (end_time - start_time).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR;
        let now = Utc::now();
        let active = time_log::ActiveModel {
            uuid: Set(log_id),
            task_id: Set(task_row_id),
            user_id: Set(user_row_id),
            start_time: Set(start_time.into()),
            end_time: Set(Some(end_time.into())),
            duration_hours: Set(duration_hours),
            note: Set(note),
            is_running: Set(false),
            running_user_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<(), TimeLogError> {
        let record = time_log::Entity::find()
            .filter(time_log::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TimeLogError::TimeLogNotFound)?;

        let owner_uuid = ids::user_uuid_by_id(db, record.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
            .map_err(TimeLogError::Database)?;
        if owner_uuid != user_id {
            return Err(TimeLogError::NotOwner);
        }

        time_log::Entity::delete_many()
            .filter(time_log::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        DBService,
        models::{
            project::{CreateProject, Project},
            task::{CreateTask, Task},
            user::{CreateUser, User},
        },
    };

    async fn setup() -> (DBService, Uuid, Uuid) {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                avatar: None,
            },
            user_id,
        )
        .await
        .unwrap();
        let project_id = Uuid::new_v4();
        Project::create(
            &db.pool,
            &CreateProject {
                name: "Board".to_string(),
                description: None,
            },
            project_id,
            user_id,
        )
        .await
        .unwrap();
        let task_id = Uuid::new_v4();
        Task::create(
            &db.pool,
            &CreateTask {
                project_id,
                title: "task".to_string(),
                description: None,
                status: None,
                priority: None,
                assignee_id: None,
                labels: None,
                due_date: None,
                sprint_id: None,
                estimated_hours: None,
            },
            task_id,
            user_id,
        )
        .await
        .unwrap();
        (db, task_id, user_id)
    }

    #[tokio::test]
    async fn second_start_conflicts_and_leaves_first_running() {
        let (db, task_id, user_id) = setup().await;

        let first = TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap();
        assert!(first.is_running);

        let err = TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, TimeLogError::TimerAlreadyRunning));

        let still_running = TimeLog::find_running_by_user(&db.pool, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_running.id, first.id);
    }

    #[tokio::test]
    async fn stop_derives_duration_and_is_not_repeatable() {
        let (db, task_id, user_id) = setup().await;

        let log = TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap();

        let stopped = TimeLog::stop(&db.pool, log.id, user_id).await.unwrap();
        assert!(!stopped.is_running);
        let end = stopped.end_time.unwrap();
        let expected = (end - stopped.start_time).num_milliseconds() as f64 / 3_600_000.0;
        assert!((stopped.duration_hours - expected).abs() < 1e-9);

        let err = TimeLog::stop(&db.pool, log.id, user_id).await.unwrap_err();
        assert!(matches!(err, TimeLogError::TimerNotRunning));

        // The slot freed up: a new timer can start.
        TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn only_the_owner_can_stop_a_timer() {
        let (db, task_id, user_id) = setup().await;
        let other_id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: "Eve".to_string(),
                email: "eve@example.com".to_string(),
                avatar: None,
            },
            other_id,
        )
        .await
        .unwrap();

        let log = TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap();

        let err = TimeLog::stop(&db.pool, log.id, other_id).await.unwrap_err();
        assert!(matches!(err, TimeLogError::NotOwner));
    }

    #[tokio::test]
    async fn different_users_can_run_timers_concurrently() {
        let (db, task_id, user_id) = setup().await;
        let other_id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: "Eve".to_string(),
                email: "eve@example.com".to_string(),
                avatar: None,
            },
            other_id,
        )
        .await
        .unwrap();

        TimeLog::start(&db.pool, task_id, user_id, None, Uuid::new_v4())
            .await
            .unwrap();
        TimeLog::start(&db.pool, task_id, other_id, None, Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn manual_entry_validates_range_and_derives_duration() {
        let (db, task_id, user_id) = setup().await;
        let start = Utc::now() - Duration::hours(2);
        let end = Utc::now();

        let err = TimeLog::create_manual(
            &db.pool,
            task_id,
            user_id,
            end,
            start,
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TimeLogError::InvalidTimeRange));

        let log = TimeLog::create_manual(
            &db.pool,
            task_id,
            user_id,
            start,
            end,
            Some("pairing".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert!(!log.is_running);
        assert!((log.duration_hours - 2.0).abs() < 1e-3);
    }
}

use chrono::{DateTime, Utc};
use db::{
    ConnectionTrait,
    models::{
        task::Task,
        time_log::{TimeLog, TimeLogError},
    },
};
use uuid::Uuid;

/// Timer state machine: Idle → Running → Idle, at most one running log per
/// user globally. Wraps the persistence-backed transitions and resolves the
/// task's project for the room broadcast that follows a transition.
pub struct TimeTracker;

impl TimeTracker {
    pub async fn start<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        user_id: Uuid,
        note: Option<String>,
    ) -> Result<(TimeLog, Uuid), TimeLogError> {
        let task = Task::find_by_id(db, task_id)
            .await?
            .ok_or(TimeLogError::TaskNotFound)?;

        let log = TimeLog::start(db, task_id, user_id, note, Uuid::new_v4()).await?;
        Ok((log, task.project_id))
    }

    pub async fn stop<C: ConnectionTrait>(
        db: &C,
        log_id: Uuid,
        user_id: Uuid,
    ) -> Result<(TimeLog, Uuid), TimeLogError> {
        let log = TimeLog::stop(db, log_id, user_id).await?;
        let task = Task::find_by_id(db, log.task_id)
            .await?
            .ok_or(TimeLogError::TaskNotFound)?;
        Ok((log, task.project_id))
    }

    pub async fn add_manual<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        user_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<TimeLog, TimeLogError> {
        TimeLog::create_manual(db, task_id, user_id, start_time, end_time, note, Uuid::new_v4())
            .await
    }

    pub async fn running_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<TimeLog>, TimeLogError> {
        Ok(TimeLog::find_running_by_user(db, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::{CreateProject, Project},
            task::CreateTask,
            user::{CreateUser, User},
        },
    };

    use super::*;

    async fn setup() -> (DBService, Uuid, Uuid, Uuid) {
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
        (db, project_id, task_id, user_id)
    }

    #[tokio::test]
    async fn start_resolves_the_project_for_broadcast() {
        let (db, project_id, task_id, user_id) = setup().await;

        let (log, resolved_project) = TimeTracker::start(&db.pool, task_id, user_id, None)
            .await
            .unwrap();
        assert_eq!(resolved_project, project_id);
        assert!(log.is_running);

        let err = TimeTracker::start(&db.pool, task_id, user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TimeLogError::TimerAlreadyRunning));

        let (stopped, _) = TimeTracker::stop(&db.pool, log.id, user_id).await.unwrap();
        assert!(!stopped.is_running);
        assert!(stopped.duration_hours >= 0.0);
    }

    #[tokio::test]
    async fn start_on_unknown_task_is_not_found() {
        let (db, _, _, user_id) = setup().await;

        let err = TimeTracker::start(&db.pool, Uuid::new_v4(), user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TimeLogError::TaskNotFound));
    }
}

use db::{
    ConnectionTrait,
    models::activity::{Activity, CreateActivity},
};

pub struct ActivityRecorder;

impl ActivityRecorder {
    /// Append an audit entry, best-effort. A failed write is logged and
    /// swallowed; it never rolls back or fails the mutation that triggered
    /// it.
    pub async fn record<C: ConnectionTrait>(db: &C, entry: CreateActivity) {
        if let Err(err) = Activity::record(db, &entry).await {
            tracing::warn!(
                action = %entry.action,
                project_id = %entry.project_id,
                error = %err,
                "Failed to record activity entry"
            );
        }
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
        types::{ActivityAction, ActivityEntityType},
    };
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn recording_against_a_missing_project_is_swallowed() {
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

        // Does not panic or propagate.
        ActivityRecorder::record(
            &db.pool,
            CreateActivity {
                project_id: Uuid::new_v4(),
                user_id,
                action: ActivityAction::TaskCreated,
                entity_type: ActivityEntityType::Task,
                entity_id: Uuid::new_v4(),
                details: json!({}),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn successful_record_lands_in_the_feed() {
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

        ActivityRecorder::record(
            &db.pool,
            CreateActivity {
                project_id,
                user_id,
                action: ActivityAction::TaskCreated,
                entity_type: ActivityEntityType::Task,
                entity_id: Uuid::new_v4(),
                details: json!({ "task_title": "x" }),
            },
        )
        .await;

        let page = Activity::find_by_project(&db.pool, project_id, 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}

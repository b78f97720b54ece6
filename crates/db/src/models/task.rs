use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::task,
    models::{ids, project::Project},
    types::TaskPriority,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Status '{0}' is not part of the project workflow")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub labels: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub sprint_id: Option<Uuid>,
    pub estimated_hours: f64,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub labels: Option<Vec<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub sprint_id: Option<Uuid>,
    pub estimated_hours: Option<f64>,
}

/// Field update payload. Double-`Option` fields distinguish "leave as is"
/// (absent) from "clear" (explicit null).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assignee_id: Option<Option<Uuid>>,
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub sprint_id: Option<Option<Uuid>>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub assignee: Option<Uuid>,
    pub sprint: Option<Uuid>,
    pub priority: Option<TaskPriority>,
}

fn labels_from_json(value: &Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn changed(changes: &mut Map<String, Value>, field: &str, old: Value, new: Value) {
    if old != new {
        changes.insert(field.to_string(), json!({ "old": old, "new": new }));
    }
}

impl Task {
    async fn from_model<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let reporter_id = ids::user_uuid_by_id(db, model.reporter_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Reporter not found".to_string()))?;
        let assignee_id = match model.assignee_id {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };
        let sprint_id = match model.sprint_id {
            Some(id) => ids::sprint_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            project_id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            assignee_id,
            reporter_id,
            labels: labels_from_json(&model.labels),
            due_date: model.due_date.map(Into::into),
            sprint_id,
            estimated_hours: model.estimated_hours,
            sort_order: model.sort_order,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn find_record<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<task::Model, TaskError> {
        task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)
    }

    async fn assert_valid_status<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        status: &str,
    ) -> Result<(), TaskError> {
        let workflow = Project::workflow(db, project_id).await?;
        if workflow.iter().any(|stage| stage.id == status) {
            Ok(())
        } else {
            Err(TaskError::UnknownStatus(status.to_string()))
        }
    }

    /// Next position at the bottom of a status column.
    async fn next_sort_order<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
        status: &str,
    ) -> Result<i32, DbErr> {
        let top = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .filter(task::Column::Status.eq(status))
            .order_by_desc(task::Column::SortOrder)
            .one(db)
            .await?;
        Ok(top.map(|t| t.sort_order + 1).unwrap_or(0))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
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
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;

        let mut query = task::Entity::find().filter(task::Column::ProjectId.eq(project_row_id));
        if let Some(status) = &filter.status {
            query = query.filter(task::Column::Status.eq(status));
        }
        if let Some(assignee) = filter.assignee {
            let assignee_row_id = ids::user_id_by_uuid(db, assignee).await?;
            query = query.filter(task::Column::AssigneeId.eq(assignee_row_id));
        }
        if let Some(sprint) = filter.sprint {
            let sprint_row_id = ids::sprint_id_by_uuid(db, sprint).await?;
            query = query.filter(task::Column::SprintId.eq(sprint_row_id));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(task::Column::Priority.eq(priority));
        }

        let models = query
            .order_by_asc(task::Column::SortOrder)
            .order_by_desc(task::Column::CreatedAt)
            .all(db)
            .await?;

        let mut tasks = Vec::with_capacity(models.len());
        for model in models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
        reporter_id: Uuid,
    ) -> Result<Self, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        let reporter_row_id = ids::user_id_by_uuid(db, reporter_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Reporter not found".to_string()))
            .map_err(TaskError::Database)?;

        let status = data.status.clone().unwrap_or_else(|| "todo".to_string());
        Self::assert_valid_status(db, data.project_id, &status).await?;

        let assignee_row_id = match data.assignee_id {
            Some(id) => ids::user_id_by_uuid(db, id).await?,
            None => None,
        };
        let sprint_row_id = match data.sprint_id {
            Some(id) => ids::sprint_id_by_uuid(db, id).await?,
            None => None,
        };
        let sort_order = Self::next_sort_order(db, project_row_id, &status).await?;

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            project_id: Set(project_row_id),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            status: Set(status),
            priority: Set(data.priority.unwrap_or_default()),
            assignee_id: Set(assignee_row_id),
            reporter_id: Set(reporter_row_id),
            labels: Set(json!(data.labels.clone().unwrap_or_default())),
            due_date: Set(data.due_date.map(Into::into)),
            sprint_id: Set(sprint_row_id),
            estimated_hours: Set(data.estimated_hours.unwrap_or(0.0)),
            sort_order: Set(sort_order),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    /// Apply a field update and return the new task plus a per-field
    /// `{field: {old, new}}` diff of everything that actually changed.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateTask,
    ) -> Result<(Self, Map<String, Value>), TaskError> {
        let record = Self::find_record(db, id).await?;
        let before = Self::from_model(db, record.clone()).await?;

        let mut changes = Map::new();
        let mut active: task::ActiveModel = record.into();

        if let Some(title) = payload.title.clone() {
            changed(&mut changes, "title", json!(before.title), json!(title));
            active.title = Set(title);
        }
        if let Some(description) = payload.description.clone() {
            let description = (!description.trim().is_empty()).then_some(description);
            changed(
                &mut changes,
                "description",
                json!(before.description),
                json!(description),
            );
            active.description = Set(description);
        }
        if let Some(priority) = payload.priority {
            changed(
                &mut changes,
                "priority",
                json!(before.priority),
                json!(priority),
            );
            active.priority = Set(priority);
        }
        if let Some(assignee_id) = payload.assignee_id {
            changed(
                &mut changes,
                "assignee",
                json!(before.assignee_id),
                json!(assignee_id),
            );
            let assignee_row_id = match assignee_id {
                Some(uuid) => ids::user_id_by_uuid(db, uuid).await?,
                None => None,
            };
            active.assignee_id = Set(assignee_row_id);
        }
        if let Some(labels) = payload.labels.clone() {
            active.labels = Set(json!(labels));
        }
        if let Some(due_date) = payload.due_date {
            changed(
                &mut changes,
                "due_date",
                json!(before.due_date),
                json!(due_date),
            );
            active.due_date = Set(due_date.map(Into::into));
        }
        if let Some(sprint_id) = payload.sprint_id {
            changed(
                &mut changes,
                "sprint",
                json!(before.sprint_id),
                json!(sprint_id),
            );
            let sprint_row_id = match sprint_id {
                Some(uuid) => ids::sprint_id_by_uuid(db, uuid).await?,
                None => None,
            };
            active.sprint_id = Set(sprint_row_id);
        }
        if let Some(estimated_hours) = payload.estimated_hours {
            active.estimated_hours = Set(estimated_hours);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok((Self::from_model(db, updated).await?, changes))
    }

    /// Drag-and-drop move. Returns the updated task and the status it left.
    pub async fn move_to<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        to_status: &str,
        new_order: Option<i32>,
    ) -> Result<(Self, String), TaskError> {
        let record = Self::find_record(db, id).await?;
        let project_id = ids::project_uuid_by_id(db, record.project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        Self::assert_valid_status(db, project_id, to_status).await?;

        let from_status = record.status.clone();
        let mut active: task::ActiveModel = record.into();
        if from_status != to_status {
            active.status = Set(to_status.to_string());
        }
        if let Some(order) = new_order {
            active.sort_order = Set(order);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok((Self::from_model(db, updated).await?, from_status))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            project::{CreateProject, Project},
            user::{CreateUser, User},
        },
    };

    async fn setup() -> (DBService, Uuid, Uuid) {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();
        User::create(
            &db.pool,
            &CreateUser {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
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
        (db, project_id, user_id)
    }

    fn create_payload(project_id: Uuid, title: &str) -> CreateTask {
        CreateTask {
            project_id,
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            assignee_id: None,
            labels: None,
            due_date: None,
            sprint_id: None,
            estimated_hours: None,
        }
    }

    #[tokio::test]
    async fn create_appends_to_status_column() {
        let (db, project_id, user_id) = setup().await;

        let first = Task::create(
            &db.pool,
            &create_payload(project_id, "one"),
            Uuid::new_v4(),
            user_id,
        )
        .await
        .unwrap();
        let second = Task::create(
            &db.pool,
            &create_payload(project_id, "two"),
            Uuid::new_v4(),
            user_id,
        )
        .await
        .unwrap();

        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);
        assert_eq!(first.status, "todo");
        assert_eq!(first.reporter_id, user_id);
    }

    #[tokio::test]
    async fn create_rejects_status_outside_workflow() {
        let (db, project_id, user_id) = setup().await;

        let mut payload = create_payload(project_id, "bad");
        payload.status = Some("shipped".to_string());
        let err = Task::create(&db.pool, &payload, Uuid::new_v4(), user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownStatus(_)));
    }

    #[tokio::test]
    async fn update_reports_only_changed_fields() {
        let (db, project_id, user_id) = setup().await;
        let task = Task::create(
            &db.pool,
            &create_payload(project_id, "one"),
            Uuid::new_v4(),
            user_id,
        )
        .await
        .unwrap();

        let (updated, changes) = Task::update(
            &db.pool,
            task.id,
            &UpdateTask {
                title: Some("renamed".to_string()),
                priority: Some(TaskPriority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"]["old"], "one");
        assert_eq!(changes["title"]["new"], "renamed");
        assert_eq!(changes["priority"]["new"], "high");

        // Same payload again: nothing changes.
        let (_, changes) = Task::update(
            &db.pool,
            task.id,
            &UpdateTask {
                title: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn move_reports_previous_status_and_sets_order() {
        let (db, project_id, user_id) = setup().await;
        let task = Task::create(
            &db.pool,
            &create_payload(project_id, "one"),
            Uuid::new_v4(),
            user_id,
        )
        .await
        .unwrap();

        let (moved, from_status) = Task::move_to(&db.pool, task.id, "review", Some(5))
            .await
            .unwrap();
        assert_eq!(from_status, "todo");
        assert_eq!(moved.status, "review");
        assert_eq!(moved.sort_order, 5);

        let err = Task::move_to(&db.pool, task.id, "nonexistent", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownStatus(_)));
    }
}

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    entities::activity,
    models::ids,
    types::{ActivityAction, ActivityEntityType},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: ActivityEntityType,
    pub entity_id: Uuid,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateActivity {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: ActivityEntityType,
    pub entity_id: Uuid,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<Activity>,
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub has_more: bool,
}

impl Activity {
    async fn from_model<C: ConnectionTrait>(db: &C, model: activity::Model) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_id = ids::user_uuid_by_id(db, model.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        Ok(Self {
            id: model.uuid,
            project_id,
            user_id,
            action: model.action,
            entity_type: model.entity_type,
            entity_id: model.entity_uuid,
            details: model.details,
            created_at: model.created_at.into(),
        })
    }

    /// Append an audit entry. Rows are never updated or deleted afterwards.
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        data: &CreateActivity,
    ) -> Result<Self, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_row_id = ids::user_id_by_uuid(db, data.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let active = activity::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            user_id: Set(user_row_id),
            action: Set(data.action),
            entity_type: Set(data.entity_type),
            entity_uuid: Set(data.entity_id),
            details: Set(data.details.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        limit: u64,
        skip: u64,
    ) -> Result<ActivityPage, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let filter = activity::Column::ProjectId.eq(project_row_id);
        let total = activity::Entity::find()
            .filter(filter.clone())
            .count(db)
            .await?;
        let models = activity::Entity::find()
            .filter(filter)
            .order_by_desc(activity::Column::CreatedAt)
            .offset(skip)
            .limit(limit)
            .all(db)
            .await?;

        Self::page(db, models, total, limit, skip).await
    }

    pub async fn find_by_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        limit: u64,
        skip: u64,
    ) -> Result<ActivityPage, DbErr> {
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let filter = activity::Column::UserId.eq(user_row_id);
        let total = activity::Entity::find()
            .filter(filter.clone())
            .count(db)
            .await?;
        let models = activity::Entity::find()
            .filter(filter)
            .order_by_desc(activity::Column::CreatedAt)
            .offset(skip)
            .limit(limit)
            .all(db)
            .await?;

        Self::page(db, models, total, limit, skip).await
    }

    async fn page<C: ConnectionTrait>(
        db: &C,
        models: Vec<activity::Model>,
        total: u64,
        limit: u64,
        skip: u64,
    ) -> Result<ActivityPage, DbErr> {
        let mut activities = Vec::with_capacity(models.len());
        for model in models {
            activities.push(Self::from_model(db, model).await?);
        }
        let has_more = total > skip + activities.len() as u64;
        Ok(ActivityPage {
            activities,
            total,
            limit,
            skip,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

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
        (db, project_id, user_id)
    }

    #[tokio::test]
    async fn feed_is_paginated_newest_first() {
        let (db, project_id, user_id) = setup().await;

        for i in 0..5 {
            Activity::record(
                &db.pool,
                &CreateActivity {
                    project_id,
                    user_id,
                    action: ActivityAction::TaskCreated,
                    entity_type: ActivityEntityType::Task,
                    entity_id: Uuid::new_v4(),
                    details: json!({ "task_title": format!("t{i}") }),
                },
            )
            .await
            .unwrap();
        }

        let page = Activity::find_by_project(&db.pool, project_id, 2, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.activities.len(), 2);
        assert!(page.has_more);

        let last = Activity::find_by_project(&db.pool, project_id, 2, 4)
            .await
            .unwrap();
        assert_eq!(last.activities.len(), 1);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn user_feed_filters_by_actor() {
        let (db, project_id, user_id) = setup().await;

        Activity::record(
            &db.pool,
            &CreateActivity {
                project_id,
                user_id,
                action: ActivityAction::ProjectCreated,
                entity_type: ActivityEntityType::Project,
                entity_id: project_id,
                details: json!({}),
            },
        )
        .await
        .unwrap();

        let page = Activity::find_by_user(&db.pool, user_id, 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.activities[0].action, ActivityAction::ProjectCreated);
    }
}

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::comment, models::ids};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Comment not found")]
    CommentNotFound,
    #[error("Task not found")]
    TaskNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    pub mentions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    pub mentions: Option<Vec<Uuid>>,
}

impl Comment {
    async fn from_model<C: ConnectionTrait>(db: &C, model: comment::Model) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let author_id = ids::user_uuid_by_id(db, model.author_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Author not found".to_string()))?;
        let parent_comment_id = match model.parent_comment_id {
            Some(id) => {
                comment::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .map(|parent| parent.uuid)
            }
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            task_id,
            author_id,
            content: model.content,
            parent_comment_id,
            mentions: serde_json::from_value(model.mentions).unwrap_or_default(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = comment::Entity::find()
            .filter(comment::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Comments on a task, oldest first, threads flattened.
    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, CommentError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(CommentError::TaskNotFound)?;

        let models = comment::Entity::find()
            .filter(comment::Column::TaskId.eq(task_row_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(db)
            .await?;

        let mut comments = Vec::with_capacity(models.len());
        for model in models {
            comments.push(Self::from_model(db, model).await?);
        }
        Ok(comments)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateComment,
        comment_id: Uuid,
        author_id: Uuid,
    ) -> Result<Self, CommentError> {
        let task_row_id = ids::task_id_by_uuid(db, data.task_id)
            .await?
            .ok_or(CommentError::TaskNotFound)?;
        let author_row_id = ids::user_id_by_uuid(db, author_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Author not found".to_string()))
            .map_err(CommentError::Database)?;
        let parent_row_id = match data.parent_comment_id {
            Some(parent_uuid) => {
                comment::Entity::find()
                    .filter(comment::Column::Uuid.eq(parent_uuid))
                    .one(db)
                    .await?
                    .map(|parent| parent.id)
            }
            None => None,
        };

        let now = Utc::now();
        let active = comment::ActiveModel {
            uuid: Set(comment_id),
            task_id: Set(task_row_id),
            author_id: Set(author_row_id),
            content: Set(data.content.clone()),
            parent_comment_id: Set(parent_row_id),
            mentions: Set(json!(data.mentions.clone().unwrap_or_default())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update_content<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        content: String,
    ) -> Result<Self, CommentError> {
        let record = comment::Entity::find()
            .filter(comment::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(CommentError::CommentNotFound)?;

        let mut active: comment::ActiveModel = record.into();
        active.content = Set(content);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = comment::Entity::delete_many()
            .filter(comment::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

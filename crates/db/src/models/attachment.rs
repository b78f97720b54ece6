use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{entities::attachment, models::ids};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Attachment not found")]
    AttachmentNotFound,
    #[error("Task not found")]
    TaskNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub filename: String,
    pub url: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAttachment {
    pub filename: String,
    pub url: String,
}

impl Attachment {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: attachment::Model,
    ) -> Result<Self, DbErr> {
        let task_id = ids::task_uuid_by_id(db, model.task_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let uploaded_by = ids::user_uuid_by_id(db, model.uploaded_by)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        Ok(Self {
            id: model.uuid,
            task_id,
            filename: model.filename,
            url: model.url,
            uploaded_by,
            created_at: model.created_at.into(),
        })
    }

    pub async fn find_by_task<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Vec<Self>, AttachmentError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(AttachmentError::TaskNotFound)?;

        let models = attachment::Entity::find()
            .filter(attachment::Column::TaskId.eq(task_row_id))
            .order_by_asc(attachment::Column::CreatedAt)
            .all(db)
            .await?;

        let mut attachments = Vec::with_capacity(models.len());
        for model in models {
            attachments.push(Self::from_model(db, model).await?);
        }
        Ok(attachments)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        data: &CreateAttachment,
        uploaded_by: Uuid,
        attachment_id: Uuid,
    ) -> Result<Self, AttachmentError> {
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(AttachmentError::TaskNotFound)?;
        let uploader_row_id = ids::user_id_by_uuid(db, uploaded_by)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
            .map_err(AttachmentError::Database)?;

        let active = attachment::ActiveModel {
            uuid: Set(attachment_id),
            task_id: Set(task_row_id),
            filename: Set(data.filename.clone()),
            url: Set(data.url.clone()),
            uploaded_by: Set(uploader_row_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), AttachmentError> {
        let result = attachment::Entity::delete_many()
            .filter(attachment::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AttachmentError::AttachmentNotFound);
        }
        Ok(())
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        attachment::AttachmentError, comment::CommentError, project::ProjectError,
        sprint::SprintError, task::TaskError, time_log::TimeLogError, user::UserError,
    },
};
use services::services::{auth::AuthError, permissions::PermissionError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error(transparent)]
    Sprint(#[from] SprintError),
    #[error(transparent)]
    TimeLog(#[from] TimeLogError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound | ProjectError::UserNotFound
                | ProjectError::MemberNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                ProjectError::AlreadyMember => (StatusCode::CONFLICT, "ProjectError"),
                ProjectError::OwnerImmutable => (StatusCode::BAD_REQUEST, "ProjectError"),
                ProjectError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound | TaskError::ProjectNotFound => {
                    (StatusCode::NOT_FOUND, "TaskError")
                }
                TaskError::UnknownStatus(_) => (StatusCode::BAD_REQUEST, "TaskError"),
                TaskError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Comment(err) => match err {
                CommentError::CommentNotFound | CommentError::TaskNotFound => {
                    (StatusCode::NOT_FOUND, "CommentError")
                }
                CommentError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CommentError"),
            },
            ApiError::Sprint(err) => match err {
                SprintError::SprintNotFound | SprintError::ProjectNotFound => {
                    (StatusCode::NOT_FOUND, "SprintError")
                }
                SprintError::InvalidDateRange => (StatusCode::BAD_REQUEST, "SprintError"),
                SprintError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SprintError"),
            },
            ApiError::TimeLog(err) => match err {
                TimeLogError::TimeLogNotFound | TimeLogError::TaskNotFound => {
                    (StatusCode::NOT_FOUND, "TimeLogError")
                }
                TimeLogError::TimerAlreadyRunning | TimeLogError::TimerNotRunning => {
                    (StatusCode::CONFLICT, "TimeLogError")
                }
                TimeLogError::NotOwner => (StatusCode::FORBIDDEN, "TimeLogError"),
                TimeLogError::InvalidTimeRange => (StatusCode::BAD_REQUEST, "TimeLogError"),
                TimeLogError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TimeLogError"),
            },
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::EmailTaken => (StatusCode::CONFLICT, "UserError"),
                UserError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Attachment(err) => match err {
                AttachmentError::AttachmentNotFound | AttachmentError::TaskNotFound => {
                    (StatusCode::NOT_FOUND, "AttachmentError")
                }
                AttachmentError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "AttachmentError")
                }
            },
            ApiError::Permission(err) => match err {
                PermissionError::ProjectNotFound => (StatusCode::NOT_FOUND, "PermissionError"),
                PermissionError::NoAccess
                | PermissionError::RequiresRole(_)
                | PermissionError::OwnerOnly => (StatusCode::FORBIDDEN, "PermissionError"),
                PermissionError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PermissionError")
                }
            },
            ApiError::Auth(err) => match err {
                AuthError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AuthError"),
                _ => (StatusCode::UNAUTHORIZED, "AuthError"),
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let error_message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Internal(msg) => msg.clone(),
            _ if status_code.is_server_error() => format!("{}: {}", error_type, self),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::types::Role;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("conflict".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_taxonomy_statuses() {
        assert_eq!(
            ApiError::from(ProjectError::ProjectNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ProjectError::AlreadyMember)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(TimeLogError::TimerAlreadyRunning)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(TimeLogError::NotOwner)
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(PermissionError::RequiresRole(Role::ProjectManager))
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::MissingToken)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TaskError::UnknownStatus("nope".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}

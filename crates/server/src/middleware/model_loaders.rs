use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use db::models::{comment::Comment, task::Task};
use uuid::Uuid;

use crate::AppState;

async fn fetch_model_or_status<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, StatusCode>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<Response, StatusCode>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_status(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_task_middleware(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    load_request_extension(
        request,
        next,
        "Task",
        task_id,
        Task::find_by_id(&state.db().pool, task_id),
    )
    .await
}

pub async fn load_comment_middleware(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    load_request_extension(
        request,
        next,
        "Comment",
        comment_id,
        Comment::find_by_id(&state.db().pool, comment_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::fetch_model_or_status;

    #[tokio::test]
    async fn fetch_model_or_status_returns_not_found_on_missing_model() {
        let result = fetch_model_or_status::<String, &'static str, _>(
            "Task",
            uuid::Uuid::new_v4(),
            async { Ok(None) },
        )
        .await;

        assert_eq!(result.unwrap_err(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_model_or_status_returns_internal_error_on_fetch_failure() {
        let result = fetch_model_or_status::<String, &'static str, _>(
            "Task",
            uuid::Uuid::new_v4(),
            async { Err("db unavailable") },
        )
        .await;

        assert_eq!(
            result.unwrap_err(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

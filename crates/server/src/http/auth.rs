use axum::{
    Json,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::form_urlencoded;
use utils::response::ApiResponse;

use crate::AppState;

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_query_token(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "token" {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }
    }
    None
}

fn is_websocket_request(req: &Request) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

fn extract_request_token(req: &Request) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // 2) Query param token for WebSocket handshakes, where the browser
    // cannot set headers.
    if is_websocket_request(req) {
        return extract_query_token(req);
    }

    None
}

/// Bearer-auth boundary for the `/api` router. Resolves the token to an
/// active user and stashes the identity as a request extension; everything
/// downstream can rely on `Extension<AuthUser>` being present.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = extract_request_token(&req) else {
        return unauthorized_response(&req, "missing_token");
    };

    match state.auth().authenticate(&token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "Token rejected");
            unauthorized_response(&req, "invalid_token")
        }
    }
}

fn unauthorized_response(req: &Request, reason: &'static str) -> Response {
    tracing::warn!(
        path = %req.uri().path(),
        method = %req.method(),
        reason,
        "Unauthorized API request"
    );
    let response = ApiResponse::<()>::error("Unauthorized");
    (axum::http::StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

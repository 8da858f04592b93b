//! Middleware for authentication, role checks and security headers

use crate::handlers::auth::{extract_session_token, hash_token};
use crate::handlers::AppState;
use crate::models::{Session, User, UserRole};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Authenticated user extracted by middleware, available via Extension<User>
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers();
    let token = extract_session_token(headers);

    let token = match token {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "Not authenticated"})),
            )
                .into_response();
        }
    };

    let token_hash = hash_token(&token);

    // Find valid session
    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await;

    let session = match session {
        Ok(Some(s)) => s,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "Session expired or invalid"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error during session validation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response();
        }
    };

    // Get associated user
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(&state.pool)
        .await;

    let user = match user {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"success": false, "error": "User not found"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response();
        }
    };

    // Insert User into request extensions
    let mut request = request;
    request.extensions_mut().insert(user);

    next.run(request).await
}

/// Admin gate. Must run inside `require_auth` so the user extension exists.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<User>() {
        Some(user) if user.role == UserRole::Admin => next.run(request).await,
        Some(_) => (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"success": false, "error": "Admin access required"})),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Not authenticated"})),
        )
            .into_response(),
    }
}

/// Gate for maintenance record management: admins and maintenance staff.
pub async fn require_maintenance_staff(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<User>() {
        Some(user) if matches!(user.role, UserRole::Admin | UserRole::Maintenance) => {
            next.run(request).await
        }
        Some(_) => (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"success": false, "error": "Maintenance access required"})),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Not authenticated"})),
        )
            .into_response(),
    }
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; form-action 'self'; base-uri 'self'; frame-ancestors 'none'",
        ),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.edu".to_string(),
            role,
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn ok() -> StatusCode {
        StatusCode::OK
    }

    fn admin_app() -> Router {
        Router::new()
            .route("/", get(ok))
            .route_layer(axum::middleware::from_fn(require_admin))
    }

    fn staff_app() -> Router {
        Router::new()
            .route("/", get(ok))
            .route_layer(axum::middleware::from_fn(require_maintenance_staff))
    }

    fn request_as(user: Option<User>) -> Request<Body> {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        if let Some(user) = user {
            request.extensions_mut().insert(user);
        }
        request
    }

    #[tokio::test]
    async fn admin_gate_rejects_non_admin() {
        let res = admin_app()
            .oneshot(request_as(Some(test_user(UserRole::Student))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_gate_passes_admin() {
        let res = admin_app()
            .oneshot(request_as(Some(test_user(UserRole::Admin))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_gate_requires_authentication() {
        let res = admin_app().oneshot(request_as(None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn maintenance_gate_accepts_both_staff_roles() {
        for role in [UserRole::Admin, UserRole::Maintenance] {
            let res = staff_app()
                .oneshot(request_as(Some(test_user(role))))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn maintenance_gate_rejects_other_roles() {
        for role in [UserRole::Student, UserRole::Faculty] {
            let res = staff_app()
                .oneshot(request_as(Some(test_user(role))))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::FORBIDDEN);
        }
    }
}

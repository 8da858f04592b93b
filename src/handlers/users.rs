//! User management handlers (admin only)

use crate::models::*;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::auth::hash_password;
use super::resources::log_audit;
use super::AppState;

// =============================================================================
// User Listing
// =============================================================================

/// List all users
pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.pool)
        .await;

    match users {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(ApiResponse::success(users)))
        }
        Err(e) => {
            tracing::error!("Failed to fetch users: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to fetch users")),
            )
        }
    }
}

// =============================================================================
// User Creation
// =============================================================================

/// Create a user with any role
pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Json(input): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(e) = input.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(e.to_string())),
        );
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(&input.email)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(false);

    if exists {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("A user with this email already exists")),
        );
    }

    let password_hash = match hash_password(&input.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create user")),
            );
        }
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(&password_hash)
    .bind(input.role)
    .fetch_one(&state.pool)
    .await;

    match user {
        Ok(user) => {
            log_audit(
                &state.pool,
                "user_created",
                "user",
                Some(user.id),
                Some(actor.id),
            )
            .await;
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create user")),
            )
        }
    }
}

// =============================================================================
// User Update
// =============================================================================

/// Update a user's profile; the password only changes when one is provided
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    if let Err(e) = input.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(e.to_string())),
        );
    }

    // The email may only collide with the user being updated
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id <> $2)",
    )
    .bind(&input.email)
    .bind(id)
    .fetch_one(&state.pool)
    .await
    .unwrap_or(false);

    if taken {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Email is already taken by another user")),
        );
    }

    let password_hash = match input.password.as_deref() {
        Some(password) => match hash_password(password) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!("Failed to hash password: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to update user")),
                );
            }
        },
        None => None,
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = $1, email = $2, role = $3,
            password_hash = COALESCE($4, password_hash)
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(input.role)
    .bind(password_hash)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match user {
        Ok(Some(user)) => {
            log_audit(
                &state.pool,
                "user_updated",
                "user",
                Some(user.id),
                Some(actor.id),
            )
            .await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update user {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update user")),
            )
        }
    }
}

// =============================================================================
// User Deletion
// =============================================================================

/// Delete a user; admins cannot delete their own account
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if actor.id == id {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error("Cannot delete your own account")),
        );
    }

    let result = sqlx::query_scalar::<_, Uuid>("DELETE FROM users WHERE id = $1 RETURNING id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    match result {
        Ok(Some(_)) => {
            log_audit(&state.pool, "user_deleted", "user", Some(id), Some(actor.id)).await;
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete user {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete user")),
            )
        }
    }
}

// =============================================================================
// Role Update
// =============================================================================

/// Change a user's role; admins cannot change their own
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserRoleRequest>,
) -> impl IntoResponse {
    if actor.id == id {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(
                "Cannot change your own role",
            )),
        );
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET role = $1 WHERE id = $2 RETURNING *",
    )
    .bind(input.role)
    .bind(id)
    .fetch_optional(&state.pool)
    .await;

    match user {
        Ok(Some(user)) => {
            log_audit(
                &state.pool,
                "user_role_updated",
                "user",
                Some(user.id),
                Some(actor.id),
            )
            .await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(UserResponse::from(user))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update role for {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update user role")),
            )
        }
    }
}

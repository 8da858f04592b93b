//! Booking handlers
//!
//! Bookings are requests: they enter as `pending` and an admin decides them.
//! The decision endpoint enforces the transition policy from the status
//! module and stamps the deciding admin as approver on both outcomes.

use crate::models::*;
use crate::status::booking_transition_allowed;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::resources::log_audit;
use super::AppState;

// =============================================================================
// Booking Listing
// =============================================================================

/// List all bookings with resource, requester and approver names
pub async fn list_bookings(State(state): State<AppState>) -> impl IntoResponse {
    let bookings = sqlx::query_as::<_, BookingWithDetails>(
        r#"
        SELECT b.*,
               r.name AS resource_name,
               u.name AS user_name,
               a.name AS approver_name
        FROM bookings b
        LEFT JOIN resources r ON r.id = b.resource_id
        LEFT JOIN users u ON u.id = b.user_id
        LEFT JOIN users a ON a.id = b.approver_id
        ORDER BY b.created_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await;

    match bookings {
        Ok(bookings) => (StatusCode::OK, Json(ApiResponse::success(bookings))),
        Err(e) => {
            tracing::error!("Failed to fetch bookings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to fetch bookings")),
            )
        }
    }
}

// =============================================================================
// Booking Creation
// =============================================================================

/// Request a booking.
///
/// Regular users always book for themselves; admins may pass a `user_id` to
/// book on someone's behalf.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Json(input): Json<CreateBooking>,
) -> impl IntoResponse {
    let user_id = if actor.role == UserRole::Admin {
        input.user_id.unwrap_or(actor.id)
    } else {
        actor.id
    };

    // Unknown resources get a 404 instead of surfacing the FK violation
    let resource_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM resources WHERE id = $1)")
            .bind(input.resource_id)
            .fetch_one(&state.pool)
            .await
            .unwrap_or(false);

    if !resource_exists {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<Booking>::error("Resource not found")),
        );
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (resource_id, user_id, start_datetime, end_datetime, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(input.resource_id)
    .bind(user_id)
    .bind(input.start_datetime)
    .bind(input.end_datetime)
    .bind(BookingStatus::Pending)
    .fetch_one(&state.pool)
    .await;

    match booking {
        Ok(booking) => {
            log_audit(
                &state.pool,
                "booking_requested",
                "booking",
                Some(booking.id),
                Some(actor.id),
            )
            .await;
            (StatusCode::CREATED, Json(ApiResponse::success(booking)))
        }
        Err(e) => {
            tracing::error!("Failed to create booking: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create booking")),
            )
        }
    }
}

// =============================================================================
// Booking Decision
// =============================================================================

/// Approve or reject a pending booking
pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBookingStatusRequest>,
) -> impl IntoResponse {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    let booking = match booking {
        Ok(Some(b)) => b,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Booking>::error("Booking not found")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to fetch booking {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if !booking_transition_allowed(booking.status, input.status) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Only pending bookings can be approved or rejected",
            )),
        );
    }

    // Guarded update: the status check re-runs in the statement so a
    // concurrent decision cannot apply twice.
    let updated = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET status = $1, approver_id = $2
        WHERE id = $3 AND status = $4
        RETURNING *
        "#,
    )
    .bind(input.status)
    .bind(actor.id)
    .bind(id)
    .bind(BookingStatus::Pending)
    .fetch_optional(&state.pool)
    .await;

    match updated {
        Ok(Some(updated)) => {
            let action = match input.status {
                BookingStatus::Approved => "booking_approved",
                BookingStatus::Rejected => "booking_rejected",
                BookingStatus::Pending => "booking_updated",
            };
            log_audit(&state.pool, action, "booking", Some(id), Some(actor.id)).await;

            (StatusCode::OK, Json(ApiResponse::success(updated)))
        }
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Only pending bookings can be approved or rejected",
            )),
        ),
        Err(e) => {
            tracing::error!("Failed to update booking {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update booking status")),
            )
        }
    }
}

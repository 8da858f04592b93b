//! Dashboard and reporting handlers

use crate::models::*;
use crate::status::active_statuses;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::AppState;

// =============================================================================
// Dashboard
// =============================================================================

/// Dashboard statistics: totals, live allocation count and breakdowns
pub async fn get_dashboard_stats(State(state): State<AppState>) -> impl IntoResponse {
    let total_resources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources")
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

    let maintenance_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM maintenance WHERE status = ANY($1)")
            .bind(active_statuses())
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

    // Approved bookings whose window covers this moment
    let active_allocations: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE status = $1
        AND start_datetime <= NOW() AND end_datetime >= NOW()
        "#,
    )
    .bind(BookingStatus::Approved)
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let bookings_by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM bookings
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let maintenance_by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM maintenance
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let resources_by_type = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT rt.name, COUNT(*) as count
        FROM resources r
        JOIN resource_types rt ON rt.id = r.resource_type_id
        GROUP BY rt.name
        ORDER BY rt.name
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    (
        StatusCode::OK,
        Json(ApiResponse::success(json!({
            "total_resources": total_resources,
            "total_users": total_users,
            "maintenance_count": maintenance_count,
            "active_allocations": active_allocations,
            "booking_status_data": name_value_pairs(bookings_by_status),
            "maintenance_status_data": name_value_pairs(maintenance_by_status),
            "resource_type_data": name_value_pairs(resources_by_type),
        }))),
    )
}

/// The five most recent booking requests
pub async fn get_recent_activity(State(state): State<AppState>) -> impl IntoResponse {
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
        LIMIT 5
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    (StatusCode::OK, Json(ApiResponse::success(bookings)))
}

// =============================================================================
// Reports
// =============================================================================

/// Report data: status breakdowns and the five most-booked resources
pub async fn get_report_data(State(state): State<AppState>) -> impl IntoResponse {
    let bookings_by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM bookings
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let maintenance_by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM maintenance
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let resource_usage = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT r.name, COUNT(*) as count
        FROM bookings b
        JOIN resources r ON r.id = b.resource_id
        GROUP BY r.id, r.name
        ORDER BY count DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let resource_usage: Vec<serde_json::Value> = resource_usage
        .into_iter()
        .map(|(name, count)| json!({"name": name, "count": count}))
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(json!({
            "bookings_by_status": name_value_pairs(bookings_by_status),
            "maintenance_by_status": name_value_pairs(maintenance_by_status),
            "resource_usage": resource_usage,
        }))),
    )
}

fn name_value_pairs(rows: Vec<(String, i64)>) -> Vec<serde_json::Value> {
    rows.into_iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect()
}

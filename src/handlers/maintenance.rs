//! Maintenance handlers
//!
//! Closing the last active record for a resource reverts the resource to
//! `available`; the record update and the reversion commit together.

use crate::models::*;
use crate::status::{
    is_active_maintenance, maintenance_reverts_resource, maintenance_transition_allowed,
};
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
// Maintenance Listing
// =============================================================================

/// List all maintenance records with their resource and building names
pub async fn list_maintenance(State(state): State<AppState>) -> impl IntoResponse {
    let records = sqlx::query_as::<_, MaintenanceWithResource>(
        r#"
        SELECT m.*,
               r.name AS resource_name,
               b.name AS building_name
        FROM maintenance m
        LEFT JOIN resources r ON r.id = m.resource_id
        LEFT JOIN buildings b ON b.id = r.building_id
        ORDER BY m.scheduled_date ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await;

    match records {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::success(records))),
        Err(e) => {
            tracing::error!("Failed to fetch maintenance records: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to fetch maintenance records")),
            )
        }
    }
}

// =============================================================================
// Maintenance Status Transition
// =============================================================================

/// Move a maintenance record through its lifecycle
pub async fn update_maintenance_status(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMaintenanceStatusRequest>,
) -> impl IntoResponse {
    let record = sqlx::query_as::<_, Maintenance>("SELECT * FROM maintenance WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    let record = match record {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<Maintenance>::error(
                    "Maintenance record not found",
                )),
            );
        }
        Err(e) => {
            tracing::error!("Failed to fetch maintenance record {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if !maintenance_transition_allowed(record.status, input.status) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Invalid maintenance status transition")),
        );
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update maintenance status")),
            );
        }
    };

    let updated = sqlx::query_as::<_, Maintenance>(
        "UPDATE maintenance SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(input.status)
    .bind(id)
    .fetch_one(&mut *tx)
    .await;

    let updated = match updated {
        Ok(u) => u,
        Err(e) => {
            tracing::error!("Failed to update maintenance record {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update maintenance status")),
            );
        }
    };

    // Closing a record may free the resource, but only when nothing else is
    // still open for it.
    if !is_active_maintenance(input.status) {
        let siblings = sqlx::query_as::<_, Maintenance>(
            "SELECT * FROM maintenance WHERE resource_id = $1",
        )
        .bind(record.resource_id)
        .fetch_all(&mut *tx)
        .await;

        let siblings = match siblings {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(
                    "Failed to fetch maintenance records for resource {}: {}",
                    record.resource_id,
                    e
                );
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to update maintenance status")),
                );
            }
        };

        if maintenance_reverts_resource(&siblings, id, input.status) {
            let result = sqlx::query("UPDATE resources SET status = $1 WHERE id = $2")
                .bind(ResourceStatus::Available)
                .bind(record.resource_id)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                tracing::error!(
                    "Failed to revert resource {} to available: {}",
                    record.resource_id,
                    e
                );
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to update maintenance status")),
                );
            }
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit maintenance transition: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to update maintenance status")),
        );
    }

    log_audit(
        &state.pool,
        "maintenance_status_updated",
        "maintenance",
        Some(id),
        Some(actor.id),
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::success(updated)))
}

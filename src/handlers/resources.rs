//! Resource handlers
//!
//! The list endpoint is the main consumer of the status engine: every
//! resource is returned with its derived standing, computed from the stored
//! status plus the maintenance and booking records fetched in bulk.

use crate::models::*;
use crate::status::{active_statuses, derive_standing};
use crate::validation::{validate_create_resource, validate_update_resource};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub is_production: bool,
    /// Session lifetime applied at login
    pub session_expiry_hours: i64,
    /// Trusted proxy IP prefixes for X-Forwarded-For validation
    pub trusted_proxies: Vec<String>,
}

// =============================================================================
// Resource Listing
// =============================================================================

/// List all resources with nested relations and derived standing
pub async fn list_resources(State(state): State<AppState>) -> impl IntoResponse {
    let resources =
        sqlx::query_as::<_, Resource>("SELECT * FROM resources ORDER BY created_at, id")
            .fetch_all(&state.pool)
            .await;

    let resources = match resources {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to fetch resources: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<ResourceResponse>>::error(
                    "Failed to fetch resources",
                )),
            );
        }
    };

    let resource_ids: Vec<Uuid> = resources.iter().map(|r| r.id).collect();

    // Catalog lookups
    let type_ids: Vec<Uuid> = resources.iter().map(|r| r.resource_type_id).collect();
    let types = if type_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, ResourceType>("SELECT * FROM resource_types WHERE id = ANY($1)")
            .bind(&type_ids)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };
    let types_by_id: HashMap<Uuid, ResourceType> =
        types.into_iter().map(|t| (t.id, t)).collect();

    let building_ids: Vec<Uuid> = resources.iter().filter_map(|r| r.building_id).collect();
    let buildings = if building_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, Building>("SELECT * FROM buildings WHERE id = ANY($1)")
            .bind(&building_ids)
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default()
    };
    let buildings_by_id: HashMap<Uuid, Building> =
        buildings.into_iter().map(|b| (b.id, b)).collect();

    // Child records, fetched in bulk and grouped by resource
    let all_facilities = if resource_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, Facility>(
            "SELECT * FROM facilities WHERE resource_id = ANY($1) ORDER BY name",
        )
        .bind(&resource_ids)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    };
    let mut facilities_by_resource: HashMap<Uuid, Vec<Facility>> = HashMap::new();
    for facility in all_facilities {
        facilities_by_resource
            .entry(facility.resource_id)
            .or_default()
            .push(facility);
    }

    let all_maintenance = if resource_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, Maintenance>(
            "SELECT * FROM maintenance WHERE resource_id = ANY($1) ORDER BY scheduled_date, id",
        )
        .bind(&resource_ids)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    };
    let mut maintenance_by_resource: HashMap<Uuid, Vec<Maintenance>> = HashMap::new();
    for record in all_maintenance {
        maintenance_by_resource
            .entry(record.resource_id)
            .or_default()
            .push(record);
    }

    // Booking order is what makes the derived assignee deterministic when
    // approved bookings overlap.
    let all_bookings = if resource_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, BookingWithUser>(
            r#"
            SELECT b.*, u.name AS user_name
            FROM bookings b
            LEFT JOIN users u ON u.id = b.user_id
            WHERE b.resource_id = ANY($1)
            ORDER BY b.start_datetime, b.id
            "#,
        )
        .bind(&resource_ids)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    };
    let mut bookings_by_resource: HashMap<Uuid, Vec<BookingWithUser>> = HashMap::new();
    for booking in all_bookings {
        bookings_by_resource
            .entry(booking.resource_id)
            .or_default()
            .push(booking);
    }

    // One timestamp for the whole listing, so rows are judged consistently
    let now = Utc::now();

    let mut responses = Vec::new();
    for resource in resources {
        let resource_type = match types_by_id.get(&resource.resource_type_id) {
            Some(t) => t.clone(),
            None => {
                tracing::warn!("Resource {} references missing type", resource.id);
                continue;
            }
        };
        let building = resource
            .building_id
            .and_then(|id| buildings_by_id.get(&id).cloned());

        let facilities = facilities_by_resource.remove(&resource.id).unwrap_or_default();
        let maintenance = maintenance_by_resource.remove(&resource.id).unwrap_or_default();
        let bookings = bookings_by_resource.remove(&resource.id).unwrap_or_default();

        let standing = derive_standing(resource.status, &maintenance, &bookings, now);

        responses.push(ResourceResponse {
            id: resource.id,
            name: resource.name,
            resource_type,
            building,
            floor_number: resource.floor_number,
            description: resource.description,
            status: resource.status,
            effective_status: standing.status,
            assignee: standing.assignee,
            facilities,
            maintenance,
            bookings,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        });
    }

    (StatusCode::OK, Json(ApiResponse::success(responses)))
}

// =============================================================================
// Resource Detail
// =============================================================================

/// Get a single resource with its storage layout
pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let resource = sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    let resource = match resource {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<ResourceDetailResponse>::error(
                    "Resource not found",
                )),
            );
        }
        Err(e) => {
            tracing::error!("Failed to fetch resource {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    let resource_type = sqlx::query_as::<_, ResourceType>(
        "SELECT * FROM resource_types WHERE id = $1",
    )
    .bind(resource.resource_type_id)
    .fetch_optional(&state.pool)
    .await;

    let resource_type = match resource_type {
        Ok(Some(t)) => t,
        Ok(None) | Err(_) => {
            tracing::error!("Resource {} references missing type", resource.id);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    let building = match resource.building_id {
        Some(building_id) => {
            sqlx::query_as::<_, Building>("SELECT * FROM buildings WHERE id = $1")
                .bind(building_id)
                .fetch_optional(&state.pool)
                .await
                .unwrap_or_default()
        }
        None => None,
    };

    let facilities = sqlx::query_as::<_, Facility>(
        "SELECT * FROM facilities WHERE resource_id = $1 ORDER BY name",
    )
    .bind(resource.id)
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let cupboards = sqlx::query_as::<_, Cupboard>(
        "SELECT * FROM cupboards WHERE resource_id = $1 ORDER BY name",
    )
    .bind(resource.id)
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let cupboard_ids: Vec<Uuid> = cupboards.iter().map(|c| c.id).collect();
    let all_shelves = if cupboard_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, Shelf>(
            "SELECT * FROM shelves WHERE cupboard_id = ANY($1) ORDER BY shelf_number",
        )
        .bind(&cupboard_ids)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default()
    };
    let mut shelves_by_cupboard: HashMap<Uuid, Vec<Shelf>> = HashMap::new();
    for shelf in all_shelves {
        shelves_by_cupboard
            .entry(shelf.cupboard_id)
            .or_default()
            .push(shelf);
    }

    let cupboards = cupboards
        .into_iter()
        .map(|c| {
            let shelves = shelves_by_cupboard.remove(&c.id).unwrap_or_default();
            CupboardResponse {
                id: c.id,
                name: c.name,
                total_shelves: c.total_shelves,
                shelves,
            }
        })
        .collect();

    let response = ResourceDetailResponse {
        id: resource.id,
        name: resource.name,
        resource_type,
        building,
        floor_number: resource.floor_number,
        description: resource.description,
        status: resource.status,
        facilities,
        cupboards,
        created_at: resource.created_at,
        updated_at: resource.updated_at,
    };

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

// =============================================================================
// Resource Creation
// =============================================================================

/// Create a resource with its facilities and an optional initial allocation
pub async fn create_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Json(input): Json<CreateResource>,
) -> impl IntoResponse {
    // Validate input
    if let Err(e) = validate_create_resource(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Resource>::error(e.to_string())),
        );
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create resource")),
            );
        }
    };

    let resource = sqlx::query_as::<_, Resource>(
        r#"
        INSERT INTO resources (name, resource_type_id, building_id, floor_number, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(input.resource_type_id)
    .bind(input.building_id)
    .bind(input.floor_number)
    .bind(&input.description)
    .fetch_one(&mut *tx)
    .await;

    let resource = match resource {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to create resource: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create resource")),
            );
        }
    };

    for facility in &input.facilities {
        let result = sqlx::query(
            "INSERT INTO facilities (resource_id, name, details) VALUES ($1, $2, $3)",
        )
        .bind(resource.id)
        .bind(&facility.name)
        .bind(&facility.details)
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to create facility: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create resource")),
            );
        }
    }

    // Admin-created allocations skip the request queue
    if let Some(ref allocation) = input.initial_allocation {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (resource_id, user_id, start_datetime, end_datetime, status, approver_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(resource.id)
        .bind(allocation.user_id)
        .bind(allocation.start_datetime)
        .bind(allocation.end_datetime)
        .bind(BookingStatus::Approved)
        .bind(actor.id)
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to create initial allocation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create resource")),
            );
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit resource creation: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to create resource")),
        );
    }

    log_audit(
        &state.pool,
        "resource_created",
        "resource",
        Some(resource.id),
        Some(actor.id),
    )
    .await;

    (StatusCode::CREATED, Json(ApiResponse::success(resource)))
}

// =============================================================================
// Resource Update
// =============================================================================

/// Update a resource; when a facility list is given it replaces the old one
pub async fn update_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateResource>,
) -> impl IntoResponse {
    if let Err(e) = validate_update_resource(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Resource>::error(e.to_string())),
        );
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource")),
            );
        }
    };

    let resource = sqlx::query_as::<_, Resource>(
        r#"
        UPDATE resources
        SET name = $1, resource_type_id = $2, building_id = $3,
            floor_number = $4, description = $5
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(input.resource_type_id)
    .bind(input.building_id)
    .bind(input.floor_number)
    .bind(&input.description)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await;

    let resource = match resource {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Resource not found")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to update resource {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource")),
            );
        }
    };

    // Replace facilities wholesale when a list is provided
    if let Some(ref facilities) = input.facilities {
        let deleted = sqlx::query("DELETE FROM facilities WHERE resource_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await;

        if let Err(e) = deleted {
            tracing::error!("Failed to clear facilities for {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource")),
            );
        }

        for facility in facilities {
            let result = sqlx::query(
                "INSERT INTO facilities (resource_id, name, details) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(&facility.name)
            .bind(&facility.details)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                tracing::error!("Failed to recreate facility: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to update resource")),
                );
            }
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit resource update: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to update resource")),
        );
    }

    log_audit(
        &state.pool,
        "resource_updated",
        "resource",
        Some(resource.id),
        Some(actor.id),
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::success(resource)))
}

// =============================================================================
// Resource Deletion
// =============================================================================

/// Delete a resource; child records go with it
pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_scalar::<_, Uuid>("DELETE FROM resources WHERE id = $1 RETURNING id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await;

    match result {
        Ok(Some(_)) => {
            log_audit(
                &state.pool,
                "resource_deleted",
                "resource",
                Some(id),
                Some(actor.id),
            )
            .await;
            (StatusCode::OK, Json(ApiResponse::success(())))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Resource not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete resource {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete resource")),
            )
        }
    }
}

// =============================================================================
// Manual Status Override
// =============================================================================

/// Set the stored status directly.
///
/// Setting `maintenance` also opens a maintenance record so the override is
/// visible in the maintenance list; moving away from it closes every record
/// still in the active set. Both writes commit together.
pub async fn update_resource_status(
    State(state): State<AppState>,
    Extension(actor): Extension<User>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateResourceStatusRequest>,
) -> impl IntoResponse {
    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin transaction: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Resource>::error(
                    "Failed to update resource status",
                )),
            );
        }
    };

    let resource = sqlx::query_as::<_, Resource>(
        "UPDATE resources SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(input.status)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await;

    let resource = match resource {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Resource not found")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to update resource status {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource status")),
            );
        }
    };

    if input.status == ResourceStatus::Maintenance {
        // Open a record so the maintenance page reflects the override
        let result = sqlx::query(
            r#"
            INSERT INTO maintenance (resource_id, maintenance_type, scheduled_date, status, notes)
            VALUES ($1, $2, NOW(), $3, $4)
            "#,
        )
        .bind(id)
        .bind("General")
        .bind(MaintenanceStatus::Pending)
        .bind("Status set to maintenance by admin")
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to open maintenance record for {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource status")),
            );
        }
    } else {
        // Moving away from maintenance closes anything still open
        let result = sqlx::query(
            "UPDATE maintenance SET status = $1 WHERE resource_id = $2 AND status = ANY($3)",
        )
        .bind(MaintenanceStatus::Completed)
        .bind(id)
        .bind(active_statuses())
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to close maintenance records for {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resource status")),
            );
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit status override: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Failed to update resource status")),
        );
    }

    log_audit(
        &state.pool,
        "resource_status_overridden",
        "resource",
        Some(id),
        Some(actor.id),
    )
    .await;

    (StatusCode::OK, Json(ApiResponse::success(resource)))
}

// =============================================================================
// Catalog Endpoints
// =============================================================================

/// List resource types
pub async fn list_resource_types(State(state): State<AppState>) -> impl IntoResponse {
    let types = sqlx::query_as::<_, ResourceType>("SELECT * FROM resource_types ORDER BY name")
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

    (StatusCode::OK, Json(ApiResponse::success(types)))
}

/// List buildings
pub async fn list_buildings(State(state): State<AppState>) -> impl IntoResponse {
    let buildings =
        sqlx::query_as::<_, Building>("SELECT * FROM buildings ORDER BY building_number")
            .fetch_all(&state.pool)
            .await
            .unwrap_or_default();

    (StatusCode::OK, Json(ApiResponse::success(buildings)))
}

// =============================================================================
// Audit Helper
// =============================================================================

pub(crate) async fn log_audit(
    pool: &PgPool,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    actor_id: Option<Uuid>,
) {
    let _ = sqlx::query(
        r#"
        INSERT INTO audit_log (action, entity_type, entity_id, actor_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(actor_id)
    .execute(pool)
    .await;
}

//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Faculty,
    Admin,
    Maintenance,
}

/// Stored resource status. The effective status shown to callers is derived
/// from this plus the resource's maintenance and booking records; the stored
/// value only wins outright when set to `Maintenance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Allocated,
    Maintenance,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "maintenance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl sqlx::postgres::PgHasArrayType for MaintenanceStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_maintenance_status")
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    /// Defaults to `student`; open registration only accepts unprivileged roles.
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: UserRole,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: UserRole,
    /// Only updated when provided.
    #[validate(length(min = 6))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRoleRequest {
    pub role: UserRole,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Resource Type & Building
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceType {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Building {
    pub id: Uuid,
    pub name: String,
    pub building_number: String,
    pub total_floors: i32,
}

// =============================================================================
// Resource
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub resource_type_id: Uuid,
    pub building_id: Option<Uuid>,
    pub floor_number: Option<i32>,
    pub description: Option<String>,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Facility {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub name: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cupboard {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub name: String,
    pub total_shelves: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shelf {
    pub id: Uuid,
    pub cupboard_id: Uuid,
    pub shelf_number: i32,
    pub capacity: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFacility {
    pub name: String,
    pub details: Option<String>,
}

/// Optional allocation created together with a new resource. Admin-created,
/// so it is approved immediately rather than going through the request queue.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialAllocation {
    pub user_id: Uuid,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResource {
    pub name: String,
    pub resource_type_id: Uuid,
    pub building_id: Option<Uuid>,
    pub floor_number: Option<i32>,
    pub description: Option<String>,
    #[serde(default)]
    pub facilities: Vec<CreateFacility>,
    pub initial_allocation: Option<InitialAllocation>,
}

/// Full-replace update: absent optional fields clear their columns.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResource {
    pub name: String,
    pub resource_type_id: Uuid,
    pub building_id: Option<Uuid>,
    pub floor_number: Option<i32>,
    pub description: Option<String>,
    /// When present, replaces the facility list wholesale.
    pub facilities: Option<Vec<CreateFacility>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResourceStatusRequest {
    pub status: ResourceStatus,
}

/// Resource with nested relations and the derived standing, as returned by
/// the list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResponse {
    pub id: Uuid,
    pub name: String,
    pub resource_type: ResourceType,
    pub building: Option<Building>,
    pub floor_number: Option<i32>,
    pub description: Option<String>,
    pub status: ResourceStatus,
    pub effective_status: ResourceStatus,
    pub assignee: Option<String>,
    pub facilities: Vec<Facility>,
    pub maintenance: Vec<Maintenance>,
    pub bookings: Vec<BookingWithUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CupboardResponse {
    pub id: Uuid,
    pub name: String,
    pub total_shelves: i32,
    pub shelves: Vec<Shelf>,
}

/// Resource detail view: location, facilities and storage layout.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDetailResponse {
    pub id: Uuid,
    pub name: String,
    pub resource_type: ResourceType,
    pub building: Option<Building>,
    pub floor_number: Option<i32>,
    pub description: Option<String>,
    pub status: ResourceStatus,
    pub facilities: Vec<Facility>,
    pub cupboards: Vec<CupboardResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Booking
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub status: BookingStatus,
    pub approver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Booking joined with the requesting user's name, used both for the
/// resource list response and for status derivation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingWithUser {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub status: BookingStatus,
    pub approver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
}

/// Booking list row with resource, requester and approver names resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingWithDetails {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub status: BookingStatus,
    pub approver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resource_name: Option<String>,
    pub user_name: Option<String>,
    pub approver_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub resource_id: Uuid,
    /// Admins may book on behalf of another user; ignored otherwise.
    pub user_id: Option<Uuid>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

// =============================================================================
// Maintenance
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Maintenance {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub maintenance_type: String,
    pub scheduled_date: DateTime<Utc>,
    pub status: MaintenanceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Maintenance list row with its resource's name and building resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaintenanceWithResource {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub maintenance_type: String,
    pub scheduled_date: DateTime<Utc>,
    pub status: MaintenanceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resource_name: Option<String>,
    pub building_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMaintenanceStatusRequest {
    pub status: MaintenanceStatus,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

//! Resource status derivation and state-transition policy
//!
//! A resource's live status is never read straight from storage: it is
//! recomputed on every read from the stored status, the maintenance list and
//! the booking list. The stored value acts as a manual override only when it
//! is `Maintenance`. This module also owns the transition rules applied when
//! a booking or maintenance record changes status; the handlers run the
//! database writes, the policy decisions live here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    BookingStatus, BookingWithUser, Maintenance, MaintenanceStatus, ResourceStatus,
};

/// Effective status and current assignee of a resource at a point in time.
///
/// `assignee` is the name of the user holding the active approved booking;
/// `None` when nobody holds the resource (rendered as "-" by clients).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStanding {
    pub status: ResourceStatus,
    pub assignee: Option<String>,
}

/// A maintenance record in one of these states still blocks the resource.
pub fn is_active_maintenance(status: MaintenanceStatus) -> bool {
    matches!(
        status,
        MaintenanceStatus::Pending | MaintenanceStatus::Scheduled | MaintenanceStatus::InProgress
    )
}

/// The active set as a list, for queries that filter on it.
pub fn active_statuses() -> Vec<MaintenanceStatus> {
    vec![
        MaintenanceStatus::Pending,
        MaintenanceStatus::Scheduled,
        MaintenanceStatus::InProgress,
    ]
}

/// Derive the effective status of a resource.
///
/// Priority order, first match wins:
/// 1. stored `Maintenance` override
/// 2. any active maintenance record
/// 3. an approved booking whose interval contains `now` (bounds inclusive)
/// 4. the stored status as-is
///
/// `now` is injected by the caller; this function never reads a clock.
/// Overlapping approved bookings are not prevented at approval time, so when
/// several match, the first in iteration order wins.
pub fn derive_standing(
    stored: ResourceStatus,
    maintenance: &[Maintenance],
    bookings: &[BookingWithUser],
    now: DateTime<Utc>,
) -> ResourceStanding {
    if stored == ResourceStatus::Maintenance {
        return ResourceStanding {
            status: ResourceStatus::Maintenance,
            assignee: None,
        };
    }

    if maintenance.iter().any(|m| is_active_maintenance(m.status)) {
        return ResourceStanding {
            status: ResourceStatus::Maintenance,
            assignee: None,
        };
    }

    let active_booking = bookings.iter().find(|b| {
        b.status == BookingStatus::Approved && b.start_datetime <= now && now <= b.end_datetime
    });

    if let Some(booking) = active_booking {
        return ResourceStanding {
            status: ResourceStatus::Allocated,
            assignee: Some(
                booking
                    .user_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
        };
    }

    ResourceStanding {
        status: stored,
        assignee: None,
    }
}

/// Booking requests only move out of `Pending`, and only to a decision.
/// Everything else is refused by policy.
pub fn booking_transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    matches!(
        (from, to),
        (BookingStatus::Pending, BookingStatus::Approved)
            | (BookingStatus::Pending, BookingStatus::Rejected)
    )
}

/// Maintenance transition policy: open records may start or finish, anything
/// may be cancelled. Re-asserting the current status is allowed so that the
/// completion side effect stays idempotent.
pub fn maintenance_transition_allowed(from: MaintenanceStatus, to: MaintenanceStatus) -> bool {
    use MaintenanceStatus::*;

    if from == to {
        return true;
    }

    match to {
        InProgress => matches!(from, Scheduled | Pending),
        Completed => matches!(from, InProgress | Scheduled | Pending),
        Cancelled => true,
        Pending | Scheduled => false,
    }
}

/// Decide whether a resource may revert to `Available` after one of its
/// maintenance records transitioned to `new_status`.
///
/// Reversion only happens when the record reached a terminal status and no
/// OTHER record for the resource is still active. The transitioned record is
/// excluded by id, so the caller may pass the list from before or after the
/// write.
pub fn maintenance_reverts_resource(
    records: &[Maintenance],
    transitioned_id: Uuid,
    new_status: MaintenanceStatus,
) -> bool {
    if is_active_maintenance(new_status) {
        return false;
    }

    !records
        .iter()
        .any(|m| m.id != transitioned_id && is_active_maintenance(m.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn maintenance_record(status: MaintenanceStatus) -> Maintenance {
        Maintenance {
            id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            maintenance_type: "Cleaning".to_string(),
            scheduled_date: Utc::now(),
            status,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn booking(
        status: BookingStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_name: Option<&str>,
    ) -> BookingWithUser {
        BookingWithUser {
            id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_datetime: start,
            end_datetime: end,
            status,
            approver_id: None,
            created_at: Utc::now(),
            user_name: user_name.map(str::to_string),
        }
    }

    #[test]
    fn approved_booking_in_window_allocates() {
        let now = Utc::now();
        let bookings = vec![booking(
            BookingStatus::Approved,
            now - Duration::hours(1),
            now + Duration::hours(1),
            Some("Alice"),
        )];

        let standing = derive_standing(ResourceStatus::Available, &[], &bookings, now);
        assert_eq!(standing.status, ResourceStatus::Allocated);
        assert_eq!(standing.assignee.as_deref(), Some("Alice"));
    }

    #[test]
    fn pending_maintenance_blocks_allocation() {
        let now = Utc::now();
        let maintenance = vec![maintenance_record(MaintenanceStatus::Pending)];

        let standing = derive_standing(ResourceStatus::Available, &maintenance, &[], now);
        assert_eq!(standing.status, ResourceStatus::Maintenance);
        assert_eq!(standing.assignee, None);
    }

    #[test]
    fn manual_override_wins_over_active_booking() {
        let now = Utc::now();
        let bookings = vec![booking(
            BookingStatus::Approved,
            now - Duration::hours(1),
            now + Duration::hours(1),
            Some("Alice"),
        )];

        let standing = derive_standing(ResourceStatus::Maintenance, &[], &bookings, now);
        assert_eq!(standing.status, ResourceStatus::Maintenance);
        assert_eq!(standing.assignee, None);
    }

    #[test]
    fn scheduled_maintenance_counts_as_active() {
        let now = Utc::now();
        let maintenance = vec![maintenance_record(MaintenanceStatus::Scheduled)];

        let standing = derive_standing(ResourceStatus::Available, &maintenance, &[], now);
        assert_eq!(standing.status, ResourceStatus::Maintenance);
    }

    #[test]
    fn finished_maintenance_does_not_block() {
        let now = Utc::now();
        let maintenance = vec![
            maintenance_record(MaintenanceStatus::Completed),
            maintenance_record(MaintenanceStatus::Cancelled),
        ];

        let standing = derive_standing(ResourceStatus::Available, &maintenance, &[], now);
        assert_eq!(standing.status, ResourceStatus::Available);
    }

    #[test]
    fn booking_outside_window_leaves_stored_status() {
        let now = Utc::now();
        let bookings = vec![booking(
            BookingStatus::Approved,
            now + Duration::hours(1),
            now + Duration::hours(2),
            Some("Alice"),
        )];

        let standing = derive_standing(ResourceStatus::Available, &[], &bookings, now);
        assert_eq!(standing.status, ResourceStatus::Available);
        assert_eq!(standing.assignee, None);
    }

    #[test]
    fn pending_booking_does_not_allocate() {
        let now = Utc::now();
        let bookings = vec![booking(
            BookingStatus::Pending,
            now - Duration::hours(1),
            now + Duration::hours(1),
            Some("Alice"),
        )];

        let standing = derive_standing(ResourceStatus::Available, &[], &bookings, now);
        assert_eq!(standing.status, ResourceStatus::Available);
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let now = Utc::now();

        let at_start = vec![booking(
            BookingStatus::Approved,
            now,
            now + Duration::hours(1),
            Some("Alice"),
        )];
        assert_eq!(
            derive_standing(ResourceStatus::Available, &[], &at_start, now).status,
            ResourceStatus::Allocated
        );

        let at_end = vec![booking(
            BookingStatus::Approved,
            now - Duration::hours(1),
            now,
            Some("Alice"),
        )];
        assert_eq!(
            derive_standing(ResourceStatus::Available, &[], &at_end, now).status,
            ResourceStatus::Allocated
        );
    }

    #[test]
    fn missing_user_name_reports_unknown() {
        let now = Utc::now();
        let bookings = vec![booking(
            BookingStatus::Approved,
            now - Duration::hours(1),
            now + Duration::hours(1),
            None,
        )];

        let standing = derive_standing(ResourceStatus::Available, &[], &bookings, now);
        assert_eq!(standing.assignee.as_deref(), Some("Unknown"));
    }

    #[test]
    fn first_of_overlapping_approved_bookings_wins() {
        let now = Utc::now();
        let bookings = vec![
            booking(
                BookingStatus::Approved,
                now - Duration::hours(1),
                now + Duration::hours(1),
                Some("Alice"),
            ),
            booking(
                BookingStatus::Approved,
                now - Duration::hours(2),
                now + Duration::hours(2),
                Some("Bob"),
            ),
        ];

        let standing = derive_standing(ResourceStatus::Available, &[], &bookings, now);
        assert_eq!(standing.assignee.as_deref(), Some("Alice"));
    }

    #[test]
    fn stored_status_passes_through_when_idle() {
        let now = Utc::now();
        let standing = derive_standing(ResourceStatus::Unavailable, &[], &[], now);
        assert_eq!(standing.status, ResourceStatus::Unavailable);
        assert_eq!(standing.assignee, None);
    }

    #[test]
    fn booking_transitions_only_decide_pending_requests() {
        use BookingStatus::*;

        assert!(booking_transition_allowed(Pending, Approved));
        assert!(booking_transition_allowed(Pending, Rejected));

        assert!(!booking_transition_allowed(Approved, Rejected));
        assert!(!booking_transition_allowed(Rejected, Approved));
        assert!(!booking_transition_allowed(Approved, Pending));
        assert!(!booking_transition_allowed(Rejected, Pending));
    }

    #[test]
    fn maintenance_transitions_follow_lifecycle() {
        use MaintenanceStatus::*;

        assert!(maintenance_transition_allowed(Pending, InProgress));
        assert!(maintenance_transition_allowed(Scheduled, InProgress));
        assert!(maintenance_transition_allowed(Pending, Completed));
        assert!(maintenance_transition_allowed(Scheduled, Completed));
        assert!(maintenance_transition_allowed(InProgress, Completed));
        assert!(maintenance_transition_allowed(Completed, Cancelled));
        assert!(maintenance_transition_allowed(InProgress, Cancelled));

        assert!(!maintenance_transition_allowed(Completed, InProgress));
        assert!(!maintenance_transition_allowed(Cancelled, Completed));
        assert!(!maintenance_transition_allowed(Completed, Pending));
        assert!(!maintenance_transition_allowed(InProgress, Scheduled));
    }

    #[test]
    fn maintenance_transition_is_idempotent() {
        use MaintenanceStatus::*;

        assert!(maintenance_transition_allowed(Completed, Completed));
        assert!(maintenance_transition_allowed(Pending, Pending));
        assert!(maintenance_transition_allowed(Cancelled, Cancelled));
    }

    #[test]
    fn reverts_only_when_last_active_record_closes() {
        let mut first = maintenance_record(MaintenanceStatus::InProgress);
        let mut second = maintenance_record(MaintenanceStatus::Pending);
        let resource_id = Uuid::new_v4();
        first.resource_id = resource_id;
        second.resource_id = resource_id;

        // Completing the first record: the second is still open.
        let records = vec![first.clone(), second.clone()];
        assert!(!maintenance_reverts_resource(
            &records,
            first.id,
            MaintenanceStatus::Completed
        ));

        // Then completing the second: nothing open remains.
        first.status = MaintenanceStatus::Completed;
        let records = vec![first.clone(), second.clone()];
        assert!(maintenance_reverts_resource(
            &records,
            second.id,
            MaintenanceStatus::Completed
        ));
    }

    #[test]
    fn cancellation_of_last_record_reverts() {
        let record = maintenance_record(MaintenanceStatus::Scheduled);
        let records = vec![record.clone()];
        assert!(maintenance_reverts_resource(
            &records,
            record.id,
            MaintenanceStatus::Cancelled
        ));
    }

    #[test]
    fn no_reversion_while_record_stays_active() {
        let record = maintenance_record(MaintenanceStatus::Pending);
        let records = vec![record.clone()];
        assert!(!maintenance_reverts_resource(
            &records,
            record.id,
            MaintenanceStatus::InProgress
        ));
    }

    #[test]
    fn repeated_completion_produces_same_outcome() {
        let record = maintenance_record(MaintenanceStatus::Completed);
        let records = vec![record.clone()];

        let first = maintenance_reverts_resource(&records, record.id, MaintenanceStatus::Completed);
        let second =
            maintenance_reverts_resource(&records, record.id, MaintenanceStatus::Completed);
        assert_eq!(first, second);
        assert!(first);
    }
}

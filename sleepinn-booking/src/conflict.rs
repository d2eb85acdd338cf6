use chrono::{DateTime, Utc};
use sleepinn_core::{Booking, CoreResult, DateRange, StoreTx};
use uuid::Uuid;

/// Decides whether a requested stay collides with bookings that still hold
/// inventory. Expired holds never block, even before the sweeper runs.
pub struct ConflictChecker;

impl ConflictChecker {
    /// Pure predicate over already-loaded candidates.
    pub fn collides(
        candidates: &[Booking],
        range: &DateRange,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> bool {
        candidates.iter().any(|existing| {
            Some(existing.id) != exclude
                && existing.range.overlaps(range)
                && existing.holds_inventory(now)
        })
    }

    /// Transactional check. Callers must already hold the listing lock in
    /// `tx` for the answer to stay true until commit.
    pub async fn has_conflict(
        tx: &mut dyn StoreTx,
        listing_id: Uuid,
        range: &DateRange,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> CoreResult<bool> {
        let candidates = tx.overlapping_bookings(listing_id, range).await?;
        Ok(Self::collides(&candidates, range, now, exclude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sleepinn_core::BookingStatus;

    fn booking(start: &str, end: &str, status: BookingStatus, expires_at: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            listing_id: Uuid::nil(),
            user_id: "guest".to_string(),
            range: DateRange::parse(start, end).unwrap(),
            guest_count: 1,
            status,
            amount: 10000,
            currency: "myr".to_string(),
            created_at: Utc::now(),
            expires_at,
            provider_session_id: None,
        }
    }

    #[test]
    fn test_paid_overlap_conflicts() {
        let now = Utc::now();
        let existing = vec![booking("2025-06-01", "2025-06-04", BookingStatus::Paid, None)];
        let wanted = DateRange::parse("2025-06-03", "2025-06-06").unwrap();

        assert!(ConflictChecker::collides(&existing, &wanted, now, None));
    }

    #[test]
    fn test_adjacent_stay_does_not_conflict() {
        let now = Utc::now();
        let existing = vec![booking("2025-06-01", "2025-06-04", BookingStatus::Paid, None)];
        let wanted = DateRange::parse("2025-06-04", "2025-06-06").unwrap();

        assert!(!ConflictChecker::collides(&existing, &wanted, now, None));
    }

    #[test]
    fn test_lapsed_pending_is_ignored_before_sweep() {
        let now = Utc::now();
        let wanted = DateRange::parse("2025-06-02", "2025-06-03").unwrap();

        let fresh = vec![booking(
            "2025-06-01",
            "2025-06-04",
            BookingStatus::Pending,
            Some(now + Duration::minutes(10)),
        )];
        let lapsed = vec![booking(
            "2025-06-01",
            "2025-06-04",
            BookingStatus::Pending,
            Some(now - Duration::seconds(1)),
        )];

        assert!(ConflictChecker::collides(&fresh, &wanted, now, None));
        assert!(!ConflictChecker::collides(&lapsed, &wanted, now, None));
    }

    #[test]
    fn test_released_statuses_never_conflict() {
        let now = Utc::now();
        let wanted = DateRange::parse("2025-06-01", "2025-06-04").unwrap();
        let existing: Vec<_> = [BookingStatus::Canceled, BookingStatus::Expired, BookingStatus::Refunded]
            .into_iter()
            .map(|status| booking("2025-06-01", "2025-06-04", status, Some(now + Duration::hours(1))))
            .collect();

        assert!(!ConflictChecker::collides(&existing, &wanted, now, None));
    }

    #[test]
    fn test_excluded_booking_does_not_conflict_with_itself() {
        let now = Utc::now();
        let existing = vec![booking("2025-06-01", "2025-06-04", BookingStatus::Paid, None)];
        let wanted = existing[0].range;

        assert!(!ConflictChecker::collides(&existing, &wanted, now, Some(existing[0].id)));
    }
}

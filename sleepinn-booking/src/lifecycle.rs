use chrono::{DateTime, Utc};
use sleepinn_core::{Booking, BookingStatus, CoreError, CoreResult, StoreTx};

pub const TRIP_STARTED: &str = "trip already started";
pub const NOT_CANCELABLE: &str = "not in cancelable state";

/// Every edge of the booking state machine. Anything else is illegal.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Paid) | (Pending, Canceled) | (Pending, Expired) | (Paid, Refunded)
    )
}

pub fn check_transition(from: BookingStatus, to: BookingStatus) -> CoreResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::IllegalTransition(format!(
            "cannot move booking from {from} to {to}"
        )))
    }
}

/// Validate and write a status change, guarded on the status the caller
/// read. Returns false if a concurrent writer moved the row first.
pub async fn apply(tx: &mut dyn StoreTx, booking: &Booking, to: BookingStatus) -> CoreResult<bool> {
    check_transition(booking.status, to)?;
    Ok(tx.update_status(booking.id, booking.status, to).await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDecision {
    /// Already canceled, expired or refunded. Repeat requests succeed as no-ops.
    AlreadySettled(BookingStatus),
    /// Pending: drop the hold.
    ReleaseHold,
    /// Paid: refund through the provider, then mark refunded.
    Refund,
}

/// Guests may cancel until the calendar day the stay starts.
pub fn plan_cancel(booking: &Booking, now: DateTime<Utc>) -> CoreResult<CancelDecision> {
    if booking.status.is_terminal() {
        return Ok(CancelDecision::AlreadySettled(booking.status));
    }
    if now.date_naive() >= booking.range.start() {
        return Err(CoreError::IllegalTransition(TRIP_STARTED.to_string()));
    }
    match booking.status {
        BookingStatus::Pending => Ok(CancelDecision::ReleaseHold),
        BookingStatus::Paid => Ok(CancelDecision::Refund),
        _ => Err(CoreError::IllegalTransition(NOT_CANCELABLE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sleepinn_core::DateRange;
    use uuid::Uuid;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            user_id: "guest".to_string(),
            range: DateRange::parse("2025-06-10", "2025-06-12").unwrap(),
            guest_count: 1,
            status,
            amount: 21600,
            currency: "myr".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            provider_session_id: None,
        }
    }

    #[test]
    fn test_legal_edges() {
        use BookingStatus::*;
        assert!(can_transition(Pending, Paid));
        assert!(can_transition(Pending, Canceled));
        assert!(can_transition(Pending, Expired));
        assert!(can_transition(Paid, Refunded));

        assert!(!can_transition(Paid, Canceled));
        assert!(!can_transition(Expired, Paid));
        assert!(!can_transition(Canceled, Pending));
        assert!(!can_transition(Refunded, Paid));
        assert!(!can_transition(Paid, Paid));
    }

    #[test]
    fn test_illegal_transition_error() {
        let err = check_transition(BookingStatus::Expired, BookingStatus::Paid).unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition(msg) if msg.contains("expired")));
    }

    #[test]
    fn test_cancel_before_start_day() {
        let evening_before = Utc.with_ymd_and_hms(2025, 6, 9, 23, 59, 0).unwrap();

        assert_eq!(
            plan_cancel(&booking(BookingStatus::Pending), evening_before).unwrap(),
            CancelDecision::ReleaseHold
        );
        assert_eq!(
            plan_cancel(&booking(BookingStatus::Paid), evening_before).unwrap(),
            CancelDecision::Refund
        );
    }

    #[test]
    fn test_cancel_on_start_day_rejected() {
        let check_in_morning = Utc.with_ymd_and_hms(2025, 6, 10, 0, 30, 0).unwrap();

        let err = plan_cancel(&booking(BookingStatus::Paid), check_in_morning).unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition(msg) if msg == TRIP_STARTED));
    }

    #[test]
    fn test_cancel_settled_is_noop_even_after_start() {
        let later = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        for status in [BookingStatus::Canceled, BookingStatus::Expired, BookingStatus::Refunded] {
            assert_eq!(
                plan_cancel(&booking(status), later).unwrap(),
                CancelDecision::AlreadySettled(status)
            );
        }
    }
}

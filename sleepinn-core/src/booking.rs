use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Canceled,
    Expired,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Canceled => "canceled",
            BookingStatus::Expired => "expired",
            BookingStatus::Refunded => "refunded",
        }
    }

    /// No transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Canceled | BookingStatus::Expired | BookingStatus::Refunded
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "paid" => Ok(BookingStatus::Paid),
            "canceled" => Ok(BookingStatus::Canceled),
            "expired" => Ok(BookingStatus::Expired),
            "refunded" => Ok(BookingStatus::Refunded),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_id: String,
    pub range: DateRange,
    pub guest_count: u32,
    pub status: BookingStatus,
    /// Quoted total in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider_session_id: Option<String>,
}

impl Booking {
    /// Whether this booking currently occupies its nights: paid, or pending
    /// with a hold that has not lapsed yet.
    pub fn holds_inventory(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            BookingStatus::Paid => true,
            BookingStatus::Pending => self.expires_at.is_some_and(|at| at > now),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Succeeded,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Provider-side money record. At most one per booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub booking_id: Uuid,
    pub provider_ref: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub refund_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(expires_at: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            user_id: "guest-1".to_string(),
            range: DateRange::parse("2025-06-01", "2025-06-03").unwrap(),
            guest_count: 2,
            status: BookingStatus::Pending,
            amount: 32400,
            currency: "myr".to_string(),
            created_at: Utc::now(),
            expires_at,
            provider_session_id: None,
        }
    }

    #[test]
    fn test_pending_holds_until_expiry() {
        let now = Utc::now();
        assert!(pending(Some(now + Duration::minutes(1))).holds_inventory(now));
        assert!(!pending(Some(now)).holds_inventory(now));
        assert!(!pending(None).holds_inventory(now));
    }

    #[test]
    fn test_terminal_statuses_release_inventory() {
        let now = Utc::now();
        for status in [
            BookingStatus::Canceled,
            BookingStatus::Expired,
            BookingStatus::Refunded,
        ] {
            let mut booking = pending(Some(now + Duration::minutes(5)));
            booking.status = status;
            assert!(status.is_terminal());
            assert!(!booking.holds_inventory(now));
        }
    }

    #[test]
    fn test_status_parses_its_own_rendering() {
        for status in [BookingStatus::Pending, BookingStatus::Paid, BookingStatus::Refunded] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("PAID".parse::<BookingStatus>().is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Booking, BookingStatus, DateRange, Payment};

/// Which slice of a host's calendar to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostBookingTab {
    /// Stays starting today or later.
    #[default]
    Upcoming,
    /// Stays whose checkout day is already behind us.
    Past,
    All,
}

impl HostBookingTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostBookingTab::Upcoming => "upcoming",
            HostBookingTab::Past => "past",
            HostBookingTab::All => "all",
        }
    }

    /// A stay in progress is neither upcoming nor past.
    pub fn admits(&self, range: &DateRange, today: NaiveDate) -> bool {
        match self {
            HostBookingTab::Upcoming => range.start() >= today,
            HostBookingTab::Past => range.end() < today,
            HostBookingTab::All => true,
        }
    }
}

impl fmt::Display for HostBookingTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostBookingTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(HostBookingTab::Upcoming),
            "past" => Ok(HostBookingTab::Past),
            "all" => Ok(HostBookingTab::All),
            other => Err(format!("unknown tab '{other}'")),
        }
    }
}

/// Filter for a host's bookings view. Only bookings that took money
/// (paid or refunded) are listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBookingQuery {
    pub tab: HostBookingTab,
    pub today: NaiveDate,
    /// Case-insensitive substring of the booking id, listing title or guest id.
    pub search: Option<String>,
}

impl HostBookingQuery {
    pub fn new(tab: HostBookingTab, today: NaiveDate, search: Option<&str>) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Self { tab, today, search }
    }

    pub fn matches(&self, booking: &Booking, listing_title: &str) -> bool {
        if !matches!(booking.status, BookingStatus::Paid | BookingStatus::Refunded) {
            return false;
        }
        if !self.tab.admits(&booking.range, self.today) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => [
                booking.id.to_string(),
                listing_title.to_lowercase(),
                booking.user_id.to_lowercase(),
            ]
            .iter()
            .any(|hay| hay.contains(needle.as_str())),
        }
    }
}

/// A booking on one of the host's listings.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBooking {
    pub booking: Booking,
    pub payment: Option<Payment>,
    pub listing_title: String,
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable property. Prices are nightly, in the listing's currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    /// Owner's user id, as carried in the auth token subject.
    pub host_id: String,
    pub title: String,
    pub base_price: Decimal,
    pub base_capacity: u32,
    pub currency: String,
    pub published: bool,
}

/// Per-day override row. Days without a row use the listing's base values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub listing_id: Uuid,
    pub day: NaiveDate,
    pub is_available: bool,
    pub capacity: u32,
    pub price_override: Option<Decimal>,
}

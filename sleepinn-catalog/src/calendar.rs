use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sleepinn_core::{AvailabilityDay, DateRange, Listing};

/// What a single night actually costs and holds once overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveDay {
    pub day: NaiveDate,
    pub price: Decimal,
    pub capacity: u32,
    pub is_available: bool,
}

impl EffectiveDay {
    pub fn accepts(&self, guests: u32) -> bool {
        self.is_available && self.capacity >= guests
    }
}

/// Sparse per-day calendar for one listing. A day with no row is open at
/// the listing's base price and capacity.
pub struct Calendar<'a> {
    listing: &'a Listing,
    overrides: HashMap<NaiveDate, &'a AvailabilityDay>,
}

impl<'a> Calendar<'a> {
    pub fn new(listing: &'a Listing, rows: &'a [AvailabilityDay]) -> Self {
        let overrides = rows
            .iter()
            .filter(|row| row.listing_id == listing.id)
            .map(|row| (row.day, row))
            .collect();
        Self { listing, overrides }
    }

    pub fn resolve(&self, day: NaiveDate) -> EffectiveDay {
        match self.overrides.get(&day) {
            Some(row) => EffectiveDay {
                day,
                price: row.price_override.unwrap_or(self.listing.base_price),
                capacity: row.capacity,
                is_available: row.is_available,
            },
            None => EffectiveDay {
                day,
                price: self.listing.base_price,
                capacity: self.listing.base_capacity,
                is_available: true,
            },
        }
    }

    pub fn nights(&self, range: &DateRange) -> Vec<EffectiveDay> {
        range.days().map(|day| self.resolve(day)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn listing() -> Listing {
        Listing {
            id: Uuid::new_v4(),
            host_id: "host-1".to_string(),
            title: "Loft".to_string(),
            base_price: dec!(100.00),
            base_capacity: 4,
            currency: "myr".to_string(),
            published: true,
        }
    }

    #[test]
    fn test_missing_row_uses_listing_defaults() {
        let listing = listing();
        let calendar = Calendar::new(&listing, &[]);
        let day = calendar.resolve(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());

        assert_eq!(day.price, dec!(100.00));
        assert_eq!(day.capacity, 4);
        assert!(day.is_available);
    }

    #[test]
    fn test_row_overrides_capacity_and_price() {
        let listing = listing();
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let rows = vec![
            AvailabilityDay {
                listing_id: listing.id,
                day,
                is_available: true,
                capacity: 1,
                price_override: Some(dec!(150.00)),
            },
            AvailabilityDay {
                listing_id: Uuid::new_v4(),
                day: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                is_available: false,
                capacity: 0,
                price_override: None,
            },
        ];
        let calendar = Calendar::new(&listing, &rows);

        let resolved = calendar.resolve(day);
        assert_eq!(resolved.price, dec!(150.00));
        assert!(!resolved.accepts(2));
        assert!(resolved.accepts(1));

        // Rows belonging to another listing are ignored.
        assert!(calendar.resolve(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()).is_available);
    }

    #[test]
    fn test_row_without_price_keeps_base_price() {
        let listing = listing();
        let day = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        let rows = vec![AvailabilityDay {
            listing_id: listing.id,
            day,
            is_available: true,
            capacity: 6,
            price_override: None,
        }];
        let calendar = Calendar::new(&listing, &rows);

        assert_eq!(calendar.resolve(day).price, dec!(100.00));
        assert_eq!(calendar.resolve(day).capacity, 6);
    }
}

use rust_decimal::Decimal;
use serde::Serialize;
use sleepinn_core::{AvailabilityDay, CoreError, CoreResult, DateRange, Listing};

use crate::calendar::Calendar;
use crate::money::{round_money, to_minor_units};

/// Priced stay. Amounts are major units, already rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub range: DateRange,
    pub guests: u32,
    pub nights: u32,
    pub currency: String,
    /// Listing base price, for display. Nights may have been charged differently.
    pub nightly_base: Decimal,
    pub effective_nightly: Decimal,
    pub mixed_pricing: bool,
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
}

impl Quote {
    pub fn total_minor(&self) -> i64 {
        to_minor_units(self.total)
    }
}

/// Prices a stay against a listing's calendar. Pure: no I/O, no clock.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    fee_rate: Decimal,
}

impl QuoteEngine {
    pub fn new(fee_rate: Decimal) -> Self {
        Self { fee_rate }
    }

    pub fn quote(
        &self,
        listing: &Listing,
        rows: &[AvailabilityDay],
        range: &DateRange,
        guests: u32,
    ) -> CoreResult<Quote> {
        if guests < 1 {
            return Err(CoreError::Validation("guests must be at least 1".to_string()));
        }

        let calendar = Calendar::new(listing, rows);
        let nights = calendar.nights(range);

        let missing_days: Vec<_> = nights
            .iter()
            .filter(|night| !night.accepts(guests))
            .map(|night| night.day)
            .collect();
        if !missing_days.is_empty() {
            return Err(CoreError::Unavailable { missing_days });
        }

        let subtotal = round_money(nights.iter().map(|night| night.price).sum());
        let service_fee = round_money(subtotal * self.fee_rate);
        let total = subtotal + service_fee;

        let min = nights.iter().map(|night| night.price).min().unwrap_or(listing.base_price);
        let max = nights.iter().map(|night| night.price).max().unwrap_or(listing.base_price);
        let count = Decimal::from(range.nights());

        Ok(Quote {
            range: *range,
            guests,
            nights: range.nights(),
            currency: listing.currency.clone(),
            nightly_base: round_money(listing.base_price),
            effective_nightly: round_money(subtotal / count),
            mixed_pricing: min != max,
            subtotal,
            service_fee,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn listing(base_price: Decimal) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            host_id: "host-1".to_string(),
            title: "Harbour view".to_string(),
            base_price,
            base_capacity: 2,
            currency: "myr".to_string(),
            published: true,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(listing: &Listing, on: &str) -> AvailabilityDay {
        AvailabilityDay {
            listing_id: listing.id,
            day: day(on),
            is_available: true,
            capacity: listing.base_capacity,
            price_override: None,
        }
    }

    #[test]
    fn test_three_nights_at_base_price() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(100.00));
        let range = DateRange::parse("2025-06-01", "2025-06-04").unwrap();

        let quote = engine.quote(&listing, &[], &range, 2).unwrap();

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.nightly_base, dec!(100.00));
        assert_eq!(quote.subtotal, dec!(300.00));
        assert_eq!(quote.service_fee, dec!(24.00));
        assert_eq!(quote.total, dec!(324.00));
        assert_eq!(quote.total_minor(), 32400);
        assert!(!quote.mixed_pricing);
    }

    #[test]
    fn test_unavailable_day_is_reported_exactly() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(100.00));
        let mut blocked = row(&listing, "2025-06-02");
        blocked.is_available = false;
        let range = DateRange::parse("2025-06-01", "2025-06-04").unwrap();

        let err = engine.quote(&listing, &[blocked], &range, 1).unwrap_err();

        match err {
            CoreError::Unavailable { missing_days } => {
                assert_eq!(missing_days, vec![day("2025-06-02")]);
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_under_capacity_days_are_missing() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(80.00));
        let mut small = row(&listing, "2025-06-01");
        small.capacity = 1;
        let mut closed = row(&listing, "2025-06-03");
        closed.is_available = false;
        let range = DateRange::parse("2025-06-01", "2025-06-05").unwrap();

        let err = engine.quote(&listing, &[small.clone(), closed], &range, 2).unwrap_err();
        match err {
            CoreError::Unavailable { missing_days } => {
                assert_eq!(missing_days, vec![day("2025-06-01"), day("2025-06-03")]);
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }

        // A single guest fits the reduced-capacity night; the closed one still blocks.
        assert!(engine.quote(&listing, &[small], &range, 1).is_ok());
    }

    #[test]
    fn test_checkout_day_is_not_checked_or_charged() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(100.00));
        let mut checkout = row(&listing, "2025-06-04");
        checkout.is_available = false;
        let range = DateRange::parse("2025-06-01", "2025-06-04").unwrap();

        let quote = engine.quote(&listing, &[checkout], &range, 1).unwrap();
        assert_eq!(quote.subtotal, dec!(300.00));
    }

    #[test]
    fn test_mixed_prices_round_once_at_the_fee() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(99.99));
        let mut weekend = row(&listing, "2025-06-06");
        weekend.price_override = Some(dec!(120.55));
        let range = DateRange::parse("2025-06-05", "2025-06-08").unwrap();

        let quote = engine.quote(&listing, &[weekend], &range, 2).unwrap();

        // 99.99 + 120.55 + 99.99 = 320.53; 320.53 * 0.08 = 25.6424
        assert_eq!(quote.subtotal, dec!(320.53));
        assert_eq!(quote.service_fee, dec!(25.64));
        assert_eq!(quote.total, dec!(346.17));
        assert_eq!(quote.nightly_base, dec!(99.99));
        assert_eq!(quote.effective_nightly, dec!(106.84));
        assert!(quote.mixed_pricing);
    }

    #[test]
    fn test_fee_midpoint_rounds_half_up() {
        let engine = QuoteEngine::new(dec!(0.10));
        let listing = listing(dec!(0.05));
        let range = DateRange::parse("2025-06-01", "2025-06-02").unwrap();

        // 0.05 * 0.10 = 0.005 -> 0.01
        let quote = engine.quote(&listing, &[], &range, 1).unwrap();
        assert_eq!(quote.service_fee, dec!(0.01));
        assert_eq!(quote.total, dec!(0.06));
    }

    #[test]
    fn test_long_stay_total_matches_sum_plus_fee() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(33.33));
        let range = DateRange::parse("2025-01-01", "2025-12-31").unwrap();

        let quote = engine.quote(&listing, &[], &range, 1).unwrap();

        let expected_subtotal = dec!(33.33) * Decimal::from(quote.nights);
        assert_eq!(quote.subtotal, expected_subtotal);
        assert_eq!(quote.total, expected_subtotal + round_money(expected_subtotal * dec!(0.08)));
    }

    #[test]
    fn test_zero_guests_rejected() {
        let engine = QuoteEngine::new(dec!(0.08));
        let listing = listing(dec!(100.00));
        let range = DateRange::parse("2025-06-01", "2025-06-02").unwrap();

        assert!(matches!(
            engine.quote(&listing, &[], &range, 0),
            Err(CoreError::Validation(_))
        ));
    }
}

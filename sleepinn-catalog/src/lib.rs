pub mod calendar;
pub mod money;
pub mod pricing;

pub use calendar::{Calendar, EffectiveDay};
pub use pricing::{Quote, QuoteEngine};

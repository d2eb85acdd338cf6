use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub bookings_expired: IntCounter,
    pub payment_events: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new(
            "sleepinn_bookings_created_total",
            "Pending bookings created",
        )?;
        let bookings_expired = IntCounter::new(
            "sleepinn_bookings_expired_total",
            "Pending bookings expired by the sweeper",
        )?;
        let payment_events = IntCounterVec::new(
            Opts::new("sleepinn_payment_events_total", "Payment provider events by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(bookings_expired.clone()))?;
        registry.register(Box::new(payment_events.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            bookings_expired,
            payment_events,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

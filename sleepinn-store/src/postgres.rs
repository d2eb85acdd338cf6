use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sleepinn_core::{
    AvailabilityDay, Booking, BookingStatus, BookingStore, DateRange, HostBooking,
    HostBookingQuery, Listing, Payment, PaymentStatus, StoreError, StoreResult, StoreTx,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Postgres-backed store. Every transaction runs SERIALIZABLE.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn payments_for(&self, booking_ids: &[Uuid]) -> StoreResult<Vec<Payment>> {
        convert_all(
            sqlx::query_as::<_, PaymentRow>(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ANY($1)"
            ))
            .bind(booking_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?,
        )
    }
}

/// Serialization failure, deadlock, lock timeout, or no pool connection in time.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    let transient = match &err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03")),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        _ => false,
    };
    if transient {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Database(err.to_string())
    }
}

// Internal row structs for type-safe querying

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    host_id: String,
    title: String,
    base_price: Decimal,
    base_capacity: i32,
    currency: String,
    published: bool,
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            id: row.id,
            host_id: row.host_id,
            title: row.title,
            base_price: row.base_price,
            base_capacity: non_negative(row.base_capacity, "base_capacity")?,
            currency: row.currency,
            published: row.published,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AvailabilityRow {
    listing_id: Uuid,
    day: NaiveDate,
    is_available: bool,
    capacity: i32,
    price_override: Option<Decimal>,
}

impl TryFrom<AvailabilityRow> for AvailabilityDay {
    type Error = StoreError;

    fn try_from(row: AvailabilityRow) -> Result<Self, Self::Error> {
        Ok(AvailabilityDay {
            listing_id: row.listing_id,
            day: row.day,
            is_available: row.is_available,
            capacity: non_negative(row.capacity, "capacity")?,
            price_override: row.price_override,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    listing_id: Uuid,
    user_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    guest_count: i32,
    status: String,
    amount: i64,
    currency: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    provider_session_id: Option<String>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let range = DateRange::new(row.start_date, row.end_date)
            .map_err(|e| StoreError::Database(format!("booking {}: {e}", row.id)))?;
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(StoreError::Database)?;
        Ok(Booking {
            id: row.id,
            listing_id: row.listing_id,
            user_id: row.user_id,
            range,
            guest_count: non_negative(row.guest_count, "guest_count")?,
            status,
            amount: row.amount,
            currency: row.currency,
            created_at: row.created_at,
            expires_at: row.expires_at,
            provider_session_id: row.provider_session_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HostBookingRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    listing_title: String,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    booking_id: Uuid,
    provider_ref: String,
    amount: i64,
    currency: String,
    status: String,
    refund_ref: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            booking_id: row.booking_id,
            provider_ref: row.provider_ref,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse::<PaymentStatus>().map_err(StoreError::Database)?,
            refund_ref: row.refund_ref,
            updated_at: row.updated_at,
        })
    }
}

fn non_negative(value: i32, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Database(format!("negative {column}: {value}")))
}

/// `ILIKE` pattern matching `needle` anywhere, with its wildcards taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const LISTING_COLUMNS: &str = "id, host_id, title, base_price, base_capacity, currency, published";
const BOOKING_COLUMNS: &str = "id, listing_id, user_id, start_date, end_date, guest_count, status, \
     amount, currency, created_at, expires_at, provider_session_id";
const HOST_BOOKING_COLUMNS: &str = "b.id, b.listing_id, b.user_id, b.start_date, b.end_date, \
     b.guest_count, b.status, b.amount, b.currency, b.created_at, b.expires_at, \
     b.provider_session_id, l.title AS listing_title";
const PAYMENT_COLUMNS: &str = "booking_id, provider_ref, amount, currency, status, refund_ref, updated_at";

#[async_trait]
impl BookingStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1 AND published"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Listing::try_from).transpose()
    }

    async fn availability(&self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<AvailabilityDay>> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            "SELECT listing_id, day, is_available, capacity, price_override FROM availability \
             WHERE listing_id = $1 AND day >= $2 AND day < $3 ORDER BY day",
        )
        .bind(listing_id)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_user_bookings(&self, user_id: &str) -> StoreResult<Vec<(Booking, Option<Payment>)>> {
        let bookings: Vec<Booking> = convert_all(
            sqlx::query_as::<_, BookingRow>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?,
        )?;

        let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
        let payments = self.payments_for(&ids).await?;

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let payment = payments.iter().find(|p| p.booking_id == booking.id).cloned();
                (booking, payment)
            })
            .collect())
    }

    async fn list_host_bookings(&self, host_id: &str, query: &HostBookingQuery) -> StoreResult<Vec<HostBooking>> {
        let rows = sqlx::query_as::<_, HostBookingRow>(&format!(
            "SELECT {HOST_BOOKING_COLUMNS} FROM bookings b JOIN listings l ON l.id = b.listing_id \
             WHERE l.host_id = $1 AND b.status IN ('paid', 'refunded') \
               AND ($2 = 'all' \
                    OR ($2 = 'upcoming' AND b.start_date >= $3) \
                    OR ($2 = 'past' AND b.end_date < $3)) \
               AND ($4::text IS NULL \
                    OR b.id::text ILIKE $4 OR l.title ILIKE $4 OR b.user_id ILIKE $4) \
             ORDER BY b.start_date DESC, b.id DESC"
        ))
        .bind(host_id)
        .bind(query.tab.as_str())
        .bind(query.today)
        .bind(query.search.as_deref().map(contains_pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut found = Vec::with_capacity(rows.len());
        for row in rows {
            found.push((Booking::try_from(row.booking)?, row.listing_title));
        }
        let ids: Vec<Uuid> = found.iter().map(|(b, _)| b.id).collect();
        let payments = self.payments_for(&ids).await?;

        Ok(found
            .into_iter()
            .map(|(booking, listing_title)| {
                let payment = payments.iter().find(|p| p.booking_id == booking.id).cloned();
                HostBooking {
                    booking,
                    payment,
                    listing_title,
                }
            })
            .collect())
    }

    async fn get_payment(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_booking_by_session(&self, session_id: &str) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE provider_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_booking_by_payment_ref(&self, payment_ref: &str) -> StoreResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT booking_id FROM payments WHERE provider_ref = $1 LIMIT 1")
            .bind(payment_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn set_provider_session(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE bookings SET provider_session_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(booking_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE bookings SET status = 'expired', updated_at = NOW() \
             WHERE status = 'pending' AND expires_at <= $1 RETURNING id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_listing(&mut self, id: Uuid) -> StoreResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(Listing::try_from).transpose()
    }

    async fn availability(&mut self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<AvailabilityDay>> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            "SELECT listing_id, day, is_available, capacity, price_override FROM availability \
             WHERE listing_id = $1 AND day >= $2 AND day < $3 ORDER BY day",
        )
        .bind(listing_id)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn overlapping_bookings(&mut self, listing_id: Uuid, range: &DateRange) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE listing_id = $1 AND status IN ('paid', 'pending') \
             AND NOT (end_date <= $2 OR start_date >= $3)"
        ))
        .bind(listing_id)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bookings (id, listing_id, user_id, start_date, end_date, guest_count, status, \
             amount, currency, created_at, expires_at, provider_session_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(booking.id)
        .bind(booking.listing_id)
        .bind(&booking.user_id)
        .bind(booking.range.start())
        .bind(booking.range.end())
        .bind(booking.guest_count as i32)
        .bind(booking.status.as_str())
        .bind(booking.amount)
        .bind(&booking.currency)
        .bind(booking.created_at)
        .bind(booking.expires_at)
        .bind(&booking.provider_session_id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn lock_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(Booking::try_from).transpose()
    }

    async fn update_status(&mut self, id: Uuid, from: BookingStatus, to: BookingStatus) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_payment(&mut self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(Payment::try_from).transpose()
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (booking_id, provider_ref, amount, currency, status, refund_ref, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (booking_id) DO UPDATE SET \
               provider_ref = EXCLUDED.provider_ref, \
               amount = EXCLUDED.amount, \
               currency = EXCLUDED.currency, \
               status = EXCLUDED.status, \
               refund_ref = EXCLUDED.refund_ref, \
               updated_at = EXCLUDED.updated_at",
        )
        .bind(payment.booking_id)
        .bind(&payment.provider_ref)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.refund_ref)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await.map_err(map_sqlx)
    }
}

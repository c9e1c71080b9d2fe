use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use bazaar_core::{CoreError, CoreResult};
use bazaar_taxi::{
    BookingFilter, Driver, PaymentStatus, Seater, TaxiBooking, TaxiError, TaxiRepository, TaxiVehicle, Trip, TripStatus,
};

use crate::database::{db_err, from_text, to_text};

pub struct StoreTaxiRepository {
    pool: PgPool,
}

impl StoreTaxiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: Uuid,
    user_id: Uuid,
    license: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            id: row.id,
            user_id: row.user_id,
            license: row.license,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    name: String,
    vehicle_no: String,
    driver_id: Uuid,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<VehicleRow> for TaxiVehicle {
    fn from(row: VehicleRow) -> Self {
        TaxiVehicle {
            id: row.id,
            name: row.name,
            vehicle_no: row.vehicle_no,
            driver_id: row.driver_id,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    customer_id: Uuid,
    trip_id: Uuid,
    seater_id: Uuid,
    price: Decimal,
    date: NaiveDate,
    time: NaiveTime,
    payment_status: String,
    vehicle_id: Option<Uuid>,
    trip_status: String,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for TaxiBooking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> CoreResult<Self> {
        Ok(TaxiBooking {
            id: row.id,
            customer_id: row.customer_id,
            trip_id: row.trip_id,
            seater_id: row.seater_id,
            price: row.price,
            date: row.date,
            time: row.time,
            payment_status: from_text(&row.payment_status)?,
            vehicle_id: row.vehicle_id,
            trip_status: from_text(&row.trip_status)?,
            remarks: row.remarks,
            created_at: row.created_at,
        })
    }
}

/// Appends the filter's conditions to a query over `taxi_bookings`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    if let Some(customer) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(customer);
    }
    if let Some(trip) = filter.trip_id {
        qb.push(" AND trip_id = ").push_bind(trip);
    }
    if let Some(payment) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(to_text(&payment));
    }
    if let Some(status) = filter.trip_status {
        qb.push(" AND trip_status = ").push_bind(status.to_string());
    }
    if let Some(date) = filter.date {
        qb.push(" AND date = ").push_bind(date);
    }
}

async fn lock_booking(conn: &mut PgConnection, id: Uuid) -> CoreResult<TaxiBooking> {
    sqlx::query_as::<_, BookingRow>("SELECT * FROM taxi_bookings WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| CoreError::not_found("taxi booking", id))
        .and_then(TaxiBooking::try_from)
}

/// Serializes writers on the same key until the transaction ends.
async fn advisory_lock(conn: &mut PgConnection, key: &str) -> CoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn count_live_on(conn: &mut PgConnection, date: NaiveDate) -> CoreResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM taxi_bookings WHERE date = $1 AND trip_status <> 'cancelled'")
        .bind(date)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)
}

#[async_trait]
impl TaxiRepository for StoreTaxiRepository {
    async fn create_driver(&self, driver: &Driver) -> CoreResult<()> {
        sqlx::query("INSERT INTO taxi_drivers (id, user_id, license, is_active, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(driver.id)
            .bind(driver.user_id)
            .bind(&driver.license)
            .bind(driver.is_active)
            .bind(driver.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn driver_for_user(&self, user_id: Uuid) -> CoreResult<Option<Driver>> {
        let row = sqlx::query_as::<_, DriverRow>("SELECT * FROM taxi_drivers WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Driver::from))
    }

    async fn list_drivers(&self) -> CoreResult<Vec<Driver>> {
        let rows = sqlx::query_as::<_, DriverRow>("SELECT * FROM taxi_drivers ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Driver::from).collect())
    }

    async fn create_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO taxi_vehicles (id, name, vehicle_no, driver_id, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(vehicle.id)
        .bind(&vehicle.name)
        .bind(&vehicle.vehicle_no)
        .bind(vehicle.driver_id)
        .bind(vehicle.is_active)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()> {
        let result = sqlx::query("UPDATE taxi_vehicles SET name = $2, vehicle_no = $3, is_active = $4 WHERE id = $1")
            .bind(vehicle.id)
            .bind(&vehicle.name)
            .bind(&vehicle.vehicle_no)
            .bind(vehicle.is_active)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("vehicle", vehicle.id));
        }
        Ok(())
    }

    async fn delete_vehicle(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM taxi_vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("vehicle", id));
        }
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TaxiVehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>("SELECT * FROM taxi_vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(TaxiVehicle::from))
    }

    async fn driver_vehicles(&self, driver_id: Uuid) -> CoreResult<Vec<TaxiVehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>("SELECT * FROM taxi_vehicles WHERE driver_id = $1 ORDER BY created_at")
            .bind(driver_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(TaxiVehicle::from).collect())
    }

    async fn count_active_vehicles(&self) -> CoreResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM taxi_vehicles WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as usize)
    }

    async fn create_trip(&self, trip: &Trip) -> CoreResult<()> {
        sqlx::query("INSERT INTO taxi_trips (id, from_place, to_place) VALUES ($1, $2, $3)")
            .bind(trip.id)
            .bind(trip.from_place)
            .bind(trip.to_place)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        let row: Option<(Uuid, Uuid, Uuid)> = sqlx::query_as("SELECT id, from_place, to_place FROM taxi_trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(id, from_place, to_place)| Trip { id, from_place, to_place }))
    }

    async fn list_trips(&self) -> CoreResult<Vec<Trip>> {
        let rows: Vec<(Uuid, Uuid, Uuid)> = sqlx::query_as("SELECT id, from_place, to_place FROM taxi_trips")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, from_place, to_place)| Trip { id, from_place, to_place })
            .collect())
    }

    async fn create_seater(&self, seater: &Seater) -> CoreResult<()> {
        sqlx::query("INSERT INTO taxi_seaters (id, seat, price, trip_id) VALUES ($1, $2, $3, $4)")
            .bind(seater.id)
            .bind(&seater.seat)
            .bind(seater.price)
            .bind(seater.trip_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_seater(&self, id: Uuid) -> CoreResult<Option<Seater>> {
        let row: Option<(Uuid, String, Decimal, Uuid)> =
            sqlx::query_as("SELECT id, seat, price, trip_id FROM taxi_seaters WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|(id, seat, price, trip_id)| Seater { id, seat, price, trip_id }))
    }

    async fn list_seaters(&self, trip_id: Option<Uuid>) -> CoreResult<Vec<Seater>> {
        let rows: Vec<(Uuid, String, Decimal, Uuid)> = sqlx::query_as(
            "SELECT id, seat, price, trip_id FROM taxi_seaters WHERE ($1::uuid IS NULL OR trip_id = $1) ORDER BY price",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(id, seat, price, trip_id)| Seater { id, seat, price, trip_id })
            .collect())
    }

    async fn count_bookings_on(&self, date: NaiveDate) -> CoreResult<usize> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        Ok(count_live_on(&mut conn, date).await? as usize)
    }

    async fn create_booking_within_capacity(&self, booking: &TaxiBooking) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        advisory_lock(&mut tx, &format!("taxi_capacity:{}", booking.date)).await?;

        let active = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM taxi_vehicles WHERE is_active")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if active == 0 {
            return Err(TaxiError::NoVehicles.into());
        }
        if count_live_on(&mut tx, booking.date).await? >= active {
            return Err(TaxiError::FullyBooked(booking.date).into());
        }

        sqlx::query(
            r#"
            INSERT INTO taxi_bookings
                (id, customer_id, trip_id, seater_id, price, date, time, payment_status,
                 vehicle_id, trip_status, remarks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(booking.id)
        .bind(booking.customer_id)
        .bind(booking.trip_id)
        .bind(booking.seater_id)
        .bind(booking.price)
        .bind(booking.date)
        .bind(booking.time)
        .bind(to_text(&booking.payment_status))
        .bind(booking.vehicle_id)
        .bind(booking.trip_status.to_string())
        .bind(&booking.remarks)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TaxiBooking>> {
        sqlx::query_as::<_, BookingRow>("SELECT * FROM taxi_bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(TaxiBooking::try_from)
            .transpose()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM taxi_bookings WHERE TRUE");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        qb.build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(TaxiBooking::try_from)
            .collect()
    }

    async fn vehicle_bookings(&self, vehicle_ids: &[Uuid], filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM taxi_bookings WHERE vehicle_id = ANY(");
        qb.push_bind(vehicle_ids.to_vec()).push(")");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");
        qb.build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(TaxiBooking::try_from)
            .collect()
    }

    async fn assign_vehicle(&self, booking_id: Uuid, vehicle_id: Uuid) -> CoreResult<TaxiBooking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        if booking.vehicle_id.is_some() || booking.trip_status != TripStatus::Pending {
            return Err(TaxiError::AlreadyAssigned.into());
        }

        advisory_lock(&mut tx, &format!("taxi_slot:{}", vehicle_id)).await?;
        let clash = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM taxi_bookings
                WHERE id <> $1 AND vehicle_id = $2 AND date = $3 AND time = $4 AND trip_status <> 'cancelled'
            )
            "#,
        )
        .bind(booking_id)
        .bind(vehicle_id)
        .bind(booking.date)
        .bind(booking.time)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if clash {
            return Err(TaxiError::SlotTaken.into());
        }

        sqlx::query("UPDATE taxi_bookings SET vehicle_id = $2, trip_status = 'confirmed' WHERE id = $1")
            .bind(booking_id)
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        booking.vehicle_id = Some(vehicle_id);
        booking.trip_status = TripStatus::Confirmed;
        Ok(booking)
    }

    async fn update_trip_status(&self, booking_id: Uuid, from: TripStatus, to: TripStatus) -> CoreResult<TaxiBooking> {
        let updated = sqlx::query_as::<_, BookingRow>(
            "UPDATE taxi_bookings SET trip_status = $3 WHERE id = $1 AND trip_status = $2 RETURNING *",
        )
        .bind(booking_id)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match updated {
            Some(row) => TaxiBooking::try_from(row),
            None => match self.get_booking(booking_id).await? {
                Some(current) => Err(CoreError::Conflict(format!(
                    "Booking status changed to {} in the meantime",
                    current.trip_status
                ))),
                None => Err(CoreError::not_found("taxi booking", booking_id)),
            },
        }
    }

    async fn set_payment_status(&self, booking_id: Uuid, status: PaymentStatus) -> CoreResult<TaxiBooking> {
        sqlx::query_as::<_, BookingRow>("UPDATE taxi_bookings SET payment_status = $2 WHERE id = $1 RETURNING *")
            .bind(booking_id)
            .bind(to_text(&status))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("taxi booking", booking_id))
            .and_then(TaxiBooking::try_from)
    }
}

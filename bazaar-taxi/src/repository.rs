use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use bazaar_core::CoreResult;

use crate::models::{Driver, PaymentStatus, Seater, TaxiBooking, TaxiVehicle, Trip, TripStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub customer_id: Option<Uuid>,
    pub trip_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub trip_status: Option<TripStatus>,
    pub date: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn matches(&self, b: &TaxiBooking) -> bool {
        self.customer_id.map_or(true, |c| b.customer_id == c)
            && self.trip_id.map_or(true, |t| b.trip_id == t)
            && self.payment_status.map_or(true, |p| b.payment_status == p)
            && self.trip_status.map_or(true, |s| b.trip_status == s)
            && self.date.map_or(true, |d| b.date == d)
    }
}

#[async_trait]
pub trait TaxiRepository: Send + Sync {
    async fn create_driver(&self, driver: &Driver) -> CoreResult<()>;

    /// The user's active driver profile.
    async fn driver_for_user(&self, user_id: Uuid) -> CoreResult<Option<Driver>>;

    async fn list_drivers(&self) -> CoreResult<Vec<Driver>>;

    async fn create_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()>;

    async fn update_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()>;

    async fn delete_vehicle(&self, id: Uuid) -> CoreResult<()>;

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TaxiVehicle>>;

    async fn driver_vehicles(&self, driver_id: Uuid) -> CoreResult<Vec<TaxiVehicle>>;

    async fn count_active_vehicles(&self) -> CoreResult<usize>;

    async fn create_trip(&self, trip: &Trip) -> CoreResult<()>;

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>>;

    async fn list_trips(&self) -> CoreResult<Vec<Trip>>;

    async fn create_seater(&self, seater: &Seater) -> CoreResult<()>;

    async fn get_seater(&self, id: Uuid) -> CoreResult<Option<Seater>>;

    async fn list_seaters(&self, trip_id: Option<Uuid>) -> CoreResult<Vec<Seater>>;

    /// Non-cancelled bookings on the date.
    async fn count_bookings_on(&self, date: NaiveDate) -> CoreResult<usize>;

    /// Inserts the booking only while the date still has a free vehicle,
    /// checked under the same lock as the insert.
    async fn create_booking_within_capacity(&self, booking: &TaxiBooking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TaxiBooking>>;

    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>>;

    async fn vehicle_bookings(&self, vehicle_ids: &[Uuid], filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>>;

    /// Assigns the vehicle and confirms the booking if it is still unassigned
    /// and the vehicle has no other live booking at the same date and time.
    async fn assign_vehicle(&self, booking_id: Uuid, vehicle_id: Uuid) -> CoreResult<TaxiBooking>;

    /// Compare-and-set on the trip status.
    async fn update_trip_status(&self, booking_id: Uuid, from: TripStatus, to: TripStatus) -> CoreResult<TaxiBooking>;

    async fn set_payment_status(&self, booking_id: Uuid, status: PaymentStatus) -> CoreResult<TaxiBooking>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use rust_decimal::Decimal;

    #[test]
    fn test_filter_matches() {
        let booking = TaxiBooking {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            seater_id: Uuid::new_v4(),
            price: Decimal::ONE_HUNDRED,
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            payment_status: PaymentStatus::Pending,
            vehicle_id: None,
            trip_status: TripStatus::Pending,
            remarks: None,
            created_at: Utc::now(),
        };

        assert!(BookingFilter::default().matches(&booking));
        let by_status = BookingFilter { trip_status: Some(TripStatus::Pending), date: Some(booking.date), ..Default::default() };
        assert!(by_status.matches(&booking));
        let paid = BookingFilter { payment_status: Some(PaymentStatus::Paid), ..Default::default() };
        assert!(!paid.matches(&booking));
    }
}

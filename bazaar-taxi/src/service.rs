use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use bazaar_core::repository::{require_place, AccountRepository};
use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::round_money;

use crate::dispatch::{self, NewTaxiBooking};
use crate::earnings::DriverEarnings;
use crate::models::{Driver, PaymentStatus, Seater, TaxiBooking, TaxiVehicle, Trip, TripStatus};
use crate::repository::{BookingFilter, TaxiRepository};
use crate::TaxiError;

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleInput {
    pub name: String,
    pub vehicle_no: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Taxi bookings for customers, and dispatch for drivers.
pub struct TaxiService {
    repo: Arc<dyn TaxiRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl TaxiService {
    pub fn new(repo: Arc<dyn TaxiRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { repo, accounts }
    }

    async fn booking(&self, id: Uuid) -> CoreResult<TaxiBooking> {
        self.repo
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::not_found("taxi booking", id))
    }

    /// A caller counts as a driver only with the driver flag and an active profile.
    pub async fn driver(&self, user_id: Uuid) -> CoreResult<Driver> {
        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        if !user.is_driver {
            return Err(TaxiError::NotDriver.into());
        }
        self.repo
            .driver_for_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Driver profile not found".into()))
    }

    // Customers

    pub async fn book(&self, customer_id: Uuid, request: NewTaxiBooking) -> CoreResult<TaxiBooking> {
        self.repo
            .get_trip(request.trip_id)
            .await?
            .ok_or_else(|| CoreError::not_found("trip", request.trip_id))?;
        let seater = self
            .repo
            .get_seater(request.seater_id)
            .await?
            .ok_or_else(|| CoreError::not_found("seater", request.seater_id))?;

        let booking = dispatch::new_booking(customer_id, &request, &seater, Utc::now())?;

        let active_vehicles = self.repo.count_active_vehicles().await?;
        let booked = self.repo.count_bookings_on(request.date).await?;
        dispatch::check_capacity(request.date, booked, active_vehicles)?;

        self.repo.create_booking_within_capacity(&booking).await?;
        tracing::info!(booking_id = %booking.id, date = %booking.date, "Taxi booked");
        Ok(booking)
    }

    pub async fn my_bookings(&self, customer_id: Uuid, mut filter: BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        filter.customer_id = Some(customer_id);
        self.repo.list_bookings(&filter).await
    }

    pub async fn customer_booking(&self, customer_id: Uuid, id: Uuid) -> CoreResult<TaxiBooking> {
        let booking = self.booking(id).await?;
        if booking.customer_id != customer_id {
            return Err(CoreError::not_found("taxi booking", id));
        }
        Ok(booking)
    }

    pub async fn cancel(&self, customer_id: Uuid, id: Uuid) -> CoreResult<TaxiBooking> {
        let booking = self.customer_booking(customer_id, id).await?;
        dispatch::check_customer_cancel(&booking)?;
        self.repo
            .update_trip_status(id, booking.trip_status, TripStatus::Cancelled)
            .await
    }

    pub async fn list_trips(&self) -> CoreResult<Vec<Trip>> {
        self.repo.list_trips().await
    }

    pub async fn list_seaters(&self, trip_id: Option<Uuid>) -> CoreResult<Vec<Seater>> {
        self.repo.list_seaters(trip_id).await
    }

    // Drivers

    pub async fn driver_bookings(&self, user_id: Uuid, filter: BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        let driver = self.driver(user_id).await?;
        let vehicle_ids: Vec<Uuid> = self
            .repo
            .driver_vehicles(driver.id)
            .await?
            .into_iter()
            .filter(|v| v.is_active)
            .map(|v| v.id)
            .collect();
        if vehicle_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.vehicle_bookings(&vehicle_ids, &filter).await
    }

    /// Bookings nobody has accepted yet.
    pub async fn open_bookings(&self, user_id: Uuid) -> CoreResult<Vec<TaxiBooking>> {
        self.driver(user_id).await?;
        let filter = BookingFilter { trip_status: Some(TripStatus::Pending), ..Default::default() };
        let bookings = self.repo.list_bookings(&filter).await?;
        Ok(bookings.into_iter().filter(|b| b.vehicle_id.is_none()).collect())
    }

    pub async fn accept(&self, user_id: Uuid, booking_id: Uuid, vehicle_id: Option<Uuid>) -> CoreResult<TaxiBooking> {
        let driver = self.driver(user_id).await?;
        let booking = self.booking(booking_id).await?;
        dispatch::check_acceptable(&booking)?;

        let vehicles = self.repo.driver_vehicles(driver.id).await?;
        let vehicle = dispatch::choose_vehicle(&vehicles, vehicle_id)?;

        let others = self.repo.vehicle_bookings(&[vehicle.id], &BookingFilter::default()).await?;
        dispatch::check_slot_free(&booking, &others)?;

        let accepted = self.repo.assign_vehicle(booking_id, vehicle.id).await?;
        tracing::info!(booking_id = %booking_id, vehicle_id = %vehicle.id, "Taxi booking accepted");
        Ok(accepted)
    }

    /// Declining only applies to bookings no vehicle has taken yet; nothing changes.
    pub async fn decline(&self, user_id: Uuid, booking_id: Uuid) -> CoreResult<()> {
        self.driver(user_id).await?;
        let booking = self.booking(booking_id).await?;
        if booking.vehicle_id.is_some() {
            return Err(TaxiError::RejectAssigned.into());
        }
        tracing::debug!(booking_id = %booking_id, driver = %user_id, "Taxi booking declined");
        Ok(())
    }

    pub async fn update_status(&self, user_id: Uuid, booking_id: Uuid, to: TripStatus) -> CoreResult<TaxiBooking> {
        let driver = self.driver(user_id).await?;
        let booking = self.booking(booking_id).await?;

        let vehicle = match booking.vehicle_id {
            Some(id) => self.repo.get_vehicle(id).await?,
            None => None,
        };
        match vehicle {
            Some(v) if v.driver_id == driver.id => {}
            _ => return Err(TaxiError::NotAssignedToDriver.into()),
        }

        dispatch::check_transition(booking.trip_status, to)?;
        self.repo.update_trip_status(booking_id, booking.trip_status, to).await
    }

    pub async fn earnings(&self, user_id: Uuid) -> CoreResult<DriverEarnings> {
        let driver = self.driver(user_id).await?;
        let vehicle_ids: Vec<Uuid> = self
            .repo
            .driver_vehicles(driver.id)
            .await?
            .into_iter()
            .filter(|v| v.is_active)
            .map(|v| v.id)
            .collect();
        let bookings = if vehicle_ids.is_empty() {
            Vec::new()
        } else {
            self.repo.vehicle_bookings(&vehicle_ids, &BookingFilter::default()).await?
        };
        Ok(DriverEarnings::collect(&bookings, vehicle_ids.len(), Utc::now().date_naive()))
    }

    pub async fn my_vehicles(&self, user_id: Uuid) -> CoreResult<Vec<TaxiVehicle>> {
        let driver = self.driver(user_id).await?;
        self.repo.driver_vehicles(driver.id).await
    }

    pub async fn add_vehicle(&self, user_id: Uuid, input: VehicleInput) -> CoreResult<TaxiVehicle> {
        let driver = self.driver(user_id).await?;
        if input.name.trim().is_empty() || input.vehicle_no.trim().is_empty() {
            return Err(CoreError::ValidationError("Vehicle name and number are required".into()));
        }
        let vehicle = TaxiVehicle {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            vehicle_no: input.vehicle_no.trim().to_uppercase(),
            driver_id: driver.id,
            is_active: input.is_active,
            created_at: Utc::now(),
        };
        self.repo.create_vehicle(&vehicle).await?;
        Ok(vehicle)
    }

    async fn own_vehicle(&self, user_id: Uuid, id: Uuid) -> CoreResult<TaxiVehicle> {
        let driver = self.driver(user_id).await?;
        match self.repo.get_vehicle(id).await? {
            Some(v) if v.driver_id == driver.id => Ok(v),
            _ => Err(CoreError::not_found("vehicle", id)),
        }
    }

    pub async fn update_vehicle(&self, user_id: Uuid, id: Uuid, input: VehicleInput) -> CoreResult<TaxiVehicle> {
        let mut vehicle = self.own_vehicle(user_id, id).await?;
        vehicle.name = input.name.trim().to_string();
        vehicle.vehicle_no = input.vehicle_no.trim().to_uppercase();
        vehicle.is_active = input.is_active;
        self.repo.update_vehicle(&vehicle).await?;
        Ok(vehicle)
    }

    pub async fn remove_vehicle(&self, user_id: Uuid, id: Uuid) -> CoreResult<()> {
        let vehicle = self.own_vehicle(user_id, id).await?;
        self.repo.delete_vehicle(vehicle.id).await
    }

    // Administration

    pub async fn register_driver(&self, user_id: Uuid, license: &str) -> CoreResult<Driver> {
        let mut user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        if license.trim().is_empty() {
            return Err(CoreError::ValidationError("License is required".into()));
        }
        user.is_driver = true;
        user.validate()?;

        let driver = Driver {
            id: Uuid::new_v4(),
            user_id,
            license: license.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.repo.create_driver(&driver).await?;
        self.accounts.update_user(&user).await?;
        Ok(driver)
    }

    pub async fn create_trip(&self, from_place: Uuid, to_place: Uuid) -> CoreResult<Trip> {
        if from_place == to_place {
            return Err(CoreError::ValidationError("Trip must connect two different places".into()));
        }
        require_place(self.accounts.as_ref(), from_place, "from_place").await?;
        require_place(self.accounts.as_ref(), to_place, "to_place").await?;
        let trip = Trip { id: Uuid::new_v4(), from_place, to_place };
        self.repo.create_trip(&trip).await?;
        Ok(trip)
    }

    pub async fn create_seater(&self, trip_id: Uuid, seat: &str, price: Decimal) -> CoreResult<Seater> {
        self.repo
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id))?;
        if price < Decimal::ZERO {
            return Err(CoreError::ValidationError("Seater price cannot be negative".into()));
        }
        let seater = Seater {
            id: Uuid::new_v4(),
            seat: seat.trim().to_string(),
            price: round_money(price),
            trip_id,
        };
        self.repo.create_seater(&seater).await?;
        Ok(seater)
    }

    pub async fn all_bookings(&self, filter: BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        self.repo.list_bookings(&filter).await
    }

    pub async fn set_payment_status(&self, booking_id: Uuid, status: PaymentStatus) -> CoreResult<TaxiBooking> {
        self.booking(booking_id).await?;
        self.repo.set_payment_status(booking_id, status).await
    }
}

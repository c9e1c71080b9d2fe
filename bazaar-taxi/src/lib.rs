pub mod dispatch;
pub mod earnings;
pub mod models;
pub mod repository;
pub mod service;

pub use models::{Driver, PaymentStatus, Seater, TaxiBooking, TaxiVehicle, Trip, TripStatus};
pub use repository::{BookingFilter, TaxiRepository};
pub use service::TaxiService;

use bazaar_core::CoreError;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum TaxiError {
    #[error("No vehicles available in the system")]
    NoVehicles,
    #[error("All vehicles are booked for {0}. Please choose a different date.")]
    FullyBooked(NaiveDate),
    #[error("Seater does not belong to the selected trip")]
    SeaterTripMismatch,
    #[error("Booking is already assigned to a vehicle")]
    AlreadyAssigned,
    #[error("You must have at least one active vehicle to accept bookings")]
    NoActiveVehicle,
    #[error("Vehicle is already booked for this date and time")]
    SlotTaken,
    #[error("Cannot change trip status from {from} to {to}")]
    InvalidTransition { from: TripStatus, to: TripStatus },
    #[error("Only pending or confirmed bookings can be cancelled")]
    NotCancellable,
    #[error("Only drivers can access this endpoint")]
    NotDriver,
    #[error("Booking not found or not assigned to you")]
    NotAssignedToDriver,
    #[error("Cannot reject an already assigned booking. Use cancel instead.")]
    RejectAssigned,
}

impl From<TaxiError> for CoreError {
    fn from(err: TaxiError) -> Self {
        match err {
            TaxiError::NotDriver => CoreError::Forbidden(err.to_string()),
            TaxiError::NotAssignedToDriver => CoreError::NotFound(err.to_string()),
            TaxiError::SlotTaken | TaxiError::AlreadyAssigned => CoreError::Conflict(err.to_string()),
            _ => CoreError::ValidationError(err.to_string()),
        }
    }
}

pub type TaxiResult<T> = Result<T, TaxiError>;

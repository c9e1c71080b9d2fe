pub mod boarding;
pub mod booking;
pub mod commission;
pub mod dashboard;
pub mod models;
pub mod repository;
pub mod roles;
pub mod seats;
pub mod service;

pub use commission::Commissions;
pub use models::{
    Agent, BookingStatus, Committee, CommissionKind, CommissionRule, Dealer, Floor, Passenger, Seat,
    SeatSide, SeatStatus, Staff, TravelBooking, TravelVehicle,
};
pub use repository::{BookingScope, TravelRepository, VehicleScope};
pub use roles::{PrimaryRole, TravelRoles};
pub use service::TravelService;

use bazaar_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum TravelError {
    #[error("You do not have permission to {0}")]
    PermissionDenied(&'static str),
    #[error("Booking date cannot be in the past")]
    PastDate,
    #[error("Cannot reset seats for past dates")]
    PastResetDate,
    #[error("At least one seat must be selected")]
    NoSeats,
    #[error("Some selected seats are not available")]
    SeatsUnavailable,
    #[error("Seat price must be at least the actual seat price and neither may be negative")]
    InvalidPricing,
    #[error("Ticket number or QR code is required")]
    MissingTicket,
    #[error("Ticket is for {0}, not today")]
    NotToday(chrono::NaiveDate),
    #[error("Booking status is {0}, cannot board")]
    NotBoardable(models::BookingStatus),
    #[error("Seat is not in booked status")]
    SeatNotBooked,
    #[error("Booking does not belong to your committee")]
    ForeignCommittee,
    #[error("This user is already staff for this committee")]
    DuplicateStaff,
}

impl From<TravelError> for CoreError {
    fn from(err: TravelError) -> Self {
        match err {
            TravelError::PermissionDenied(_) | TravelError::ForeignCommittee => {
                CoreError::Forbidden(err.to_string())
            }
            TravelError::DuplicateStaff => CoreError::Conflict(err.to_string()),
            _ => CoreError::ValidationError(err.to_string()),
        }
    }
}

pub type TravelResult<T> = Result<T, TravelError>;

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub license: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxiVehicle {
    pub id: Uuid,
    pub name: String,
    pub vehicle_no: String,
    pub driver_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A fixed route between two places.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub from_place: Uuid,
    pub to_place: Uuid,
}

/// A priced seat option on a trip, such as "Front Seat".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seater {
    pub id: Uuid,
    pub seat: String,
    pub price: Decimal,
    pub trip_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Pending,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Pending, confirmed and ongoing trips still need a vehicle on the road.
    pub fn is_active(&self) -> bool {
        matches!(self, TripStatus::Pending | TripStatus::Confirmed | TripStatus::Ongoing)
    }

    pub fn can_transition_to(&self, next: TripStatus) -> bool {
        use TripStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Ongoing) | (Confirmed, Cancelled) | (Ongoing, Completed)
        )
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TripStatus::Pending => "pending",
            TripStatus::Confirmed => "confirmed",
            TripStatus::Ongoing => "ongoing",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxiBooking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub trip_id: Uuid,
    pub seater_id: Uuid,
    pub price: Decimal,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub payment_status: PaymentStatus,
    pub vehicle_id: Option<Uuid>,
    pub trip_status: TripStatus,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commission::Commissions;
use crate::{TravelError, TravelResult};

/// The tenant that owns vehicles, staff and routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Committee {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelVehicle {
    pub id: Uuid,
    pub committee_id: Uuid,
    pub name: String,
    pub vehicle_no: String,
    pub from_place: Uuid,
    pub to_place: Uuid,
    pub departure_time: NaiveTime,
    /// What the passenger pays.
    pub seat_price: Decimal,
    /// What the committee receives.
    pub actual_seat_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TravelVehicle {
    pub fn validate(&self) -> TravelResult<()> {
        if self.actual_seat_price < Decimal::ZERO || self.seat_price < self.actual_seat_price {
            return Err(TravelError::InvalidPricing);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeatSide {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Floor {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
    Boarded,
}

impl SeatStatus {
    pub fn is_taken(&self) -> bool {
        matches!(self, SeatStatus::Booked | SeatStatus::Boarded)
    }
}

/// A bookable seat. Unique per vehicle, side, number and floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub side: SeatSide,
    pub number: i32,
    pub floor: Floor,
    pub status: SeatStatus,
}

impl Seat {
    pub fn label(&self) -> String {
        format!("{:?}{}", self.side, self.number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub user_id: Uuid,
    pub committee_id: Uuid,
    pub booking_permission: bool,
    pub boarding_permission: bool,
    pub finance_permission: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    Flat,
    Percentage,
}

/// How an intermediary is paid out of the system commission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionRule {
    #[serde(rename = "commission_type")]
    pub kind: CommissionKind,
    #[serde(rename = "commission_value")]
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dealer {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub rule: CommissionRule,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dealer_id: Option<Uuid>,
    #[serde(flatten)]
    pub rule: CommissionRule,
    pub is_active: bool,
    pub committee_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Booked,
    Boarded,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Booked => "booked",
            BookingStatus::Boarded => "boarded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub phone: String,
    pub gender: Gender,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelBooking {
    pub id: Uuid,
    pub ticket_number: String,
    pub customer_id: Option<Uuid>,
    #[serde(flatten)]
    pub passenger: Passenger,
    pub remarks: Option<String>,
    pub agent_id: Option<Uuid>,
    pub booked_by: Uuid,
    pub vehicle_id: Uuid,
    pub seat_id: Uuid,
    pub status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub boarding_date: Option<DateTime<Utc>>,
    pub boarding_place: Option<Uuid>,
    pub actual_price: Decimal,
    #[serde(flatten)]
    pub commissions: Commissions,
    pub created_at: DateTime<Utc>,
}

impl TravelBooking {
    /// Scanners may send either value; both carry the ticket number.
    pub fn qr_value(&self) -> &str {
        &self.ticket_number
    }
}

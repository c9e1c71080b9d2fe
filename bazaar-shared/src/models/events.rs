use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Facts published on the in-process event bus after a state change commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    TravelBooked {
        booking_ids: Vec<Uuid>,
        vehicle_id: Uuid,
        booking_date: DateTime<Utc>,
        booked_by: Uuid,
    },
    PassengerBoarded {
        booking_id: Uuid,
        ticket_number: String,
        boarded_at: DateTime<Utc>,
    },
    CommissionDistributed {
        booking_id: Uuid,
        postings: usize,
        total: Decimal,
    },
    SeatsReset {
        vehicle_id: Uuid,
        count: u64,
    },
    TaxiBooked {
        booking_id: Uuid,
        trip_id: Uuid,
        date: NaiveDate,
    },
    OrderPlaced {
        order_ids: Vec<Uuid>,
        user_id: Uuid,
        total: Decimal,
    },
    OrderDelivered {
        order_id: Uuid,
        commission: Decimal,
        payout: Decimal,
    },
    WithdrawalReviewed {
        withdrawal_id: Uuid,
        approved: bool,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::TravelBooked { .. } => "travel_booked",
            DomainEvent::PassengerBoarded { .. } => "passenger_boarded",
            DomainEvent::CommissionDistributed { .. } => "commission_distributed",
            DomainEvent::SeatsReset { .. } => "seats_reset",
            DomainEvent::TaxiBooked { .. } => "taxi_booked",
            DomainEvent::OrderPlaced { .. } => "order_placed",
            DomainEvent::OrderDelivered { .. } => "order_delivered",
            DomainEvent::WithdrawalReviewed { .. } => "withdrawal_reviewed",
        }
    }
}

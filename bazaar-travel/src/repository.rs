use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use bazaar_core::{CoreResult, Credit, WalletTransaction};

use crate::models::{Agent, BookingStatus, Committee, Dealer, Seat, Staff, TravelBooking, TravelVehicle};

/// Which bookings a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingScope {
    Committee(Uuid),
    /// Bookings made by the dealer's agents.
    Dealer(Uuid),
    Agent(Uuid),
    Customer(Uuid),
}

/// Which vehicles a caller may list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleScope {
    Committee(Uuid),
    /// Active vehicles of these committees.
    Committees(Vec<Uuid>),
    AllActive,
}

#[derive(Debug, Clone)]
pub struct BoardingOutcome {
    pub booking: TravelBooking,
    /// Empty when the booking had already been paid out.
    pub transactions: Vec<WalletTransaction>,
}

#[async_trait]
pub trait TravelRepository: Send + Sync {
    async fn create_committee(&self, committee: &Committee) -> CoreResult<()>;

    async fn get_committee(&self, id: Uuid) -> CoreResult<Option<Committee>>;

    async fn update_committee(&self, committee: &Committee) -> CoreResult<()>;

    /// The user's active committee, if any.
    async fn committee_for_user(&self, user_id: Uuid) -> CoreResult<Option<Committee>>;

    async fn staff_for_user(&self, user_id: Uuid) -> CoreResult<Option<Staff>>;

    async fn get_staff(&self, id: Uuid) -> CoreResult<Option<Staff>>;

    async fn list_staff(&self, committee_id: Uuid) -> CoreResult<Vec<Staff>>;

    /// Fails with `Conflict` when the user is already staff of the committee.
    async fn create_staff(&self, staff: &Staff) -> CoreResult<()>;

    async fn update_staff(&self, staff: &Staff) -> CoreResult<()>;

    async fn delete_staff(&self, id: Uuid) -> CoreResult<()>;

    async fn create_dealer(&self, dealer: &Dealer) -> CoreResult<()>;

    async fn get_dealer(&self, id: Uuid) -> CoreResult<Option<Dealer>>;

    async fn update_dealer(&self, dealer: &Dealer) -> CoreResult<()>;

    /// The user's active dealer record, if any.
    async fn dealer_for_user(&self, user_id: Uuid) -> CoreResult<Option<Dealer>>;

    async fn create_agent(&self, agent: &Agent) -> CoreResult<()>;

    async fn get_agent(&self, id: Uuid) -> CoreResult<Option<Agent>>;

    async fn update_agent(&self, agent: &Agent) -> CoreResult<()>;

    /// The user's active agent record, if any.
    async fn agent_for_user(&self, user_id: Uuid) -> CoreResult<Option<Agent>>;

    async fn list_agents(&self, dealer_id: Uuid) -> CoreResult<Vec<Agent>>;

    /// Stores the vehicle with its seat layout.
    async fn create_vehicle(&self, vehicle: &TravelVehicle, seats: &[Seat]) -> CoreResult<()>;

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TravelVehicle>>;

    /// Updates the vehicle's details. The seat layout is not touched.
    async fn update_vehicle(&self, vehicle: &TravelVehicle) -> CoreResult<()>;

    async fn list_vehicles(&self, scope: &VehicleScope) -> CoreResult<Vec<TravelVehicle>>;

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>>;

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>>;

    /// Seats with a pending or booked booking on the date.
    async fn held_seats(&self, vehicle_id: Uuid, date: NaiveDate) -> CoreResult<HashSet<Uuid>>;

    /// Inserts the bookings and flips their seats from available to booked.
    /// Fails with `Conflict` and writes nothing if any seat is no longer available.
    async fn commit_bookings(&self, bookings: &[TravelBooking]) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TravelBooking>>;

    async fn find_ticket(&self, committee_id: Uuid, ticket_number: &str) -> CoreResult<Option<TravelBooking>>;

    /// Newest first.
    async fn list_bookings(&self, scope: BookingScope, status: Option<BookingStatus>) -> CoreResult<Vec<TravelBooking>>;

    /// `booked` bookings of the committee, oldest travel date first.
    async fn boarding_queue(&self, committee_id: Uuid) -> CoreResult<Vec<TravelBooking>>;

    /// Marks the booking and its seat boarded and applies `credits` in the
    /// same transaction, unless completed transactions already reference the
    /// booking. Fails with `Conflict` if the booking is no longer `booked`.
    async fn board_passenger(
        &self,
        booking_id: Uuid,
        boarded_at: DateTime<Utc>,
        credits: &[Credit],
    ) -> CoreResult<BoardingOutcome>;

    /// Sets the vehicle's `booked` seats back to available. Boarded seats stay.
    async fn reset_booked_seats(&self, vehicle_id: Uuid) -> CoreResult<u64>;
}

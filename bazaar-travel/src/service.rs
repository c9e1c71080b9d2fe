use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::repository::{require_place, AccountRepository, WalletRepository};
use bazaar_core::{
    Account, CoreError, CoreResult, PeriodTotals, TransactionFilter, TransactionStatus, TransactionType,
    WalletTransaction,
};

use crate::boarding::{self, Payees, TicketScan};
use crate::booking::{self, BookingContext, NewBooking};
use crate::dashboard::{
    self, AgentDashboard, BoardingWidget, BookingCounts, BookingWidget, CommitteeDashboard, CommitteeSummary,
    DealerDashboard, FinanceWidget, StaffDashboard, StaffPermissions, StaffWidgets,
};
use crate::models::{
    Agent, BookingStatus, CommissionKind, CommissionRule, Committee, Dealer, Floor, Passenger, Seat, Staff, TravelBooking,
    TravelVehicle,
};
use crate::repository::{BoardingOutcome, BookingScope, TravelRepository, VehicleScope};
use crate::roles::TravelRoles;
use crate::seats::{self, SeatAvailability, SeatLayout, SeatRow};
use crate::TravelError;

#[derive(Debug, Clone, Deserialize)]
pub struct StaffInput {
    pub user_id: Uuid,
    #[serde(default)]
    pub booking_permission: bool,
    #[serde(default)]
    pub boarding_permission: bool,
    #[serde(default)]
    pub finance_permission: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffPatch {
    pub booking_permission: Option<bool>,
    pub boarding_permission: Option<bool>,
    pub finance_permission: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub committee_id: Uuid,
    pub name: String,
    pub vehicle_no: String,
    pub from_place: Uuid,
    pub to_place: Uuid,
    pub departure_time: NaiveTime,
    pub seat_price: Decimal,
    pub actual_seat_price: Decimal,
    pub seats: Vec<SeatRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub user_id: Uuid,
    pub dealer_id: Option<Uuid>,
    #[serde(flatten)]
    pub rule: CommissionRule,
    #[serde(default)]
    pub committee_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitteePatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealerPatch {
    pub commission_type: Option<CommissionKind>,
    pub commission_value: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPatch {
    pub dealer_id: Option<Uuid>,
    pub commission_type: Option<CommissionKind>,
    pub commission_value: Option<Decimal>,
    pub committee_ids: Option<Vec<Uuid>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    pub name: Option<String>,
    pub vehicle_no: Option<String>,
    pub from_place: Option<Uuid>,
    pub to_place: Option<Uuid>,
    pub departure_time: Option<NaiveTime>,
    pub seat_price: Option<Decimal>,
    pub actual_seat_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

fn patch_rule(rule: &mut CommissionRule, kind: Option<CommissionKind>, value: Option<Decimal>) -> CoreResult<()> {
    if let Some(kind) = kind {
        rule.kind = kind;
    }
    if let Some(value) = value {
        rule.value = value;
    }
    check_rule(rule)
}

/// Printable ticket data. Rendering to PDF or QR images is left to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub ticket_number: String,
    pub qr_value: String,
    pub committee: String,
    #[serde(flatten)]
    pub passenger: Passenger,
    pub vehicle_name: String,
    pub vehicle_no: String,
    pub seat: String,
    pub floor: Floor,
    pub departure_time: NaiveTime,
    pub booking_date: DateTime<Utc>,
    pub amount_paid: Decimal,
    pub status: BookingStatus,
}

/// Travel ticketing operations, with role checks applied per caller.
pub struct TravelService {
    repo: Arc<dyn TravelRepository>,
    accounts: Arc<dyn AccountRepository>,
    wallet: Arc<dyn WalletRepository>,
}

impl TravelService {
    pub fn new(
        repo: Arc<dyn TravelRepository>,
        accounts: Arc<dyn AccountRepository>,
        wallet: Arc<dyn WalletRepository>,
    ) -> Self {
        Self { repo, accounts, wallet }
    }

    pub async fn roles(&self, user_id: Uuid) -> CoreResult<TravelRoles> {
        Ok(TravelRoles {
            user_id,
            committee: self.repo.committee_for_user(user_id).await?,
            staff: self.repo.staff_for_user(user_id).await?,
            dealer: self.repo.dealer_for_user(user_id).await?,
            agent: self.repo.agent_for_user(user_id).await?,
        })
    }

    async fn vehicle(&self, id: Uuid) -> CoreResult<TravelVehicle> {
        self.repo
            .get_vehicle(id)
            .await?
            .ok_or_else(|| CoreError::not_found("vehicle", id))
    }

    async fn booking(&self, id: Uuid) -> CoreResult<TravelBooking> {
        self.repo
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", id))
    }

    async fn committee(&self, id: Uuid) -> CoreResult<Committee> {
        self.repo
            .get_committee(id)
            .await?
            .ok_or_else(|| CoreError::not_found("committee", id))
    }

    async fn active_committees(&self, ids: &[Uuid]) -> CoreResult<Vec<Committee>> {
        let mut committees = Vec::new();
        for id in ids {
            if let Some(c) = self.repo.get_committee(*id).await? {
                if c.is_active {
                    committees.push(c);
                }
            }
        }
        Ok(committees)
    }

    // Vehicles and seats

    pub async fn list_vehicles(
        &self,
        roles: &TravelRoles,
        committee_id: Option<Uuid>,
        is_active: Option<bool>,
    ) -> CoreResult<Vec<TravelVehicle>> {
        let assigned = match &roles.agent {
            Some(agent) => self
                .active_committees(&agent.committee_ids)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect(),
            None => Vec::new(),
        };
        let scope = roles.vehicle_scope(assigned);
        let vehicles = self.repo.list_vehicles(&scope).await?;
        Ok(vehicles
            .into_iter()
            .filter(|v| committee_id.map_or(true, |c| v.committee_id == c))
            .filter(|v| is_active.map_or(true, |a| v.is_active == a))
            .collect())
    }

    pub async fn vehicle_detail(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<TravelVehicle> {
        let vehicle = self.vehicle(id).await?;
        if !roles.can_view_vehicle(&vehicle) {
            return Err(TravelError::PermissionDenied("view this vehicle").into());
        }
        Ok(vehicle)
    }

    pub async fn seat_layout(&self, vehicle_id: Uuid) -> CoreResult<SeatLayout> {
        self.vehicle(vehicle_id).await?;
        let seats = self.repo.list_seats(vehicle_id).await?;
        Ok(seats::layout(&seats))
    }

    pub async fn available_seats(&self, vehicle_id: Uuid, date: NaiveDate) -> CoreResult<Vec<SeatAvailability>> {
        self.vehicle(vehicle_id).await?;
        seats::check_travel_date(date, Utc::now().date_naive())?;
        let seats = self.repo.list_seats(vehicle_id).await?;
        let held = self.repo.held_seats(vehicle_id, date).await?;
        Ok(seats::availability(&seats, &held))
    }

    pub async fn reset_seats(&self, roles: &TravelRoles, vehicle_id: Uuid, date: Option<NaiveDate>) -> CoreResult<u64> {
        let vehicle = self.vehicle(vehicle_id).await?;
        if roles.managed_committee() != Some(vehicle.committee_id) {
            return Err(TravelError::PermissionDenied("reset seats for this vehicle").into());
        }
        seats::check_reset_date(date, Utc::now().date_naive())?;

        let count = self.repo.reset_booked_seats(vehicle_id).await?;
        tracing::info!(vehicle_id = %vehicle_id, count, "Seats reset to available");
        Ok(count)
    }

    // Bookings

    pub async fn create_bookings(&self, roles: &TravelRoles, request: NewBooking) -> CoreResult<Vec<TravelBooking>> {
        let agent = roles.booking_agent()?;
        let vehicle = self.vehicle(request.vehicle_id).await?;
        if let Some(place) = request.boarding_place {
            require_place(self.accounts.as_ref(), place, "boarding_place").await?;
        }
        let dealer = match agent.and_then(|a| a.dealer_id) {
            Some(id) => self.repo.get_dealer(id).await?,
            None => None,
        };
        let seats = self.repo.list_seats(vehicle.id).await?;

        let ctx = BookingContext {
            booked_by: roles.user_id,
            vehicle: &vehicle,
            seats: &seats,
            agent,
            dealer: dealer.as_ref(),
        };
        let bookings = booking::plan(&ctx, &request, Utc::now())?;

        self.repo.commit_bookings(&bookings).await?;
        tracing::info!(
            vehicle_id = %vehicle.id,
            seats = bookings.len(),
            booked_by = %roles.user_id,
            "Travel bookings created"
        );
        Ok(bookings)
    }

    pub async fn list_bookings(
        &self,
        roles: &TravelRoles,
        status: Option<BookingStatus>,
        committee_id: Option<Uuid>,
    ) -> CoreResult<Vec<TravelBooking>> {
        let bookings = self.repo.list_bookings(roles.booking_scope(), status).await?;
        let Some(committee_id) = committee_id else {
            return Ok(bookings);
        };

        let mut filtered = Vec::with_capacity(bookings.len());
        for b in bookings {
            if let Some(v) = self.repo.get_vehicle(b.vehicle_id).await? {
                if v.committee_id == committee_id {
                    filtered.push(b);
                }
            }
        }
        Ok(filtered)
    }

    pub async fn booking_detail(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<TravelBooking> {
        let booking = self.booking(id).await?;
        let vehicle = self.vehicle(booking.vehicle_id).await?;
        let agent_dealer = match booking.agent_id {
            Some(agent_id) => self.repo.get_agent(agent_id).await?.and_then(|a| a.dealer_id),
            None => None,
        };
        if !roles.can_view_booking(&booking, &vehicle, agent_dealer) {
            return Err(TravelError::PermissionDenied("view this booking").into());
        }
        Ok(booking)
    }

    pub async fn ticket(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<Ticket> {
        let booking = self.booking_detail(roles, id).await?;
        let vehicle = self.vehicle(booking.vehicle_id).await?;
        let committee = self.committee(vehicle.committee_id).await?;
        let seat = self
            .repo
            .get_seat(booking.seat_id)
            .await?
            .ok_or_else(|| CoreError::not_found("seat", booking.seat_id))?;

        Ok(Ticket {
            qr_value: booking.qr_value().to_string(),
            ticket_number: booking.ticket_number,
            committee: committee.name,
            passenger: booking.passenger,
            vehicle_name: vehicle.name,
            vehicle_no: vehicle.vehicle_no,
            seat: seat.label(),
            floor: seat.floor,
            departure_time: vehicle.departure_time,
            booking_date: booking.booking_date,
            amount_paid: vehicle.seat_price,
            status: booking.status,
        })
    }

    // Boarding

    pub async fn boarding_queue(&self, roles: &TravelRoles) -> CoreResult<Vec<TravelBooking>> {
        let staff = roles.boarding_staff()?;
        self.repo.boarding_queue(staff.committee_id).await
    }

    pub async fn scan_ticket(&self, roles: &TravelRoles, scan: &TicketScan) -> CoreResult<TravelBooking> {
        let staff = roles.boarding_staff()?;
        let value = scan.lookup_value()?;
        let booking = self
            .repo
            .find_ticket(staff.committee_id, value)
            .await?
            .ok_or_else(|| CoreError::NotFound("Ticket not found".into()))?;
        let seat = self
            .repo
            .get_seat(booking.seat_id)
            .await?
            .ok_or_else(|| CoreError::not_found("seat", booking.seat_id))?;

        boarding::check_scannable(&booking, &seat, Utc::now().date_naive())?;
        Ok(booking)
    }

    pub async fn confirm_boarding(&self, roles: &TravelRoles, booking_id: Uuid) -> CoreResult<BoardingOutcome> {
        let staff = roles.boarding_staff()?;
        let booking = self.booking(booking_id).await?;
        let vehicle = self.vehicle(booking.vehicle_id).await?;
        boarding::check_boardable(&booking, &vehicle, staff)?;

        let committee = self.committee(vehicle.committee_id).await?;
        let agent = match booking.agent_id {
            Some(id) => self.repo.get_agent(id).await?,
            None => None,
        };
        let dealer = match agent.as_ref().and_then(|a| a.dealer_id) {
            Some(id) => self.repo.get_dealer(id).await?,
            None => None,
        };
        let payees = Payees {
            committee_owner: committee.user_id,
            dealer_user: dealer.map(|d| d.user_id),
            agent_user: agent.map(|a| a.user_id),
        };
        let credits = boarding::distribution(&booking, payees);

        let outcome = self.repo.board_passenger(booking_id, Utc::now(), &credits).await?;
        tracing::info!(
            booking_id = %booking_id,
            ticket = %outcome.booking.ticket_number,
            postings = outcome.transactions.len(),
            "Passenger boarded"
        );
        Ok(outcome)
    }

    // Staff and agents

    pub async fn list_staff(&self, roles: &TravelRoles) -> CoreResult<Vec<Staff>> {
        let committee = roles.require_committee()?;
        self.repo.list_staff(committee.id).await
    }

    pub async fn add_staff(&self, roles: &TravelRoles, input: StaffInput) -> CoreResult<Staff> {
        let committee = roles.require_committee()?;
        self.accounts
            .get_user(input.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", input.user_id))?;

        let existing = self.repo.list_staff(committee.id).await?;
        if existing.iter().any(|s| s.user_id == input.user_id) {
            return Err(TravelError::DuplicateStaff.into());
        }

        let staff = Staff {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            committee_id: committee.id,
            booking_permission: input.booking_permission,
            boarding_permission: input.boarding_permission,
            finance_permission: input.finance_permission,
            created_at: Utc::now(),
        };
        self.repo.create_staff(&staff).await?;
        Ok(staff)
    }

    async fn own_staff(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<Staff> {
        let committee = roles.require_committee()?;
        let staff = self
            .repo
            .get_staff(id)
            .await?
            .ok_or_else(|| CoreError::not_found("staff", id))?;
        if staff.committee_id != committee.id {
            return Err(CoreError::Forbidden("Staff does not belong to your committee".into()));
        }
        Ok(staff)
    }

    pub async fn get_staff(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<Staff> {
        self.own_staff(roles, id).await
    }

    pub async fn update_staff(&self, roles: &TravelRoles, id: Uuid, patch: StaffPatch) -> CoreResult<Staff> {
        let mut staff = self.own_staff(roles, id).await?;
        if let Some(v) = patch.booking_permission {
            staff.booking_permission = v;
        }
        if let Some(v) = patch.boarding_permission {
            staff.boarding_permission = v;
        }
        if let Some(v) = patch.finance_permission {
            staff.finance_permission = v;
        }
        self.repo.update_staff(&staff).await?;
        Ok(staff)
    }

    pub async fn remove_staff(&self, roles: &TravelRoles, id: Uuid) -> CoreResult<()> {
        let staff = self.own_staff(roles, id).await?;
        self.repo.delete_staff(staff.id).await
    }

    pub async fn list_agents(&self, roles: &TravelRoles) -> CoreResult<Vec<Agent>> {
        let dealer = roles.require_dealer()?;
        self.repo.list_agents(dealer.id).await
    }

    // Revenue

    fn revenue_filter(user_id: Uuid) -> TransactionFilter {
        TransactionFilter {
            account: Some(Account::User(user_id)),
            transaction_type: Some(TransactionType::TravelBookingRevenue),
            status: Some(TransactionStatus::Completed),
            ..Default::default()
        }
    }

    pub async fn revenue_history(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<WalletTransaction>> {
        let filter = TransactionFilter { from, to, ..Self::revenue_filter(user_id) };
        let mut history = self.wallet.list_transactions(&filter).await?;
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    pub async fn revenue_stats(&self, user_id: Uuid) -> CoreResult<PeriodTotals> {
        let history = self.wallet.list_transactions(&Self::revenue_filter(user_id)).await?;
        Ok(PeriodTotals::from_transactions(&history, Utc::now().date_naive()))
    }

    // Dashboards

    pub async fn committee_dashboard(&self, roles: &TravelRoles) -> CoreResult<CommitteeDashboard> {
        let committee = roles.require_committee()?;
        let vehicles = self
            .repo
            .list_vehicles(&VehicleScope::Committee(committee.id))
            .await?;
        let mut seats: Vec<Seat> = Vec::new();
        for v in &vehicles {
            seats.extend(self.repo.list_seats(v.id).await?);
        }
        let bookings = self.repo.list_bookings(roles.booking_scope(), None).await?;
        let staff = self.repo.list_staff(committee.id).await?;
        let revenue = self.revenue_stats(roles.user_id).await?;
        let balance = self.wallet.balance(Account::User(roles.user_id)).await?;

        Ok(CommitteeDashboard::build(
            committee,
            &vehicles,
            &seats,
            &bookings,
            revenue,
            staff.len(),
            balance,
            Utc::now().date_naive(),
        ))
    }

    pub async fn staff_dashboard(&self, roles: &TravelRoles) -> CoreResult<StaffDashboard> {
        let staff = roles.require_staff()?;
        let committee = self.committee(staff.committee_id).await?;
        let today = Utc::now().date_naive();
        let mut widgets = StaffWidgets::default();

        if staff.booking_permission {
            let bookings = self
                .repo
                .list_bookings(BookingScope::Committee(committee.id), None)
                .await?;
            let counts = BookingCounts::collect(&bookings, today);
            widgets.booking = Some(BookingWidget { today_bookings: counts.today, pending_count: counts.pending });
        }
        if staff.boarding_permission {
            let queue = self.repo.boarding_queue(committee.id).await?;
            widgets.boarding = Some(BoardingWidget { queue_count: queue.len() });
        }
        if staff.finance_permission {
            let revenue = self.revenue_stats(roles.user_id).await?;
            widgets.finance = Some(FinanceWidget { today_revenue: revenue.today });
        }

        Ok(StaffDashboard {
            staff_id: staff.id,
            committee: CommitteeSummary::from(&committee),
            permissions: StaffPermissions {
                booking: staff.booking_permission,
                boarding: staff.boarding_permission,
                finance: staff.finance_permission,
            },
            widgets,
            balance: self.wallet.balance(Account::User(roles.user_id)).await?,
        })
    }

    pub async fn dealer_dashboard(&self, roles: &TravelRoles) -> CoreResult<DealerDashboard> {
        let dealer = roles.require_dealer()?;
        let agents = self.repo.list_agents(dealer.id).await?;
        let bookings = self
            .repo
            .list_bookings(BookingScope::Dealer(dealer.id), None)
            .await?;

        Ok(DealerDashboard {
            dealer_id: dealer.id,
            rule: dealer.rule,
            agents: DealerDashboard::agent_counts(&agents),
            bookings: BookingCounts::collect(&bookings, Utc::now().date_naive()),
            revenue: self.revenue_stats(roles.user_id).await?,
            top_agents: dashboard::top_agents(&agents, &bookings, 5),
            balance: self.wallet.balance(Account::User(roles.user_id)).await?,
        })
    }

    pub async fn agent_dashboard(&self, roles: &TravelRoles) -> CoreResult<AgentDashboard> {
        let agent = roles.require_agent()?;
        let bookings = self
            .repo
            .list_bookings(BookingScope::Agent(agent.id), None)
            .await?;
        let committees = self.active_committees(&agent.committee_ids).await?;

        Ok(AgentDashboard {
            agent_id: agent.id,
            dealer_id: agent.dealer_id,
            bookings: BookingCounts::collect(&bookings, Utc::now().date_naive()),
            revenue: self.revenue_stats(roles.user_id).await?,
            committees: committees.iter().map(CommitteeSummary::from).collect(),
            balance: self.wallet.balance(Account::User(roles.user_id)).await?,
        })
    }

    // Administration

    pub async fn create_committee(&self, user_id: Uuid, name: &str) -> CoreResult<Committee> {
        self.accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError("Committee name is required".into()));
        }
        let committee = Committee {
            id: Uuid::new_v4(),
            user_id,
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.repo.create_committee(&committee).await?;
        Ok(committee)
    }

    pub async fn create_dealer(&self, user_id: Uuid, rule: CommissionRule) -> CoreResult<Dealer> {
        self.accounts
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        check_rule(&rule)?;
        let dealer = Dealer { id: Uuid::new_v4(), user_id, rule, is_active: true, created_at: Utc::now() };
        self.repo.create_dealer(&dealer).await?;
        Ok(dealer)
    }

    pub async fn create_agent(&self, input: NewAgent) -> CoreResult<Agent> {
        self.accounts
            .get_user(input.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", input.user_id))?;
        check_rule(&input.rule)?;
        if let Some(dealer_id) = input.dealer_id {
            self.repo
                .get_dealer(dealer_id)
                .await?
                .ok_or_else(|| CoreError::not_found("dealer", dealer_id))?;
        }
        for id in &input.committee_ids {
            self.committee(*id).await?;
        }

        let agent = Agent {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            dealer_id: input.dealer_id,
            rule: input.rule,
            is_active: true,
            committee_ids: input.committee_ids,
            created_at: Utc::now(),
        };
        self.repo.create_agent(&agent).await?;
        Ok(agent)
    }

    async fn check_route(&self, from_place: Uuid, to_place: Uuid) -> CoreResult<()> {
        if from_place == to_place {
            return Err(CoreError::ValidationError("Route must connect two different places".into()));
        }
        require_place(self.accounts.as_ref(), from_place, "from_place").await?;
        require_place(self.accounts.as_ref(), to_place, "to_place").await?;
        Ok(())
    }

    pub async fn create_vehicle(&self, input: NewVehicle) -> CoreResult<(TravelVehicle, Vec<Seat>)> {
        self.committee(input.committee_id).await?;
        self.check_route(input.from_place, input.to_place).await?;
        let vehicle = TravelVehicle {
            id: Uuid::new_v4(),
            committee_id: input.committee_id,
            name: input.name,
            vehicle_no: input.vehicle_no,
            from_place: input.from_place,
            to_place: input.to_place,
            departure_time: input.departure_time,
            seat_price: input.seat_price,
            actual_seat_price: input.actual_seat_price,
            is_active: true,
            created_at: Utc::now(),
        };
        vehicle.validate()?;
        let seats = seats::generate(vehicle.id, &input.seats);

        self.repo.create_vehicle(&vehicle, &seats).await?;
        tracing::info!(vehicle_id = %vehicle.id, seats = seats.len(), "Travel vehicle created");
        Ok((vehicle, seats))
    }

    pub async fn update_committee(&self, id: Uuid, patch: CommitteePatch) -> CoreResult<Committee> {
        let mut committee = self.committee(id).await?;
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::ValidationError("Committee name is required".into()));
            }
            committee.name = name.trim().to_string();
        }
        if let Some(active) = patch.is_active {
            committee.is_active = active;
        }
        self.repo.update_committee(&committee).await?;
        tracing::info!(committee_id = %id, is_active = committee.is_active, "Committee updated");
        Ok(committee)
    }

    pub async fn update_dealer(&self, id: Uuid, patch: DealerPatch) -> CoreResult<Dealer> {
        let mut dealer = self
            .repo
            .get_dealer(id)
            .await?
            .ok_or_else(|| CoreError::not_found("dealer", id))?;
        patch_rule(&mut dealer.rule, patch.commission_type, patch.commission_value)?;
        if let Some(active) = patch.is_active {
            dealer.is_active = active;
        }
        self.repo.update_dealer(&dealer).await?;
        tracing::info!(dealer_id = %id, is_active = dealer.is_active, "Dealer updated");
        Ok(dealer)
    }

    pub async fn update_agent(&self, id: Uuid, patch: AgentPatch) -> CoreResult<Agent> {
        let mut agent = self
            .repo
            .get_agent(id)
            .await?
            .ok_or_else(|| CoreError::not_found("agent", id))?;
        patch_rule(&mut agent.rule, patch.commission_type, patch.commission_value)?;
        if let Some(dealer_id) = patch.dealer_id {
            self.repo
                .get_dealer(dealer_id)
                .await?
                .ok_or_else(|| CoreError::not_found("dealer", dealer_id))?;
            agent.dealer_id = Some(dealer_id);
        }
        if let Some(committee_ids) = patch.committee_ids {
            for committee_id in &committee_ids {
                self.committee(*committee_id).await?;
            }
            agent.committee_ids = committee_ids;
        }
        if let Some(active) = patch.is_active {
            agent.is_active = active;
        }
        self.repo.update_agent(&agent).await?;
        tracing::info!(agent_id = %id, is_active = agent.is_active, "Agent updated");
        Ok(agent)
    }

    pub async fn update_vehicle(&self, id: Uuid, patch: VehiclePatch) -> CoreResult<TravelVehicle> {
        let mut vehicle = self.vehicle(id).await?;
        if let Some(name) = patch.name {
            vehicle.name = name;
        }
        if let Some(vehicle_no) = patch.vehicle_no {
            vehicle.vehicle_no = vehicle_no;
        }
        if patch.from_place.is_some() || patch.to_place.is_some() {
            let from_place = patch.from_place.unwrap_or(vehicle.from_place);
            let to_place = patch.to_place.unwrap_or(vehicle.to_place);
            self.check_route(from_place, to_place).await?;
            vehicle.from_place = from_place;
            vehicle.to_place = to_place;
        }
        if let Some(departure_time) = patch.departure_time {
            vehicle.departure_time = departure_time;
        }
        if let Some(price) = patch.seat_price {
            vehicle.seat_price = price;
        }
        if let Some(price) = patch.actual_seat_price {
            vehicle.actual_seat_price = price;
        }
        if let Some(active) = patch.is_active {
            vehicle.is_active = active;
        }
        vehicle.validate()?;
        self.repo.update_vehicle(&vehicle).await?;
        tracing::info!(vehicle_id = %id, is_active = vehicle.is_active, "Travel vehicle updated");
        Ok(vehicle)
    }
}

fn check_rule(rule: &CommissionRule) -> CoreResult<()> {
    if rule.value < Decimal::ZERO {
        return Err(CoreError::ValidationError("Commission value cannot be negative".into()));
    }
    Ok(())
}

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use bazaar_commerce::{
    CartItem, Category, CommerceRepository, Coupon, Order, OrderFilter, OrderItem, OrderStatus, PlacedOrder,
    Product, ProductFilter, Review, Store, WishlistItem,
};
use bazaar_core::address::sort_addresses;
use bazaar_core::otp::OtpChallenge;
use bazaar_core::withdrawal::{available_balance, ApprovalStatus, PaymentSetting};
use bazaar_core::{
    Account, AccountRepository, Address, CoreError, CoreResult, Credit, Notification, Place, PlatformSettings,
    Reference, TransactionFilter, TransactionStatus, User, WalletRepository, WalletTransaction, Withdrawal,
    WithdrawalError, WithdrawalStatus,
};
use bazaar_taxi::{
    BookingFilter, Driver, PaymentStatus, Seater, TaxiBooking, TaxiError, TaxiRepository, TaxiVehicle, Trip, TripStatus,
};
use bazaar_travel::repository::BoardingOutcome;
use bazaar_travel::{
    Agent, BookingScope, BookingStatus, Committee, Dealer, Seat, SeatStatus, Staff, TravelBooking, TravelRepository,
    TravelVehicle, VehicleScope,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    otps: HashMap<String, OtpChallenge>,
    settings: PlatformSettings,
    payment_settings: HashMap<Uuid, PaymentSetting>,
    places: Vec<Place>,
    addresses: HashMap<Uuid, Address>,
    notifications: Vec<Notification>,
    transactions: Vec<WalletTransaction>,
    withdrawals: HashMap<Uuid, Withdrawal>,

    committees: HashMap<Uuid, Committee>,
    staff: HashMap<Uuid, Staff>,
    dealers: HashMap<Uuid, Dealer>,
    agents: HashMap<Uuid, Agent>,
    travel_vehicles: HashMap<Uuid, TravelVehicle>,
    seats: HashMap<Uuid, Seat>,
    travel_bookings: HashMap<Uuid, TravelBooking>,

    drivers: HashMap<Uuid, Driver>,
    taxi_vehicles: HashMap<Uuid, TaxiVehicle>,
    trips: HashMap<Uuid, Trip>,
    seaters: HashMap<Uuid, Seater>,
    taxi_bookings: HashMap<Uuid, TaxiBooking>,

    stores: HashMap<Uuid, Store>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    cart: HashMap<Uuid, CartItem>,
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    reviews: HashMap<Uuid, Review>,
    wishlist: Vec<WishlistItem>,
}

impl Inner {
    fn balance(&self, account: Account) -> CoreResult<Decimal> {
        match account {
            Account::System => Ok(self.settings.system_balance),
            Account::User(id) => self
                .users
                .get(&id)
                .map(|u| u.balance)
                .ok_or_else(|| CoreError::not_found("user", id)),
        }
    }

    fn set_balance(&mut self, account: Account, value: Decimal) {
        match account {
            Account::System => self.settings.system_balance = value,
            Account::User(id) => {
                if let Some(user) = self.users.get_mut(&id) {
                    user.balance = value;
                }
            }
        }
    }

    /// All accounts are checked before any balance moves.
    fn apply_credits(&mut self, credits: &[Credit], at: DateTime<Utc>) -> CoreResult<Vec<WalletTransaction>> {
        for credit in credits {
            self.balance(credit.account)?;
        }
        let mut written = Vec::with_capacity(credits.len());
        for credit in credits {
            let before = self.balance(credit.account)?;
            let (after, tx) = credit.settle(before, at);
            self.set_balance(credit.account, after);
            self.transactions.push(tx.clone());
            written.push(tx);
        }
        Ok(written)
    }

    fn outstanding(&self, user_id: Uuid, exclude: Option<Uuid>) -> Decimal {
        self.withdrawals
            .values()
            .filter(|w| w.merchant_id == user_id && w.status.is_outstanding() && Some(w.id) != exclude)
            .map(|w| w.amount)
            .sum()
    }

    fn approved_setting(&self, user_id: Uuid) -> Option<PaymentSetting> {
        let mut approved: Vec<&PaymentSetting> = self
            .payment_settings
            .values()
            .filter(|s| s.user_id == user_id && s.status == ApprovalStatus::Approved)
            .collect();
        approved.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        approved.first().map(|s| (*s).clone())
    }

    fn pending_line(&self, withdrawal_id: Uuid) -> Option<usize> {
        let reference = Some(Reference::withdrawal(withdrawal_id));
        self.transactions
            .iter()
            .position(|t| t.reference == reference && t.status == TransactionStatus::Pending)
    }

    fn withdrawal(&self, id: Uuid) -> CoreResult<Withdrawal> {
        self.withdrawals
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("withdrawal", id))
    }

    fn committee_vehicles(&self, committee_id: Uuid) -> HashSet<Uuid> {
        self.travel_vehicles
            .values()
            .filter(|v| v.committee_id == committee_id)
            .map(|v| v.id)
            .collect()
    }

    fn active_taxi_vehicles(&self) -> usize {
        self.taxi_vehicles.values().filter(|v| v.is_active).count()
    }

    fn taxi_bookings_on(&self, date: NaiveDate) -> usize {
        self.taxi_bookings
            .values()
            .filter(|b| b.date == date && b.trip_status != TripStatus::Cancelled)
            .count()
    }
}

/// Keeps every table in process memory behind one lock, so each repository
/// call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Overwrites a stored record, failing when it does not exist.
fn replace<T: Clone>(map: &mut HashMap<Uuid, T>, id: Uuid, value: &T, what: &str) -> CoreResult<()> {
    match map.get_mut(&id) {
        Some(stored) => {
            *stored = value.clone();
            Ok(())
        }
        None => Err(CoreError::not_found(what, id)),
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> CoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.phone == phone).cloned())
    }

    async fn create_user(&self, user: &User) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.phone == user.phone) {
            return Err(CoreError::Conflict("Phone number is already registered".into()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .users
            .get_mut(&user.id)
            .ok_or_else(|| CoreError::not_found("user", user.id))?;
        let balance = stored.balance;
        *stored = user.clone();
        stored.balance = balance;
        Ok(())
    }

    async fn save_otp(&self, challenge: &OtpChallenge) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.otps.insert(challenge.phone.clone(), challenge.clone());
        Ok(())
    }

    async fn take_otp(&self, phone: &str) -> CoreResult<Option<OtpChallenge>> {
        Ok(self.inner.write().await.otps.remove(phone))
    }

    async fn get_settings(&self) -> CoreResult<PlatformSettings> {
        Ok(self.inner.read().await.settings.clone())
    }

    async fn save_commission_rates(&self, settings: &PlatformSettings) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.settings.sales_commission = settings.sales_commission;
        inner.settings.shipping_charge_commission = settings.shipping_charge_commission;
        inner.settings.updated_at = settings.updated_at;
        Ok(())
    }

    async fn create_payment_setting(&self, setting: &PaymentSetting) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.payment_settings.insert(setting.id, setting.clone());
        Ok(())
    }

    async fn get_payment_setting(&self, id: Uuid) -> CoreResult<Option<PaymentSetting>> {
        Ok(self.inner.read().await.payment_settings.get(&id).cloned())
    }

    async fn list_payment_settings(&self, user_id: Option<Uuid>) -> CoreResult<Vec<PaymentSetting>> {
        let inner = self.inner.read().await;
        let mut settings: Vec<PaymentSetting> = inner
            .payment_settings
            .values()
            .filter(|s| user_id.map_or(true, |u| s.user_id == u))
            .cloned()
            .collect();
        newest_first(&mut settings, |s| s.created_at);
        Ok(settings)
    }

    async fn approved_payment_setting(&self, user_id: Uuid) -> CoreResult<Option<PaymentSetting>> {
        Ok(self.inner.read().await.approved_setting(user_id))
    }

    async fn set_payment_setting_status(&self, id: Uuid, status: ApprovalStatus) -> CoreResult<PaymentSetting> {
        let mut inner = self.inner.write().await;
        let setting = inner
            .payment_settings
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("payment setting", id))?;
        setting.status = status;
        Ok(setting.clone())
    }

    async fn create_place(&self, place: &Place) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.places.iter().any(|p| p.name.eq_ignore_ascii_case(&place.name)) {
            return Err(CoreError::Conflict(format!("Place {} already exists", place.name)));
        }
        inner.places.push(place.clone());
        Ok(())
    }

    async fn list_places(&self) -> CoreResult<Vec<Place>> {
        let mut places = self.inner.read().await.places.clone();
        places.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(places)
    }

    async fn get_place(&self, id: Uuid) -> CoreResult<Option<Place>> {
        Ok(self.inner.read().await.places.iter().find(|p| p.id == id).cloned())
    }

    async fn list_addresses(&self, user_id: Uuid) -> CoreResult<Vec<Address>> {
        let inner = self.inner.read().await;
        let mut addresses: Vec<Address> = inner.addresses.values().filter(|a| a.user_id == user_id).cloned().collect();
        sort_addresses(&mut addresses);
        Ok(addresses)
    }

    async fn get_address(&self, id: Uuid) -> CoreResult<Option<Address>> {
        Ok(self.inner.read().await.addresses.get(&id).cloned())
    }

    async fn save_address(&self, address: &Address) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if address.is_default {
            for other in inner.addresses.values_mut() {
                if other.user_id == address.user_id && other.id != address.id {
                    other.is_default = false;
                }
            }
        }
        inner.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn delete_address(&self, id: Uuid) -> CoreResult<()> {
        self.inner
            .write()
            .await
            .addresses
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("address", id))
    }

    async fn create_notification(&self, notification: &Notification) -> CoreResult<()> {
        self.inner.write().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> CoreResult<Vec<Notification>> {
        let inner = self.inner.read().await;
        let mut notifications: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        newest_first(&mut notifications, |n| n.created_at);
        Ok(notifications)
    }

    async fn mark_notifications_read(&self, user_id: Uuid, id: Option<Uuid>) -> CoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for n in inner.notifications.iter_mut() {
            if n.user_id == user_id && !n.is_read && id.map_or(true, |id| n.id == id) {
                n.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl WalletRepository for MemoryStore {
    async fn balance(&self, account: Account) -> CoreResult<Decimal> {
        self.inner.read().await.balance(account)
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> CoreResult<Vec<WalletTransaction>> {
        let inner = self.inner.read().await;
        let mut txs: Vec<WalletTransaction> = inner.transactions.iter().filter(|t| filter.matches(t)).cloned().collect();
        newest_first(&mut txs, |t| t.created_at);
        Ok(txs)
    }

    async fn outstanding_withdrawals(&self, user_id: Uuid, exclude: Option<Uuid>) -> CoreResult<Decimal> {
        Ok(self.inner.read().await.outstanding(user_id, exclude))
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal, pending: &WalletTransaction) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let balance = inner.balance(Account::User(withdrawal.merchant_id))?;
        let available = available_balance(balance, inner.outstanding(withdrawal.merchant_id, None));
        if withdrawal.amount > available {
            return Err(WithdrawalError::InsufficientBalance { available, requested: withdrawal.amount }.into());
        }
        inner.withdrawals.insert(withdrawal.id, withdrawal.clone());
        inner.transactions.push(pending.clone());
        Ok(())
    }

    async fn get_withdrawal(&self, id: Uuid) -> CoreResult<Option<Withdrawal>> {
        Ok(self.inner.read().await.withdrawals.get(&id).cloned())
    }

    async fn list_withdrawals(
        &self,
        merchant_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
    ) -> CoreResult<Vec<Withdrawal>> {
        let inner = self.inner.read().await;
        let mut list: Vec<Withdrawal> = inner
            .withdrawals
            .values()
            .filter(|w| merchant_id.map_or(true, |m| w.merchant_id == m) && status.map_or(true, |s| w.status == s))
            .cloned()
            .collect();
        newest_first(&mut list, |w| w.created_at);
        Ok(list)
    }

    async fn mark_withdrawal_processing(&self, id: Uuid) -> CoreResult<Withdrawal> {
        let mut inner = self.inner.write().await;
        let mut withdrawal = inner.withdrawal(id)?;
        withdrawal.check_reviewable()?;
        withdrawal.status = WithdrawalStatus::Processing;
        inner.withdrawals.insert(id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn approve_withdrawal(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Withdrawal> {
        let mut inner = self.inner.write().await;
        let mut withdrawal = inner.withdrawal(id)?;
        let account = Account::User(withdrawal.merchant_id);

        let setting = inner.approved_setting(withdrawal.merchant_id);
        let balance = inner.balance(account)?;
        let others = inner.outstanding(withdrawal.merchant_id, Some(id));
        withdrawal.check_approvable(setting.as_ref(), balance, others)?;

        let index = inner
            .pending_line(id)
            .ok_or_else(|| CoreError::InternalError(format!("Withdrawal {} has no pending ledger line", id)))?;
        let mut ledger = inner.transactions[index].clone();
        let after = withdrawal.approve(&mut ledger, balance, at);

        inner.set_balance(account, after);
        inner.transactions[index] = ledger;
        inner.withdrawals.insert(id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn reject_withdrawal(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> CoreResult<Withdrawal> {
        let mut inner = self.inner.write().await;
        let mut withdrawal = inner.withdrawal(id)?;
        withdrawal.check_reviewable()?;
        let index = inner
            .pending_line(id)
            .ok_or_else(|| CoreError::InternalError(format!("Withdrawal {} has no pending ledger line", id)))?;
        let mut ledger = inner.transactions[index].clone();
        withdrawal.reject(&mut ledger, reason, at)?;

        inner.transactions[index] = ledger;
        inner.withdrawals.insert(id, withdrawal.clone());
        Ok(withdrawal)
    }
}

#[async_trait]
impl TravelRepository for MemoryStore {
    async fn create_committee(&self, committee: &Committee) -> CoreResult<()> {
        self.inner.write().await.committees.insert(committee.id, committee.clone());
        Ok(())
    }

    async fn get_committee(&self, id: Uuid) -> CoreResult<Option<Committee>> {
        Ok(self.inner.read().await.committees.get(&id).cloned())
    }

    async fn update_committee(&self, committee: &Committee) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.committees, committee.id, committee, "committee")
    }

    async fn committee_for_user(&self, user_id: Uuid) -> CoreResult<Option<Committee>> {
        let inner = self.inner.read().await;
        Ok(inner.committees.values().find(|c| c.user_id == user_id && c.is_active).cloned())
    }

    async fn staff_for_user(&self, user_id: Uuid) -> CoreResult<Option<Staff>> {
        let inner = self.inner.read().await;
        Ok(inner.staff.values().find(|s| s.user_id == user_id).cloned())
    }

    async fn get_staff(&self, id: Uuid) -> CoreResult<Option<Staff>> {
        Ok(self.inner.read().await.staff.get(&id).cloned())
    }

    async fn list_staff(&self, committee_id: Uuid) -> CoreResult<Vec<Staff>> {
        let inner = self.inner.read().await;
        let mut staff: Vec<Staff> = inner.staff.values().filter(|s| s.committee_id == committee_id).cloned().collect();
        newest_first(&mut staff, |s| s.created_at);
        Ok(staff)
    }

    async fn create_staff(&self, staff: &Staff) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .staff
            .values()
            .any(|s| s.user_id == staff.user_id && s.committee_id == staff.committee_id)
        {
            return Err(CoreError::Conflict("User is already staff of this committee".into()));
        }
        inner.staff.insert(staff.id, staff.clone());
        Ok(())
    }

    async fn update_staff(&self, staff: &Staff) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.staff.get_mut(&staff.id) {
            Some(stored) => {
                *stored = staff.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("staff", staff.id)),
        }
    }

    async fn delete_staff(&self, id: Uuid) -> CoreResult<()> {
        self.inner
            .write()
            .await
            .staff
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("staff", id))
    }

    async fn create_dealer(&self, dealer: &Dealer) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.dealers.values().any(|d| d.user_id == dealer.user_id) {
            return Err(CoreError::Conflict("User is already a dealer".into()));
        }
        inner.dealers.insert(dealer.id, dealer.clone());
        Ok(())
    }

    async fn get_dealer(&self, id: Uuid) -> CoreResult<Option<Dealer>> {
        Ok(self.inner.read().await.dealers.get(&id).cloned())
    }

    async fn update_dealer(&self, dealer: &Dealer) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.dealers, dealer.id, dealer, "dealer")
    }

    async fn dealer_for_user(&self, user_id: Uuid) -> CoreResult<Option<Dealer>> {
        let inner = self.inner.read().await;
        Ok(inner.dealers.values().find(|d| d.user_id == user_id && d.is_active).cloned())
    }

    async fn create_agent(&self, agent: &Agent) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.agents.values().any(|a| a.user_id == agent.user_id) {
            return Err(CoreError::Conflict("User is already an agent".into()));
        }
        inner.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get_agent(&self, id: Uuid) -> CoreResult<Option<Agent>> {
        Ok(self.inner.read().await.agents.get(&id).cloned())
    }

    async fn update_agent(&self, agent: &Agent) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.agents, agent.id, agent, "agent")
    }

    async fn agent_for_user(&self, user_id: Uuid) -> CoreResult<Option<Agent>> {
        let inner = self.inner.read().await;
        Ok(inner.agents.values().find(|a| a.user_id == user_id && a.is_active).cloned())
    }

    async fn list_agents(&self, dealer_id: Uuid) -> CoreResult<Vec<Agent>> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner
            .agents
            .values()
            .filter(|a| a.dealer_id == Some(dealer_id))
            .cloned()
            .collect();
        newest_first(&mut agents, |a| a.created_at);
        Ok(agents)
    }

    async fn create_vehicle(&self, vehicle: &TravelVehicle, seats: &[Seat]) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.travel_vehicles.insert(vehicle.id, vehicle.clone());
        for seat in seats {
            inner.seats.insert(seat.id, seat.clone());
        }
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TravelVehicle>> {
        Ok(self.inner.read().await.travel_vehicles.get(&id).cloned())
    }

    async fn update_vehicle(&self, vehicle: &TravelVehicle) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.travel_vehicles, vehicle.id, vehicle, "vehicle")
    }

    async fn list_vehicles(&self, scope: &VehicleScope) -> CoreResult<Vec<TravelVehicle>> {
        let inner = self.inner.read().await;
        let mut vehicles: Vec<TravelVehicle> = inner
            .travel_vehicles
            .values()
            .filter(|v| match scope {
                VehicleScope::Committee(id) => v.committee_id == *id,
                VehicleScope::Committees(ids) => v.is_active && ids.contains(&v.committee_id),
                VehicleScope::AllActive => v.is_active,
            })
            .cloned()
            .collect();
        newest_first(&mut vehicles, |v| v.created_at);
        Ok(vehicles)
    }

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>> {
        let inner = self.inner.read().await;
        let mut seats: Vec<Seat> = inner.seats.values().filter(|s| s.vehicle_id == vehicle_id).cloned().collect();
        seats.sort_by_key(|s| (s.floor, s.side, s.number));
        Ok(seats)
    }

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>> {
        Ok(self.inner.read().await.seats.get(&id).cloned())
    }

    async fn held_seats(&self, vehicle_id: Uuid, date: NaiveDate) -> CoreResult<HashSet<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .travel_bookings
            .values()
            .filter(|b| {
                b.vehicle_id == vehicle_id
                    && matches!(b.status, BookingStatus::Pending | BookingStatus::Booked)
                    && b.booking_date.date_naive() == date
            })
            .map(|b| b.seat_id)
            .collect())
    }

    async fn commit_bookings(&self, bookings: &[TravelBooking]) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let mut claimed = HashSet::new();
        for booking in bookings {
            let free = inner
                .seats
                .get(&booking.seat_id)
                .is_some_and(|s| s.vehicle_id == booking.vehicle_id && s.status == SeatStatus::Available);
            if !free || !claimed.insert(booking.seat_id) {
                return Err(CoreError::Conflict("One or more selected seats are no longer available".into()));
            }
        }
        for booking in bookings {
            if let Some(seat) = inner.seats.get_mut(&booking.seat_id) {
                seat.status = SeatStatus::Booked;
            }
            inner.travel_bookings.insert(booking.id, booking.clone());
        }
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TravelBooking>> {
        Ok(self.inner.read().await.travel_bookings.get(&id).cloned())
    }

    async fn find_ticket(&self, committee_id: Uuid, ticket_number: &str) -> CoreResult<Option<TravelBooking>> {
        let inner = self.inner.read().await;
        let vehicles = inner.committee_vehicles(committee_id);
        Ok(inner
            .travel_bookings
            .values()
            .find(|b| b.ticket_number == ticket_number && vehicles.contains(&b.vehicle_id))
            .cloned())
    }

    async fn list_bookings(&self, scope: BookingScope, status: Option<BookingStatus>) -> CoreResult<Vec<TravelBooking>> {
        let inner = self.inner.read().await;
        let committee_vehicles = match scope {
            BookingScope::Committee(id) => inner.committee_vehicles(id),
            _ => HashSet::new(),
        };
        let dealer_agents: HashSet<Uuid> = match scope {
            BookingScope::Dealer(id) => inner
                .agents
                .values()
                .filter(|a| a.dealer_id == Some(id))
                .map(|a| a.id)
                .collect(),
            _ => HashSet::new(),
        };

        let mut bookings: Vec<TravelBooking> = inner
            .travel_bookings
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .filter(|b| match scope {
                BookingScope::Committee(_) => committee_vehicles.contains(&b.vehicle_id),
                BookingScope::Dealer(_) => b.agent_id.is_some_and(|a| dealer_agents.contains(&a)),
                BookingScope::Agent(id) => b.agent_id == Some(id),
                BookingScope::Customer(id) => b.customer_id == Some(id),
            })
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn boarding_queue(&self, committee_id: Uuid) -> CoreResult<Vec<TravelBooking>> {
        let inner = self.inner.read().await;
        let vehicles = inner.committee_vehicles(committee_id);
        let mut queue: Vec<TravelBooking> = inner
            .travel_bookings
            .values()
            .filter(|b| b.status == BookingStatus::Booked && vehicles.contains(&b.vehicle_id))
            .cloned()
            .collect();
        queue.sort_by_key(|b| b.booking_date);
        Ok(queue)
    }

    async fn board_passenger(
        &self,
        booking_id: Uuid,
        boarded_at: DateTime<Utc>,
        credits: &[Credit],
    ) -> CoreResult<BoardingOutcome> {
        let mut inner = self.inner.write().await;
        let mut booking = inner
            .travel_bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;
        if booking.status != BookingStatus::Booked {
            return Err(CoreError::Conflict(format!("Booking status is {}, expected booked", booking.status)));
        }

        let reference = Some(Reference::travel_booking(booking_id));
        let already_paid = inner
            .transactions
            .iter()
            .any(|t| t.reference == reference && t.status == TransactionStatus::Completed);
        let transactions = if already_paid {
            Vec::new()
        } else {
            inner.apply_credits(credits, boarded_at)?
        };

        booking.status = BookingStatus::Boarded;
        booking.boarding_date = Some(boarded_at);
        if let Some(seat) = inner.seats.get_mut(&booking.seat_id) {
            seat.status = SeatStatus::Boarded;
        }
        inner.travel_bookings.insert(booking_id, booking.clone());
        Ok(BoardingOutcome { booking, transactions })
    }

    async fn reset_booked_seats(&self, vehicle_id: Uuid) -> CoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for seat in inner.seats.values_mut() {
            if seat.vehicle_id == vehicle_id && seat.status == SeatStatus::Booked {
                seat.status = SeatStatus::Available;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TaxiRepository for MemoryStore {
    async fn create_driver(&self, driver: &Driver) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.drivers.values().any(|d| d.user_id == driver.user_id) {
            return Err(CoreError::Conflict("User already has a driver profile".into()));
        }
        inner.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn driver_for_user(&self, user_id: Uuid) -> CoreResult<Option<Driver>> {
        let inner = self.inner.read().await;
        Ok(inner.drivers.values().find(|d| d.user_id == user_id && d.is_active).cloned())
    }

    async fn list_drivers(&self) -> CoreResult<Vec<Driver>> {
        let mut drivers: Vec<Driver> = self.inner.read().await.drivers.values().cloned().collect();
        newest_first(&mut drivers, |d| d.created_at);
        Ok(drivers)
    }

    async fn create_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()> {
        self.inner.write().await.taxi_vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &TaxiVehicle) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.taxi_vehicles.get_mut(&vehicle.id) {
            Some(stored) => {
                *stored = vehicle.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("vehicle", vehicle.id)),
        }
    }

    async fn delete_vehicle(&self, id: Uuid) -> CoreResult<()> {
        self.inner
            .write()
            .await
            .taxi_vehicles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("vehicle", id))
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TaxiVehicle>> {
        Ok(self.inner.read().await.taxi_vehicles.get(&id).cloned())
    }

    async fn driver_vehicles(&self, driver_id: Uuid) -> CoreResult<Vec<TaxiVehicle>> {
        let inner = self.inner.read().await;
        let mut vehicles: Vec<TaxiVehicle> =
            inner.taxi_vehicles.values().filter(|v| v.driver_id == driver_id).cloned().collect();
        vehicles.sort_by_key(|v| v.created_at);
        Ok(vehicles)
    }

    async fn count_active_vehicles(&self) -> CoreResult<usize> {
        Ok(self.inner.read().await.active_taxi_vehicles())
    }

    async fn create_trip(&self, trip: &Trip) -> CoreResult<()> {
        self.inner.write().await.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn get_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        Ok(self.inner.read().await.trips.get(&id).cloned())
    }

    async fn list_trips(&self) -> CoreResult<Vec<Trip>> {
        Ok(self.inner.read().await.trips.values().cloned().collect())
    }

    async fn create_seater(&self, seater: &Seater) -> CoreResult<()> {
        self.inner.write().await.seaters.insert(seater.id, seater.clone());
        Ok(())
    }

    async fn get_seater(&self, id: Uuid) -> CoreResult<Option<Seater>> {
        Ok(self.inner.read().await.seaters.get(&id).cloned())
    }

    async fn list_seaters(&self, trip_id: Option<Uuid>) -> CoreResult<Vec<Seater>> {
        let inner = self.inner.read().await;
        let mut seaters: Vec<Seater> = inner
            .seaters
            .values()
            .filter(|s| trip_id.map_or(true, |t| s.trip_id == t))
            .cloned()
            .collect();
        seaters.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(seaters)
    }

    async fn count_bookings_on(&self, date: NaiveDate) -> CoreResult<usize> {
        Ok(self.inner.read().await.taxi_bookings_on(date))
    }

    async fn create_booking_within_capacity(&self, booking: &TaxiBooking) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let active = inner.active_taxi_vehicles();
        if active == 0 {
            return Err(TaxiError::NoVehicles.into());
        }
        if inner.taxi_bookings_on(booking.date) >= active {
            return Err(TaxiError::FullyBooked(booking.date).into());
        }
        inner.taxi_bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TaxiBooking>> {
        Ok(self.inner.read().await.taxi_bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<TaxiBooking> =
            inner.taxi_bookings.values().filter(|b| filter.matches(b)).cloned().collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn vehicle_bookings(&self, vehicle_ids: &[Uuid], filter: &BookingFilter) -> CoreResult<Vec<TaxiBooking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<TaxiBooking> = inner
            .taxi_bookings
            .values()
            .filter(|b| b.vehicle_id.is_some_and(|v| vehicle_ids.contains(&v)) && filter.matches(b))
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn assign_vehicle(&self, booking_id: Uuid, vehicle_id: Uuid) -> CoreResult<TaxiBooking> {
        let mut inner = self.inner.write().await;
        let mut booking = inner
            .taxi_bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("taxi booking", booking_id))?;
        if booking.vehicle_id.is_some() || booking.trip_status != TripStatus::Pending {
            return Err(TaxiError::AlreadyAssigned.into());
        }
        let clash = inner.taxi_bookings.values().any(|b| {
            b.id != booking_id
                && b.vehicle_id == Some(vehicle_id)
                && b.date == booking.date
                && b.time == booking.time
                && b.trip_status != TripStatus::Cancelled
        });
        if clash {
            return Err(TaxiError::SlotTaken.into());
        }

        booking.vehicle_id = Some(vehicle_id);
        booking.trip_status = TripStatus::Confirmed;
        inner.taxi_bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn update_trip_status(&self, booking_id: Uuid, from: TripStatus, to: TripStatus) -> CoreResult<TaxiBooking> {
        let mut inner = self.inner.write().await;
        let booking = inner
            .taxi_bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CoreError::not_found("taxi booking", booking_id))?;
        if booking.trip_status != from {
            return Err(CoreError::Conflict(format!(
                "Booking status changed to {} in the meantime",
                booking.trip_status
            )));
        }
        booking.trip_status = to;
        Ok(booking.clone())
    }

    async fn set_payment_status(&self, booking_id: Uuid, status: PaymentStatus) -> CoreResult<TaxiBooking> {
        let mut inner = self.inner.write().await;
        let booking = inner
            .taxi_bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CoreError::not_found("taxi booking", booking_id))?;
        booking.payment_status = status;
        Ok(booking.clone())
    }
}

#[async_trait]
impl CommerceRepository for MemoryStore {
    async fn create_store(&self, store: &Store) -> CoreResult<()> {
        self.inner.write().await.stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn update_store(&self, store: &Store) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.stores.get_mut(&store.id) {
            Some(stored) => {
                *stored = store.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("store", store.id)),
        }
    }

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<Store>> {
        Ok(self.inner.read().await.stores.get(&id).cloned())
    }

    async fn list_stores(&self, owner_id: Option<Uuid>) -> CoreResult<Vec<Store>> {
        let inner = self.inner.read().await;
        let mut stores: Vec<Store> = inner
            .stores
            .values()
            .filter(|s| owner_id.map_or(true, |o| s.owner_id == o))
            .cloned()
            .collect();
        newest_first(&mut stores, |s| s.created_at);
        Ok(stores)
    }

    async fn create_category(&self, category: &Category) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.categories.values().any(|c| c.name.eq_ignore_ascii_case(&category.name)) {
            return Err(CoreError::Conflict(format!("Category {} already exists", category.name)));
        }
        inner.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.inner.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_product(&self, product: &Product) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.products.values().any(|p| p.sku == product.sku) {
            return Err(CoreError::Conflict(format!("SKU {} already exists", product.sku)));
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.products.get_mut(&product.id) {
            Some(stored) => {
                *stored = product.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("product", product.id)),
        }
    }

    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> CoreResult<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner.products.values().filter(|p| filter.matches(p)).cloned().collect();
        newest_first(&mut products, |p| p.created_at);
        Ok(products)
    }

    async fn list_cart(&self, user_id: Uuid) -> CoreResult<Vec<CartItem>> {
        let inner = self.inner.read().await;
        let mut items: Vec<CartItem> = inner.cart.values().filter(|i| i.user_id == user_id).cloned().collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn save_cart_item(&self, item: &CartItem) -> CoreResult<()> {
        self.inner.write().await.cart.insert(item.id, item.clone());
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.cart.get(&item_id) {
            Some(item) if item.user_id == user_id => {
                inner.cart.remove(&item_id);
                Ok(())
            }
            _ => Err(CoreError::not_found("cart item", item_id)),
        }
    }

    async fn create_coupon(&self, coupon: &Coupon) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.coupons.values().any(|c| c.code == coupon.code) {
            return Err(CoreError::Conflict(format!("Coupon {} already exists", coupon.code)));
        }
        inner.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> CoreResult<Option<Coupon>> {
        let inner = self.inner.read().await;
        Ok(inner.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn list_coupons(&self) -> CoreResult<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self.inner.read().await.coupons.values().cloned().collect();
        newest_first(&mut coupons, |c| c.valid_from);
        Ok(coupons)
    }

    async fn place_orders(&self, user_id: Uuid, orders: &[PlacedOrder]) -> CoreResult<()> {
        let mut inner = self.inner.write().await;

        let mut wanted: HashMap<Uuid, i32> = HashMap::new();
        for item in orders.iter().flat_map(|o| &o.items) {
            *wanted.entry(item.product_id).or_default() += item.quantity;
        }
        for (product_id, quantity) in &wanted {
            let product = inner
                .products
                .get(product_id)
                .ok_or_else(|| CoreError::not_found("product", product_id))?;
            if !product.is_active || product.stock_quantity < *quantity {
                return Err(CoreError::Conflict(format!("{} is out of stock", product.name)));
            }
        }

        let coupon_id = orders.iter().find_map(|o| o.order.coupon_id);
        if let Some(id) = coupon_id {
            let coupon = inner.coupons.get(&id).ok_or_else(|| CoreError::not_found("coupon", id))?;
            if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
                return Err(CoreError::Conflict(format!("Coupon {} has reached its usage limit", coupon.code)));
            }
        }

        for (product_id, quantity) in wanted {
            if let Some(product) = inner.products.get_mut(&product_id) {
                product.stock_quantity -= quantity;
            }
        }
        if let Some(coupon) = coupon_id.and_then(|id| inner.coupons.get_mut(&id)) {
            coupon.used_count += 1;
        }
        for placed in orders {
            inner.orders.insert(placed.order.id, placed.order.clone());
            inner.order_items.extend(placed.items.iter().cloned());
        }
        inner.cart.retain(|_, item| item.user_id != user_id);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        let inner = self.inner.read().await;
        Ok(inner.order_items.iter().filter(|i| i.order_id == order_id).cloned().collect())
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| CoreError::not_found("order", order.id))?;
        if stored.status != expected {
            return Err(CoreError::Conflict(format!("Order status changed to {} in the meantime", stored.status)));
        }
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn settle_order(&self, order_id: Uuid, credits: &[Credit]) -> CoreResult<Option<Vec<WalletTransaction>>> {
        let mut inner = self.inner.write().await;
        let processed = inner
            .orders
            .get(&order_id)
            .map(|o| o.commission_processed)
            .ok_or_else(|| CoreError::not_found("order", order_id))?;
        if processed {
            return Ok(None);
        }
        let transactions = inner.apply_credits(credits, Utc::now())?;
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.commission_processed = true;
        }
        Ok(Some(transactions))
    }

    async fn has_delivered_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.order_items.iter().any(|item| {
            item.product_id == product_id
                && inner
                    .orders
                    .get(&item.order_id)
                    .is_some_and(|o| o.user_id == user_id && o.status == OrderStatus::Delivered)
        }))
    }

    async fn create_review(&self, review: &Review) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.product_id == review.product_id)
        {
            return Err(CoreError::Conflict("Review already exists".into()));
        }
        inner.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.reviews, review.id, review, "review")
    }

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>> {
        Ok(self.inner.read().await.reviews.get(&id).cloned())
    }

    async fn list_reviews(&self, product_id: Uuid) -> CoreResult<Vec<Review>> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<Review> = inner.reviews.values().filter(|r| r.product_id == product_id).cloned().collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn delete_review(&self, id: Uuid) -> CoreResult<()> {
        self.inner
            .write()
            .await
            .reviews
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("review", id))
    }

    async fn list_wishlist(&self, user_id: Uuid) -> CoreResult<Vec<WishlistItem>> {
        let inner = self.inner.read().await;
        let mut items: Vec<WishlistItem> = inner.wishlist.iter().filter(|w| w.user_id == user_id).cloned().collect();
        newest_first(&mut items, |w| w.created_at);
        Ok(items)
    }

    async fn add_wishlist_item(&self, item: &WishlistItem) -> CoreResult<(WishlistItem, bool)> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .wishlist
            .iter()
            .find(|w| w.user_id == item.user_id && w.product_id == item.product_id)
        {
            return Ok((existing.clone(), false));
        }
        inner.wishlist.push(item.clone());
        Ok((item.clone(), true))
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.wishlist.len();
        inner.wishlist.retain(|w| !(w.user_id == user_id && w.product_id == product_id));
        if inner.wishlist.len() == before {
            return Err(CoreError::not_found("wishlist item for product", product_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::TransactionType;
    use rust_decimal_macros::dec;

    fn user(phone: &str) -> User {
        User {
            id: Uuid::new_v4(),
            phone: phone.into(),
            name: "Test".into(),
            email: None,
            country_code: "+91".into(),
            country: "India".into(),
            is_merchant: true,
            is_driver: false,
            is_admin: false,
            balance: dec!(100),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_phone_conflicts() {
        let store = MemoryStore::new();
        store.create_user(&user("9800000001")).await.unwrap();
        let err = store.create_user(&user("9800000001")).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_user_keeps_balance() {
        let store = MemoryStore::new();
        let mut u = user("9800000002");
        store.create_user(&u).await.unwrap();
        u.balance = dec!(999);
        u.name = "Renamed".into();
        store.update_user(&u).await.unwrap();

        let stored = store.get_user(u.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_credits_are_all_or_nothing() {
        let store = MemoryStore::new();
        let u = user("9800000003");
        store.create_user(&u).await.unwrap();

        let credit = |account| Credit {
            account,
            amount: dec!(10),
            transaction_type: TransactionType::Payout,
            description: "x".into(),
            reference: None,
        };
        let mut inner = store.inner.write().await;
        let result = inner.apply_credits(&[credit(Account::User(u.id)), credit(Account::User(Uuid::new_v4()))], Utc::now());
        assert!(result.is_err());
        assert_eq!(inner.balance(Account::User(u.id)).unwrap(), dec!(100));

        let written = inner.apply_credits(&[credit(Account::User(u.id)), credit(Account::System)], Utc::now()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].wallet_before, Some(dec!(100.00)));
        assert_eq!(written[0].wallet_after, Some(dec!(110.00)));
        assert_eq!(inner.balance(Account::System).unwrap(), dec!(10.00));
    }

    // Travel flows through the service over the in-memory backend

    use std::sync::Arc;

    use bazaar_taxi::TaxiService;
    use bazaar_travel::booking::NewBooking;
    use bazaar_travel::models::{CommissionKind, CommissionRule, Floor, Gender, Passenger, SeatSide};
    use bazaar_travel::seats::SeatRow;
    use bazaar_travel::service::{AgentPatch, NewAgent, NewVehicle, StaffInput};
    use bazaar_travel::{PrimaryRole, TravelService};
    use chrono::NaiveTime;

    struct TravelWorld {
        store: Arc<MemoryStore>,
        service: TravelService,
        owner: User,
        staff: User,
        agent: User,
        agent_id: Uuid,
        vehicle: TravelVehicle,
        seats: Vec<Seat>,
    }

    /// A committee with one boarding clerk, one agent on a flat 10 rule and a
    /// three-seat vehicle priced with no margin.
    async fn travel_world() -> TravelWorld {
        let store = Arc::new(MemoryStore::new());
        let service = TravelService::new(store.clone(), store.clone(), store.clone());
        let owner = user("9800000101");
        let staff = user("9800000102");
        let agent = user("9800000103");
        for u in [&owner, &staff, &agent] {
            store.create_user(u).await.unwrap();
        }
        let from = Place { id: Uuid::new_v4(), name: "Kathmandu".into() };
        let to = Place { id: Uuid::new_v4(), name: "Pokhara".into() };
        store.create_place(&from).await.unwrap();
        store.create_place(&to).await.unwrap();

        let committee = service.create_committee(owner.id, "Sajha Yatayat").await.unwrap();
        let owner_roles = service.roles(owner.id).await.unwrap();
        service
            .add_staff(
                &owner_roles,
                StaffInput {
                    user_id: staff.id,
                    booking_permission: true,
                    boarding_permission: true,
                    finance_permission: false,
                },
            )
            .await
            .unwrap();
        let (vehicle, seats) = service
            .create_vehicle(NewVehicle {
                committee_id: committee.id,
                name: "Deluxe".into(),
                vehicle_no: "BA 2 KHA 4410".into(),
                from_place: from.id,
                to_place: to.id,
                departure_time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
                seat_price: dec!(1000),
                actual_seat_price: dec!(1000),
                seats: vec![SeatRow { floor: Floor::Lower, side: SeatSide::A, count: 3 }],
            })
            .await
            .unwrap();
        let agent_row = service
            .create_agent(NewAgent {
                user_id: agent.id,
                dealer_id: None,
                rule: CommissionRule { kind: CommissionKind::Flat, value: dec!(10) },
                committee_ids: vec![committee.id],
            })
            .await
            .unwrap();

        TravelWorld { store, service, owner, staff, agent, agent_id: agent_row.id, vehicle, seats }
    }

    fn booking_request(vehicle_id: Uuid, seat_ids: Vec<Uuid>) -> NewBooking {
        NewBooking {
            vehicle_id,
            seat_ids,
            booking_date: Utc::now(),
            passenger: Passenger {
                name: "Gita".into(),
                phone: "9800000199".into(),
                gender: Gender::Female,
                nationality: None,
            },
            customer_id: None,
            remarks: None,
            boarding_place: None,
        }
    }

    #[tokio::test]
    async fn test_zero_margin_agent_booking_debits_system_on_boarding() {
        let w = travel_world().await;
        let agent_roles = w.service.roles(w.agent.id).await.unwrap();
        let booked = w
            .service
            .create_bookings(&agent_roles, booking_request(w.vehicle.id, vec![w.seats[0].id]))
            .await
            .unwrap();
        assert_eq!(booked[0].commissions.agent, dec!(10.00));
        assert_eq!(booked[0].commissions.platform_net(), dec!(-10.00));

        let staff_roles = w.service.roles(w.staff.id).await.unwrap();
        let outcome = w.service.confirm_boarding(&staff_roles, booked[0].id).await.unwrap();
        assert_eq!(outcome.transactions.len(), 3);

        assert_eq!(w.store.balance(Account::User(w.owner.id)).await.unwrap(), dec!(1100.00));
        assert_eq!(w.store.balance(Account::User(w.agent.id)).await.unwrap(), dec!(110.00));
        assert_eq!(w.store.balance(Account::System).await.unwrap(), dec!(-10.00));
        let system_line = outcome.transactions.iter().find(|t| t.account == Account::System).unwrap();
        assert_eq!(system_line.transaction_type, TransactionType::CommissionDeduction);
    }

    #[tokio::test]
    async fn test_seat_reset_keeps_boarded_seats() {
        let w = travel_world().await;
        let agent_roles = w.service.roles(w.agent.id).await.unwrap();
        let booked = w
            .service
            .create_bookings(&agent_roles, booking_request(w.vehicle.id, vec![w.seats[0].id, w.seats[1].id]))
            .await
            .unwrap();
        let staff_roles = w.service.roles(w.staff.id).await.unwrap();
        w.service.confirm_boarding(&staff_roles, booked[0].id).await.unwrap();

        let denied = w.service.reset_seats(&agent_roles, w.vehicle.id, None).await.unwrap_err();
        assert!(matches!(denied, CoreError::Forbidden(_)));

        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        let past = w.service.reset_seats(&staff_roles, w.vehicle.id, Some(yesterday)).await.unwrap_err();
        assert!(matches!(past, CoreError::ValidationError(_)));

        let owner_roles = w.service.roles(w.owner.id).await.unwrap();
        let count = w.service.reset_seats(&owner_roles, w.vehicle.id, None).await.unwrap();
        assert_eq!(count, 1);

        let boarded = w.store.get_seat(w.seats[0].id).await.unwrap().unwrap();
        let released = w.store.get_seat(w.seats[1].id).await.unwrap().unwrap();
        assert_eq!(boarded.status, SeatStatus::Boarded);
        assert_eq!(released.status, SeatStatus::Available);
        assert_eq!(w.service.reset_seats(&staff_roles, w.vehicle.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_boarding_pays_out_once() {
        let w = travel_world().await;
        let agent_roles = w.service.roles(w.agent.id).await.unwrap();
        let booked = w
            .service
            .create_bookings(&agent_roles, booking_request(w.vehicle.id, vec![w.seats[2].id]))
            .await
            .unwrap();
        let staff_roles = w.service.roles(w.staff.id).await.unwrap();
        let first = w.service.confirm_boarding(&staff_roles, booked[0].id).await.unwrap();
        assert!(!first.transactions.is_empty());

        // the booking is put back to booked after its payout went through
        {
            let mut inner = w.store.inner.write().await;
            if let Some(b) = inner.travel_bookings.get_mut(&booked[0].id) {
                b.status = BookingStatus::Booked;
            }
        }
        let second = w.service.confirm_boarding(&staff_roles, booked[0].id).await.unwrap();
        assert!(second.transactions.is_empty());
        assert_eq!(second.booking.status, BookingStatus::Boarded);
        assert_eq!(w.store.balance(Account::User(w.owner.id)).await.unwrap(), dec!(1100.00));

        let filter = TransactionFilter {
            reference: Some(Reference::travel_booking(booked[0].id)),
            ..Default::default()
        };
        assert_eq!(w.store.list_transactions(&filter).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_commit_bookings_rejects_taken_seat() {
        let w = travel_world().await;
        let agent_roles = w.service.roles(w.agent.id).await.unwrap();
        let booked = w
            .service
            .create_bookings(&agent_roles, booking_request(w.vehicle.id, vec![w.seats[0].id]))
            .await
            .unwrap();

        // a request planned before the first one committed
        let mut late = booked[0].clone();
        late.id = Uuid::new_v4();
        let mut free = booked[0].clone();
        free.id = Uuid::new_v4();
        free.seat_id = w.seats[1].id;

        let err = w.store.commit_bookings(&[free.clone(), late]).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(TravelRepository::get_booking(w.store.as_ref(), free.id).await.unwrap().is_none());
        let untouched = w.store.get_seat(w.seats[1].id).await.unwrap().unwrap();
        assert_eq!(untouched.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_deactivated_agent_resolves_as_customer() {
        let w = travel_world().await;
        let patch = AgentPatch { is_active: Some(false), ..Default::default() };
        let agent = w.service.update_agent(w.agent_id, patch).await.unwrap();
        assert!(!agent.is_active);

        let roles = w.service.roles(w.agent.id).await.unwrap();
        assert!(roles.agent.is_none());
        assert!(matches!(roles.primary(), PrimaryRole::Customer));
        let err = w
            .service
            .create_bookings(&roles, booking_request(w.vehicle.id, vec![w.seats[0].id]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_places_are_rejected() {
        let w = travel_world().await;
        let bogus = Uuid::new_v4();

        let err = w
            .service
            .create_vehicle(NewVehicle {
                committee_id: w.vehicle.committee_id,
                name: "Ghost".into(),
                vehicle_no: "BA 1 JA 1".into(),
                from_place: w.vehicle.from_place,
                to_place: bogus,
                departure_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                seat_price: dec!(900),
                actual_seat_price: dec!(800),
                seats: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let agent_roles = w.service.roles(w.agent.id).await.unwrap();
        let mut request = booking_request(w.vehicle.id, vec![w.seats[0].id]);
        request.boarding_place = Some(bogus);
        let err = w.service.create_bookings(&agent_roles, request).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let taxi = TaxiService::new(w.store.clone(), w.store.clone());
        let err = taxi.create_trip(w.vehicle.from_place, bogus).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert!(taxi.create_trip(w.vehicle.from_place, w.vehicle.to_place).await.is_ok());
    }

    // Withdrawals

    use bazaar_core::withdrawal::{PaymentMethodType, WithdrawalRequest};
    use bazaar_core::WithdrawalDesk;

    async fn merchant_with_bank(store: &Arc<MemoryStore>) -> User {
        let merchant = user("9800000201");
        store.create_user(&merchant).await.unwrap();
        let setting = PaymentSetting {
            id: Uuid::new_v4(),
            user_id: merchant.id,
            method: PaymentMethodType::BankAccount,
            details: serde_json::json!({
                "account_holder_name": "Test",
                "bank_name": "Nabil",
                "account_number": "0012345678",
                "ifsc": "NABIL0001"
            }),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
        };
        store.create_payment_setting(&setting).await.unwrap();
        store.set_payment_setting_status(setting.id, ApprovalStatus::Approved).await.unwrap();
        merchant
    }

    #[tokio::test]
    async fn test_withdrawal_reject_then_approve() {
        let store = Arc::new(MemoryStore::new());
        let desk = WithdrawalDesk::new(store.clone(), store.clone());
        let merchant = merchant_with_bank(&store).await;
        let ask = |amount| WithdrawalRequest { amount, bank: None };

        let first = desk.request(merchant.id, ask(dec!(60))).await.unwrap();
        assert_eq!(first.status, WithdrawalStatus::Pending);
        assert_eq!(store.outstanding_withdrawals(merchant.id, None).await.unwrap(), dec!(60.00));
        let over = desk.request(merchant.id, ask(dec!(50))).await.unwrap_err();
        assert!(matches!(over, CoreError::ValidationError(_)));

        assert!(desk.reject(first.id, "  ").await.is_err());
        let rejected = desk.reject(first.id, "Account name mismatch").await.unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(store.balance(Account::User(merchant.id)).await.unwrap(), dec!(100));

        let second = desk.request(merchant.id, ask(dec!(70))).await.unwrap();
        let approved = desk.approve(second.id).await.unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(store.balance(Account::User(merchant.id)).await.unwrap(), dec!(30.00));
        assert!(matches!(desk.approve(second.id).await.unwrap_err(), CoreError::Conflict(_)));

        let lines = store
            .list_transactions(&TransactionFilter { account: Some(Account::User(merchant.id)), ..Default::default() })
            .await
            .unwrap();
        let cancelled = lines.iter().find(|t| t.reference == Some(Reference::withdrawal(first.id))).unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        let processed = lines.iter().find(|t| t.reference == Some(Reference::withdrawal(second.id))).unwrap();
        assert_eq!(processed.transaction_type, TransactionType::WithdrawalProcessed);
        assert_eq!(processed.wallet_after, Some(dec!(30.00)));
    }

    // Addresses, notifications, reviews and wishlist

    use bazaar_commerce::{CommerceService, Product, ReviewInput};
    use bazaar_core::{AddressInput, NewNotification, NotificationType};

    fn address_input(title: &str, is_default: bool) -> AddressInput {
        AddressInput {
            title: title.into(),
            full_name: "Sita Sharma".into(),
            phone: "9800000001".into(),
            address: "Ward 4".into(),
            city: "Pokhara".into(),
            state: "Gandaki".into(),
            zip_code: "33700".into(),
            latitude: None,
            longitude: None,
            is_default,
        }
    }

    #[tokio::test]
    async fn test_one_default_address_per_user() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let home = Address::new(owner, address_input("Home", true)).unwrap();
        let office = Address::new(owner, address_input("Office", false)).unwrap();
        let elsewhere = Address::new(Uuid::new_v4(), address_input("Home", true)).unwrap();
        for a in [&home, &office, &elsewhere] {
            store.save_address(a).await.unwrap();
        }

        let mut office = office;
        office.apply(address_input("Office", true)).unwrap();
        store.save_address(&office).await.unwrap();

        let listed = store.list_addresses(owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, office.id);
        assert!(!listed[1].is_default);
        assert!(store.get_address(elsewhere.id).await.unwrap().unwrap().is_default);

        store.delete_address(home.id).await.unwrap();
        assert!(matches!(store.delete_address(home.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_notifications_mark_read() {
        let store = MemoryStore::new();
        let reader = Uuid::new_v4();
        let mut ids = Vec::new();
        for title in ["Order shipped", "Festival sale"] {
            let n = Notification::new(NewNotification {
                user_id: reader,
                title: title.into(),
                message: "Details inside".into(),
                notification_type: NotificationType::Order,
            })
            .unwrap();
            store.create_notification(&n).await.unwrap();
            ids.push(n.id);
        }

        assert_eq!(store.mark_notifications_read(reader, Some(ids[0])).await.unwrap(), 1);
        assert_eq!(store.list_notifications(reader, true).await.unwrap().len(), 1);
        assert_eq!(store.mark_notifications_read(reader, None).await.unwrap(), 1);
        assert!(store.list_notifications(reader, true).await.unwrap().is_empty());
        assert_eq!(store.list_notifications(reader, false).await.unwrap().len(), 2);
        assert_eq!(store.mark_notifications_read(Uuid::new_v4(), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reviews_and_wishlist() {
        let store = Arc::new(MemoryStore::new());
        let commerce = CommerceService::new(store.clone(), store.clone());
        let product = Product {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            name: "Dhaka Topi".into(),
            description: String::new(),
            price: dec!(15),
            compare_price: None,
            sku: "DT-1".into(),
            stock_quantity: 5,
            is_active: true,
            is_featured: false,
            created_at: Utc::now(),
        };
        store.create_product(&product).await.unwrap();
        let buyer = Uuid::new_v4();
        let input = |rating| ReviewInput { rating, title: String::new(), comment: "Fits well".into() };

        let review = commerce.create_review(buyer, product.id, input(4)).await.unwrap();
        assert!(!review.is_verified_purchase);
        let again = commerce.create_review(buyer, product.id, input(5)).await.unwrap_err();
        assert!(matches!(again, CoreError::Conflict(_)));
        let foreign = commerce.update_review(Uuid::new_v4(), review.id, input(1)).await.unwrap_err();
        assert!(matches!(foreign, CoreError::Forbidden(_)));
        let revised = commerce.update_review(buyer, review.id, input(5)).await.unwrap();
        assert_eq!(revised.rating, 5);
        assert_eq!(commerce.product_reviews(product.id).await.unwrap().len(), 1);

        let (_, created) = commerce.add_to_wishlist(buyer, product.id).await.unwrap();
        assert!(created);
        let (entry, created) = commerce.add_to_wishlist(buyer, product.id).await.unwrap();
        assert!(!created);
        assert_eq!(entry.product.id, product.id);
        assert_eq!(commerce.wishlist(buyer).await.unwrap().len(), 1);
        commerce.remove_from_wishlist(buyer, product.id).await.unwrap();
        assert!(commerce.wishlist(buyer).await.unwrap().is_empty());
    }
}

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use bazaar_commerce::service::{NewCoupon, StatusChange};
use bazaar_commerce::{Category, Coupon, Order, OrderFilter, OrderPaymentStatus, OrderStatus};
use bazaar_core::withdrawal::{ApprovalStatus, PaymentSetting};
use bazaar_core::{NewNotification, Notification, Place, PlatformSettings, SettingsUpdate, User, Withdrawal};
use bazaar_shared::models::events::DomainEvent;
use bazaar_taxi::{BookingFilter, Driver, PaymentStatus, Seater, TaxiBooking, Trip};
use bazaar_travel::service::{AgentPatch, CommitteePatch, DealerPatch, NewAgent, NewVehicle, VehiclePatch};
use bazaar_travel::{Agent, CommissionRule, Committee, Dealer, Seat, TravelVehicle};

use crate::commerce::{publish_settlement, StatusUpdate};
use crate::error::{ApiResult, AppError};
use crate::middleware::auth::require_admin;
use crate::state::AppState;
use crate::wallet::WithdrawalQuery;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/events", get(event_stream))
        .route("/v1/admin/settings", get(get_settings).put(update_settings))
        .route("/v1/admin/users/{id}/roles", put(update_user_roles))
        .route("/v1/admin/places", get(list_places).post(create_place))
        .route("/v1/admin/notifications", post(send_notification))
        .route("/v1/admin/withdrawals", get(list_withdrawals))
        .route("/v1/admin/withdrawals/{id}/processing", post(mark_processing))
        .route("/v1/admin/withdrawals/{id}/approve", post(approve_withdrawal))
        .route("/v1/admin/withdrawals/{id}/reject", post(reject_withdrawal))
        .route("/v1/admin/payment-settings", get(list_payment_settings))
        .route("/v1/admin/payment-settings/{id}/approve", post(approve_payment_setting))
        .route("/v1/admin/payment-settings/{id}/reject", post(reject_payment_setting))
        .route("/v1/admin/travel/committees", post(create_committee))
        .route("/v1/admin/travel/committees/{id}", put(update_committee).delete(deactivate_committee))
        .route("/v1/admin/travel/dealers", post(create_dealer))
        .route("/v1/admin/travel/dealers/{id}", put(update_dealer).delete(deactivate_dealer))
        .route("/v1/admin/travel/agents", post(create_agent))
        .route("/v1/admin/travel/agents/{id}", put(update_agent).delete(deactivate_agent))
        .route("/v1/admin/travel/vehicles", post(create_vehicle))
        .route("/v1/admin/travel/vehicles/{id}", put(update_vehicle).delete(deactivate_vehicle))
        .route("/v1/admin/taxi/drivers", post(register_driver))
        .route("/v1/admin/taxi/trips", post(create_trip))
        .route("/v1/admin/taxi/seaters", post(create_seater))
        .route("/v1/admin/taxi/bookings", get(taxi_bookings))
        .route("/v1/admin/taxi/bookings/{id}/payment", post(taxi_payment))
        .route("/v1/admin/shop/categories", post(create_category))
        .route("/v1/admin/shop/coupons", get(list_coupons).post(create_coupon))
        .route("/v1/admin/shop/orders", get(list_orders))
        .route("/v1/admin/shop/orders/{id}/status", post(order_status))
        .route("/v1/admin/shop/orders/{id}/payment", post(order_payment))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

/// Live feed of domain events as server-sent events. Lagged subscribers
/// skip what they missed.
async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| async move {
        let event = result.ok()?;
        Event::default().event(event.name()).json_data(&event).ok().map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// Platform

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<PlatformSettings>> {
    Ok(Json(state.accounts.get_settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<PlatformSettings>> {
    let mut settings = state.accounts.get_settings().await?;
    settings.apply(update)?;
    state.accounts.save_commission_rates(&settings).await?;
    tracing::info!(
        sales_commission = %settings.sales_commission,
        shipping_charge_commission = %settings.shipping_charge_commission,
        "Commission rates updated"
    );
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
struct RoleFlags {
    is_merchant: Option<bool>,
    is_driver: Option<bool>,
    is_admin: Option<bool>,
}

async fn update_user_roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(flags): Json<RoleFlags>,
) -> ApiResult<Json<User>> {
    let mut user = state
        .accounts
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;
    if let Some(v) = flags.is_merchant {
        user.is_merchant = v;
    }
    if let Some(v) = flags.is_driver {
        user.is_driver = v;
    }
    if let Some(v) = flags.is_admin {
        user.is_admin = v;
    }
    state.accounts.update_user(&user).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct NewPlace {
    name: String,
}

async fn list_places(State(state): State<AppState>) -> ApiResult<Json<Vec<Place>>> {
    Ok(Json(state.accounts.list_places().await?))
}

async fn create_place(State(state): State<AppState>, Json(req): Json<NewPlace>) -> ApiResult<Json<Place>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Place name is required".into()));
    }
    let place = Place { id: Uuid::new_v4(), name: name.to_string() };
    state.accounts.create_place(&place).await?;
    Ok(Json(place))
}

async fn send_notification(
    State(state): State<AppState>,
    Json(req): Json<NewNotification>,
) -> ApiResult<Json<Notification>> {
    state
        .accounts
        .get_user(req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", req.user_id)))?;
    let notification = Notification::new(req)?;
    state.accounts.create_notification(&notification).await?;
    Ok(Json(notification))
}

// Withdrawals and payout destinations

async fn list_withdrawals(
    State(state): State<AppState>,
    Query(q): Query<WithdrawalQuery>,
) -> ApiResult<Json<Vec<Withdrawal>>> {
    Ok(Json(state.withdrawals.list_all(q.status).await?))
}

async fn mark_processing(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Withdrawal>> {
    Ok(Json(state.withdrawals.mark_processing(id).await?))
}

async fn approve_withdrawal(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Withdrawal>> {
    let withdrawal = state.withdrawals.approve(id).await?;
    state.publish(DomainEvent::WithdrawalReviewed { withdrawal_id: id, approved: true });
    Ok(Json(withdrawal))
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    #[serde(default)]
    reason: String,
}

async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<Json<Withdrawal>> {
    let withdrawal = state.withdrawals.reject(id, &req.reason).await?;
    state.publish(DomainEvent::WithdrawalReviewed { withdrawal_id: id, approved: false });
    Ok(Json(withdrawal))
}

#[derive(Debug, Deserialize)]
struct SettingQuery {
    user_id: Option<Uuid>,
}

async fn list_payment_settings(
    State(state): State<AppState>,
    Query(q): Query<SettingQuery>,
) -> ApiResult<Json<Vec<PaymentSetting>>> {
    Ok(Json(state.accounts.list_payment_settings(q.user_id).await?))
}

async fn approve_payment_setting(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<PaymentSetting>> {
    Ok(Json(state.accounts.set_payment_setting_status(id, ApprovalStatus::Approved).await?))
}

async fn reject_payment_setting(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<PaymentSetting>> {
    Ok(Json(state.accounts.set_payment_setting_status(id, ApprovalStatus::Rejected).await?))
}

// Travel network

#[derive(Debug, Deserialize)]
struct NewCommittee {
    user_id: Uuid,
    name: String,
}

async fn create_committee(State(state): State<AppState>, Json(req): Json<NewCommittee>) -> ApiResult<Json<Committee>> {
    Ok(Json(state.travel.create_committee(req.user_id, &req.name).await?))
}

#[derive(Debug, Deserialize)]
struct NewDealer {
    user_id: Uuid,
    #[serde(flatten)]
    rule: CommissionRule,
}

async fn create_dealer(State(state): State<AppState>, Json(req): Json<NewDealer>) -> ApiResult<Json<Dealer>> {
    Ok(Json(state.travel.create_dealer(req.user_id, req.rule).await?))
}

async fn create_agent(State(state): State<AppState>, Json(req): Json<NewAgent>) -> ApiResult<Json<Agent>> {
    Ok(Json(state.travel.create_agent(req).await?))
}

#[derive(Debug, Serialize)]
struct CreatedVehicle {
    vehicle: TravelVehicle,
    seats: Vec<Seat>,
}

async fn create_vehicle(State(state): State<AppState>, Json(req): Json<NewVehicle>) -> ApiResult<Json<CreatedVehicle>> {
    let (vehicle, seats) = state.travel.create_vehicle(req).await?;
    Ok(Json(CreatedVehicle { vehicle, seats }))
}

// Deactivating keeps the record; the entity stops resolving as a role or
// appearing in active listings.

async fn update_committee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CommitteePatch>,
) -> ApiResult<Json<Committee>> {
    Ok(Json(state.travel.update_committee(id, patch).await?))
}

async fn deactivate_committee(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Committee>> {
    let patch = CommitteePatch { is_active: Some(false), ..Default::default() };
    Ok(Json(state.travel.update_committee(id, patch).await?))
}

async fn update_dealer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DealerPatch>,
) -> ApiResult<Json<Dealer>> {
    Ok(Json(state.travel.update_dealer(id, patch).await?))
}

async fn deactivate_dealer(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Dealer>> {
    let patch = DealerPatch { is_active: Some(false), ..Default::default() };
    Ok(Json(state.travel.update_dealer(id, patch).await?))
}

async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AgentPatch>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.travel.update_agent(id, patch).await?))
}

async fn deactivate_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Agent>> {
    let patch = AgentPatch { is_active: Some(false), ..Default::default() };
    Ok(Json(state.travel.update_agent(id, patch).await?))
}

async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<VehiclePatch>,
) -> ApiResult<Json<TravelVehicle>> {
    Ok(Json(state.travel.update_vehicle(id, patch).await?))
}

async fn deactivate_vehicle(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<TravelVehicle>> {
    let patch = VehiclePatch { is_active: Some(false), ..Default::default() };
    Ok(Json(state.travel.update_vehicle(id, patch).await?))
}

// Taxi network

#[derive(Debug, Deserialize)]
struct NewDriver {
    user_id: Uuid,
    license: String,
}

async fn register_driver(State(state): State<AppState>, Json(req): Json<NewDriver>) -> ApiResult<Json<Driver>> {
    Ok(Json(state.taxi.register_driver(req.user_id, &req.license).await?))
}

#[derive(Debug, Deserialize)]
struct NewTrip {
    from_place: Uuid,
    to_place: Uuid,
}

async fn create_trip(State(state): State<AppState>, Json(req): Json<NewTrip>) -> ApiResult<Json<Trip>> {
    Ok(Json(state.taxi.create_trip(req.from_place, req.to_place).await?))
}

#[derive(Debug, Deserialize)]
struct NewSeater {
    trip_id: Uuid,
    seat: String,
    price: Decimal,
}

async fn create_seater(State(state): State<AppState>, Json(req): Json<NewSeater>) -> ApiResult<Json<Seater>> {
    Ok(Json(state.taxi.create_seater(req.trip_id, &req.seat, req.price).await?))
}

async fn taxi_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<TaxiBooking>>> {
    Ok(Json(state.taxi.all_bookings(filter).await?))
}

#[derive(Debug, Deserialize)]
struct TaxiPayment {
    payment_status: PaymentStatus,
}

async fn taxi_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TaxiPayment>,
) -> ApiResult<Json<TaxiBooking>> {
    Ok(Json(state.taxi.set_payment_status(id, req.payment_status).await?))
}

// Shop

#[derive(Debug, Deserialize)]
struct NewCategory {
    name: String,
    parent_id: Option<Uuid>,
}

async fn create_category(State(state): State<AppState>, Json(req): Json<NewCategory>) -> ApiResult<Json<Category>> {
    Ok(Json(state.commerce.create_category(req.name, req.parent_id).await?))
}

async fn list_coupons(State(state): State<AppState>) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(state.commerce.list_coupons().await?))
}

async fn create_coupon(State(state): State<AppState>, Json(req): Json<NewCoupon>) -> ApiResult<Json<Coupon>> {
    Ok(Json(state.commerce.create_coupon(req).await?))
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    user_id: Option<Uuid>,
    store_id: Option<Uuid>,
    status: Option<OrderStatus>,
    payment_status: Option<OrderPaymentStatus>,
}

async fn list_orders(State(state): State<AppState>, Query(q): Query<OrderQuery>) -> ApiResult<Json<Vec<Order>>> {
    let filter = OrderFilter {
        user_id: q.user_id,
        store_ids: q.store_id.map(|id| vec![id]),
        status: q.status,
        payment_status: q.payment_status,
    };
    Ok(Json(state.commerce.all_orders(filter).await?))
}

async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> ApiResult<Json<StatusChange>> {
    let change = state.commerce.admin_set_status(id, req.status).await?;
    publish_settlement(&state, &change);
    Ok(Json(change))
}

#[derive(Debug, Deserialize)]
struct OrderPayment {
    payment_status: OrderPaymentStatus,
}

async fn order_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<OrderPayment>,
) -> ApiResult<Json<StatusChange>> {
    let change = state.commerce.set_payment_status(id, req.payment_status).await?;
    publish_settlement(&state, &change);
    Ok(Json(change))
}

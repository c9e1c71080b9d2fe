use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::{PeriodTotals, WalletTransaction};
use bazaar_shared::models::events::DomainEvent;
use bazaar_shared::sum_money;
use bazaar_travel::boarding::TicketScan;
use bazaar_travel::booking::NewBooking;
use bazaar_travel::dashboard::{AgentDashboard, CommitteeDashboard, DealerDashboard, StaffDashboard};
use bazaar_travel::seats::{SeatAvailability, SeatLayout};
use bazaar_travel::service::{StaffInput, StaffPatch, Ticket};
use bazaar_travel::{Agent, BookingStatus, PrimaryRole, Staff, TravelBooking, TravelRoles, TravelVehicle};

use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{require_user, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/travel/roles", get(roles))
        .route("/v1/travel/dashboard", get(dashboard))
        .route("/v1/travel/vehicles", get(list_vehicles))
        .route("/v1/travel/vehicles/{id}", get(vehicle_detail))
        .route("/v1/travel/vehicles/{id}/seats", get(seat_layout))
        .route("/v1/travel/vehicles/{id}/available-seats", get(available_seats))
        .route("/v1/travel/vehicles/{id}/reset-seats", post(reset_seats))
        .route("/v1/travel/bookings", get(list_bookings).post(create_bookings))
        .route("/v1/travel/bookings/{id}", get(booking_detail))
        .route("/v1/travel/bookings/{id}/ticket", get(ticket))
        .route("/v1/travel/boarding/queue", get(boarding_queue))
        .route("/v1/travel/boarding/scan", post(scan_ticket))
        .route("/v1/travel/boarding/{id}/confirm", post(confirm_boarding))
        .route("/v1/travel/staff", get(list_staff).post(add_staff))
        .route("/v1/travel/staff/{id}", get(get_staff).put(update_staff).delete(remove_staff))
        .route("/v1/travel/agents", get(list_agents))
        .route("/v1/travel/revenue", get(revenue_history))
        .route("/v1/travel/revenue/stats", get(revenue_stats))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

async fn caller_roles(state: &AppState, claims: &Claims) -> ApiResult<TravelRoles> {
    Ok(state.travel.roles(claims.sub).await?)
}

async fn roles(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<TravelRoles>> {
    Ok(Json(caller_roles(&state, &claims).await?))
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
enum Dashboard {
    Committee(CommitteeDashboard),
    Staff(StaffDashboard),
    Dealer(DealerDashboard),
    Agent(AgentDashboard),
}

/// The dashboard of the caller's highest-priority travel role.
async fn dashboard(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Dashboard>> {
    let roles = caller_roles(&state, &claims).await?;
    let dashboard = match roles.primary() {
        PrimaryRole::Committee(_) => Dashboard::Committee(state.travel.committee_dashboard(&roles).await?),
        PrimaryRole::Staff(_) => Dashboard::Staff(state.travel.staff_dashboard(&roles).await?),
        PrimaryRole::Dealer(_) => Dashboard::Dealer(state.travel.dealer_dashboard(&roles).await?),
        PrimaryRole::Agent(_) => Dashboard::Agent(state.travel.agent_dashboard(&roles).await?),
        PrimaryRole::Customer => return Err(AppError::Authorization("No travel dashboard for this account".into())),
    };
    Ok(Json(dashboard))
}

// Vehicles and seats

#[derive(Debug, Deserialize)]
struct VehicleQuery {
    committee_id: Option<Uuid>,
    is_active: Option<bool>,
}

async fn list_vehicles(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<VehicleQuery>,
) -> ApiResult<Json<Vec<TravelVehicle>>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.list_vehicles(&roles, q.committee_id, q.is_active).await?))
}

async fn vehicle_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TravelVehicle>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.vehicle_detail(&roles, id).await?))
}

async fn seat_layout(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<SeatLayout>> {
    Ok(Json(state.travel.seat_layout(id).await?))
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

async fn available_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<DateQuery>,
) -> ApiResult<Json<Vec<SeatAvailability>>> {
    Ok(Json(state.travel.available_seats(id, q.date).await?))
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    booking_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    vehicle_id: Uuid,
    reset: u64,
}

async fn reset_seats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResetRequest>>,
) -> ApiResult<Json<ResetResponse>> {
    let roles = caller_roles(&state, &claims).await?;
    let Json(req) = body.unwrap_or_default();
    let count = state.travel.reset_seats(&roles, id, req.booking_date).await?;
    state.publish(DomainEvent::SeatsReset { vehicle_id: id, count });
    Ok(Json(ResetResponse { vehicle_id: id, reset: count }))
}

// Bookings

async fn create_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewBooking>,
) -> ApiResult<Json<Vec<TravelBooking>>> {
    let roles = caller_roles(&state, &claims).await?;
    let vehicle_id = req.vehicle_id;
    let booking_date = req.booking_date;
    let bookings = state.travel.create_bookings(&roles, req).await?;

    state.publish(DomainEvent::TravelBooked {
        booking_ids: bookings.iter().map(|b| b.id).collect(),
        vehicle_id,
        booking_date,
        booked_by: claims.sub,
    });
    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
struct BookingQuery {
    status: Option<BookingStatus>,
    committee_id: Option<Uuid>,
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<BookingQuery>,
) -> ApiResult<Json<Vec<TravelBooking>>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.list_bookings(&roles, q.status, q.committee_id).await?))
}

async fn booking_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TravelBooking>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.booking_detail(&roles, id).await?))
}

async fn ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ticket>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.ticket(&roles, id).await?))
}

// Boarding

async fn boarding_queue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<TravelBooking>>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.boarding_queue(&roles).await?))
}

async fn scan_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(scan): Json<TicketScan>,
) -> ApiResult<Json<TravelBooking>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.scan_ticket(&roles, &scan).await?))
}

#[derive(Debug, Serialize)]
struct BoardingResponse {
    booking: TravelBooking,
    transactions: Vec<WalletTransaction>,
}

async fn confirm_boarding(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BoardingResponse>> {
    let roles = caller_roles(&state, &claims).await?;
    let outcome = state.travel.confirm_boarding(&roles, id).await?;
    let booking = outcome.booking;

    state.publish(DomainEvent::PassengerBoarded {
        booking_id: booking.id,
        ticket_number: booking.ticket_number.clone(),
        boarded_at: booking.boarding_date.unwrap_or_else(Utc::now),
    });
    if !outcome.transactions.is_empty() {
        let total: Decimal = sum_money(outcome.transactions.iter().map(|t| &t.amount));
        state.publish(DomainEvent::CommissionDistributed {
            booking_id: booking.id,
            postings: outcome.transactions.len(),
            total,
        });
    }
    Ok(Json(BoardingResponse { booking, transactions: outcome.transactions }))
}

// Staff and agents

async fn list_staff(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Vec<Staff>>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.list_staff(&roles).await?))
}

async fn add_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<StaffInput>,
) -> ApiResult<Json<Staff>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.add_staff(&roles, input).await?))
}

async fn get_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Staff>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.get_staff(&roles, id).await?))
}

async fn update_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<StaffPatch>,
) -> ApiResult<Json<Staff>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.update_staff(&roles, id, patch).await?))
}

async fn remove_staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let roles = caller_roles(&state, &claims).await?;
    state.travel.remove_staff(&roles, id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn list_agents(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Vec<Agent>>> {
    let roles = caller_roles(&state, &claims).await?;
    Ok(Json(state.travel.list_agents(&roles).await?))
}

// Revenue

#[derive(Debug, Deserialize)]
struct RevenueQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

async fn revenue_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<RevenueQuery>,
) -> ApiResult<Json<Vec<WalletTransaction>>> {
    Ok(Json(state.travel.revenue_history(claims.sub, q.from, q.to).await?))
}

async fn revenue_stats(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<PeriodTotals>> {
    Ok(Json(state.travel.revenue_stats(claims.sub).await?))
}

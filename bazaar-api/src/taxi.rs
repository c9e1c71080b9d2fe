use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bazaar_shared::models::events::DomainEvent;
use bazaar_taxi::dispatch::NewTaxiBooking;
use bazaar_taxi::earnings::DriverEarnings;
use bazaar_taxi::service::VehicleInput;
use bazaar_taxi::{BookingFilter, Seater, TaxiBooking, TaxiVehicle, Trip, TripStatus};

use crate::error::ApiResult;
use crate::middleware::auth::{require_user, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/taxi/trips", get(list_trips))
        .route("/v1/taxi/seaters", get(list_seaters))
        .route("/v1/taxi/bookings", get(my_bookings).post(book))
        .route("/v1/taxi/bookings/{id}", get(booking_detail))
        .route("/v1/taxi/bookings/{id}/cancel", post(cancel))
        .route("/v1/taxi/driver/bookings", get(driver_bookings))
        .route("/v1/taxi/driver/bookings/open", get(open_bookings))
        .route("/v1/taxi/driver/bookings/{id}/accept", post(accept))
        .route("/v1/taxi/driver/bookings/{id}/decline", post(decline))
        .route("/v1/taxi/driver/bookings/{id}/status", post(update_status))
        .route("/v1/taxi/driver/earnings", get(earnings))
        .route("/v1/taxi/driver/vehicles", get(my_vehicles).post(add_vehicle))
        .route("/v1/taxi/driver/vehicles/{id}", put(update_vehicle).delete(remove_vehicle))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

async fn list_trips(State(state): State<AppState>) -> ApiResult<Json<Vec<Trip>>> {
    Ok(Json(state.taxi.list_trips().await?))
}

#[derive(Debug, Deserialize)]
struct SeaterQuery {
    trip_id: Option<Uuid>,
}

async fn list_seaters(State(state): State<AppState>, Query(q): Query<SeaterQuery>) -> ApiResult<Json<Vec<Seater>>> {
    Ok(Json(state.taxi.list_seaters(q.trip_id).await?))
}

// Customer side

async fn book(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewTaxiBooking>,
) -> ApiResult<Json<TaxiBooking>> {
    let booking = state.taxi.book(claims.sub, req).await?;
    state.publish(DomainEvent::TaxiBooked {
        booking_id: booking.id,
        trip_id: booking.trip_id,
        date: booking.date,
    });
    Ok(Json(booking))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<TaxiBooking>>> {
    Ok(Json(state.taxi.my_bookings(claims.sub, filter).await?))
}

async fn booking_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaxiBooking>> {
    Ok(Json(state.taxi.customer_booking(claims.sub, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaxiBooking>> {
    Ok(Json(state.taxi.cancel(claims.sub, id).await?))
}

// Driver side

async fn driver_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<TaxiBooking>>> {
    Ok(Json(state.taxi.driver_bookings(claims.sub, filter).await?))
}

async fn open_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<TaxiBooking>>> {
    Ok(Json(state.taxi.open_bookings(claims.sub).await?))
}

#[derive(Debug, Default, Deserialize)]
struct AcceptRequest {
    vehicle_id: Option<Uuid>,
}

async fn accept(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<AcceptRequest>>,
) -> ApiResult<Json<TaxiBooking>> {
    let Json(req) = body.unwrap_or_default();
    Ok(Json(state.taxi.accept(claims.sub, id, req.vehicle_id).await?))
}

async fn decline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.taxi.decline(claims.sub, id).await?;
    Ok(Json(json!({ "declined": id })))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: TripStatus,
}

async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<TaxiBooking>> {
    Ok(Json(state.taxi.update_status(claims.sub, id, req.status).await?))
}

async fn earnings(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<DriverEarnings>> {
    Ok(Json(state.taxi.earnings(claims.sub).await?))
}

async fn my_vehicles(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<TaxiVehicle>>> {
    Ok(Json(state.taxi.my_vehicles(claims.sub).await?))
}

async fn add_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<VehicleInput>,
) -> ApiResult<Json<TaxiVehicle>> {
    Ok(Json(state.taxi.add_vehicle(claims.sub, input).await?))
}

async fn update_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(input): Json<VehicleInput>,
) -> ApiResult<Json<TaxiVehicle>> {
    Ok(Json(state.taxi.update_vehicle(claims.sub, id, input).await?))
}

async fn remove_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.taxi.remove_vehicle(claims.sub, id).await?;
    Ok(Json(json!({ "deleted": id })))
}

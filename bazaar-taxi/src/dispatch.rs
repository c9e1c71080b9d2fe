use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{PaymentStatus, Seater, TaxiBooking, TaxiVehicle, TripStatus};
use crate::{TaxiError, TaxiResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTaxiBooking {
    pub trip_id: Uuid,
    pub seater_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub remarks: Option<String>,
}

/// A date is full once its non-cancelled bookings reach the active fleet size.
pub fn check_capacity(date: NaiveDate, booked: usize, active_vehicles: usize) -> TaxiResult<()> {
    if active_vehicles == 0 {
        return Err(TaxiError::NoVehicles);
    }
    if booked >= active_vehicles {
        return Err(TaxiError::FullyBooked(date));
    }
    Ok(())
}

/// The price always comes from the seater, never from the caller.
pub fn new_booking(
    customer_id: Uuid,
    request: &NewTaxiBooking,
    seater: &Seater,
    now: DateTime<Utc>,
) -> TaxiResult<TaxiBooking> {
    if seater.trip_id != request.trip_id {
        return Err(TaxiError::SeaterTripMismatch);
    }
    Ok(TaxiBooking {
        id: Uuid::new_v4(),
        customer_id,
        trip_id: request.trip_id,
        seater_id: seater.id,
        price: seater.price,
        date: request.date,
        time: request.time,
        payment_status: PaymentStatus::Pending,
        vehicle_id: None,
        trip_status: TripStatus::Pending,
        remarks: request.remarks.clone(),
        created_at: now,
    })
}

/// The requested vehicle if it is one of the driver's active vehicles,
/// otherwise the driver's first active vehicle.
pub fn choose_vehicle(vehicles: &[TaxiVehicle], requested: Option<Uuid>) -> TaxiResult<&TaxiVehicle> {
    let mut active = vehicles.iter().filter(|v| v.is_active);
    match requested {
        Some(id) => active.find(|v| v.id == id).ok_or(TaxiError::NoActiveVehicle),
        None => active.next().ok_or(TaxiError::NoActiveVehicle),
    }
}

/// `others` are the vehicle's bookings other than the one being accepted.
pub fn check_slot_free(booking: &TaxiBooking, others: &[TaxiBooking]) -> TaxiResult<()> {
    let clash = others.iter().any(|o| {
        o.id != booking.id && o.trip_status != TripStatus::Cancelled && o.date == booking.date && o.time == booking.time
    });
    if clash {
        return Err(TaxiError::SlotTaken);
    }
    Ok(())
}

pub fn check_acceptable(booking: &TaxiBooking) -> TaxiResult<()> {
    if booking.vehicle_id.is_some() {
        return Err(TaxiError::AlreadyAssigned);
    }
    if booking.trip_status != TripStatus::Pending {
        return Err(TaxiError::InvalidTransition { from: booking.trip_status, to: TripStatus::Confirmed });
    }
    Ok(())
}

pub fn check_transition(from: TripStatus, to: TripStatus) -> TaxiResult<()> {
    if !from.can_transition_to(to) {
        return Err(TaxiError::InvalidTransition { from, to });
    }
    Ok(())
}

pub fn check_customer_cancel(booking: &TaxiBooking) -> TaxiResult<()> {
    match booking.trip_status {
        TripStatus::Pending | TripStatus::Confirmed => Ok(()),
        _ => Err(TaxiError::NotCancellable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seater(trip_id: Uuid) -> Seater {
        Seater { id: Uuid::new_v4(), seat: "Front Seat".into(), price: dec!(850), trip_id }
    }

    fn request(trip_id: Uuid, seater_id: Uuid) -> NewTaxiBooking {
        NewTaxiBooking {
            trip_id,
            seater_id,
            date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            remarks: None,
        }
    }

    fn vehicle(active: bool) -> TaxiVehicle {
        TaxiVehicle {
            id: Uuid::new_v4(),
            name: "Hiace".into(),
            vehicle_no: "BA 2 JA 1234".into(),
            driver_id: Uuid::new_v4(),
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_capacity() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert!(check_capacity(date, 2, 3).is_ok());
        assert!(matches!(check_capacity(date, 3, 3), Err(TaxiError::FullyBooked(_))));
        assert!(matches!(check_capacity(date, 0, 0), Err(TaxiError::NoVehicles)));
    }

    #[test]
    fn test_price_comes_from_seater() {
        let trip = Uuid::new_v4();
        let s = seater(trip);
        let booking = new_booking(Uuid::new_v4(), &request(trip, s.id), &s, Utc::now()).unwrap();
        assert_eq!(booking.price, dec!(850));
        assert_eq!(booking.trip_status, TripStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);

        let other = seater(Uuid::new_v4());
        assert!(matches!(
            new_booking(Uuid::new_v4(), &request(trip, other.id), &other, Utc::now()),
            Err(TaxiError::SeaterTripMismatch)
        ));
    }

    #[test]
    fn test_choose_vehicle() {
        let vehicles = vec![vehicle(false), vehicle(true), vehicle(true)];
        assert_eq!(choose_vehicle(&vehicles, None).unwrap().id, vehicles[1].id);
        assert_eq!(choose_vehicle(&vehicles, Some(vehicles[2].id)).unwrap().id, vehicles[2].id);
        assert!(choose_vehicle(&vehicles, Some(vehicles[0].id)).is_err());
        assert!(choose_vehicle(&[], None).is_err());
    }

    #[test]
    fn test_slot_clash_ignores_cancelled() {
        let trip = Uuid::new_v4();
        let s = seater(trip);
        let booking = new_booking(Uuid::new_v4(), &request(trip, s.id), &s, Utc::now()).unwrap();
        let mut other = new_booking(Uuid::new_v4(), &request(trip, s.id), &s, Utc::now()).unwrap();

        assert!(matches!(check_slot_free(&booking, &[other.clone()]), Err(TaxiError::SlotTaken)));
        other.trip_status = TripStatus::Cancelled;
        assert!(check_slot_free(&booking, &[other]).is_ok());
    }

    #[test]
    fn test_customer_cancel_window() {
        let trip = Uuid::new_v4();
        let s = seater(trip);
        let mut booking = new_booking(Uuid::new_v4(), &request(trip, s.id), &s, Utc::now()).unwrap();
        assert!(check_customer_cancel(&booking).is_ok());
        booking.trip_status = TripStatus::Ongoing;
        assert!(matches!(check_customer_cancel(&booking), Err(TaxiError::NotCancellable)));
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::commission;
use crate::models::{Agent, BookingStatus, Dealer, Passenger, Seat, SeatStatus, TravelBooking, TravelVehicle};
use crate::seats::check_travel_date;
use crate::{TravelError, TravelResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub vehicle_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub booking_date: DateTime<Utc>,
    #[serde(flatten)]
    pub passenger: Passenger,
    pub customer_id: Option<Uuid>,
    pub remarks: Option<String>,
    pub boarding_place: Option<Uuid>,
}

/// `TKT-YYYYMMDD-XXXXXXXX` with eight random uppercase hex characters.
pub fn ticket_number(issued_at: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("TKT-{}-{}", issued_at.format("%Y%m%d"), suffix)
}

/// Everything a booking request needs once roles and rows are loaded.
pub struct BookingContext<'a> {
    pub booked_by: Uuid,
    pub vehicle: &'a TravelVehicle,
    pub seats: &'a [Seat],
    pub agent: Option<&'a Agent>,
    pub dealer: Option<&'a Dealer>,
}

/// Build one `booked` booking per requested seat. Any missing or taken seat
/// fails the whole request.
pub fn plan(ctx: &BookingContext<'_>, request: &NewBooking, now: DateTime<Utc>) -> TravelResult<Vec<TravelBooking>> {
    if request.seat_ids.is_empty() {
        return Err(TravelError::NoSeats);
    }
    check_travel_date(request.booking_date.date_naive(), now.date_naive())?;

    let requested: HashSet<Uuid> = request.seat_ids.iter().copied().collect();
    if requested.len() != request.seat_ids.len() {
        return Err(TravelError::SeatsUnavailable);
    }

    let chosen: Vec<&Seat> = ctx
        .seats
        .iter()
        .filter(|s| requested.contains(&s.id))
        .filter(|s| s.vehicle_id == ctx.vehicle.id && s.status == SeatStatus::Available)
        .collect();
    if chosen.len() != requested.len() {
        return Err(TravelError::SeatsUnavailable);
    }

    let commissions = commission::compute(ctx.vehicle, ctx.agent, ctx.dealer);

    Ok(chosen
        .into_iter()
        .map(|seat| TravelBooking {
            id: Uuid::new_v4(),
            ticket_number: ticket_number(now),
            customer_id: request.customer_id,
            passenger: request.passenger.clone(),
            remarks: request.remarks.clone(),
            agent_id: ctx.agent.map(|a| a.id),
            booked_by: ctx.booked_by,
            vehicle_id: ctx.vehicle.id,
            seat_id: seat.id,
            status: BookingStatus::Booked,
            booking_date: request.booking_date,
            boarding_date: None,
            boarding_place: request.boarding_place,
            actual_price: ctx.vehicle.actual_seat_price,
            commissions,
            created_at: now,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommissionKind, CommissionRule, Floor, Gender, SeatSide};
    use crate::seats::{generate, SeatRow};
    use chrono::{Duration, NaiveTime};
    use rust_decimal_macros::dec;

    fn vehicle() -> TravelVehicle {
        TravelVehicle {
            id: Uuid::new_v4(),
            committee_id: Uuid::new_v4(),
            name: "Night Express".into(),
            vehicle_no: "GA 1 KHA 77".into(),
            from_place: Uuid::new_v4(),
            to_place: Uuid::new_v4(),
            departure_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            seat_price: dec!(1500),
            actual_seat_price: dec!(1200),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn request(vehicle_id: Uuid, seat_ids: Vec<Uuid>, date: DateTime<Utc>) -> NewBooking {
        NewBooking {
            vehicle_id,
            seat_ids,
            booking_date: date,
            passenger: Passenger {
                name: "Hari".into(),
                phone: "9811111111".into(),
                gender: Gender::Male,
                nationality: None,
            },
            customer_id: None,
            remarks: None,
            boarding_place: None,
        }
    }

    #[test]
    fn test_ticket_number_format() {
        let at = DateTime::parse_from_rfc3339("2026-04-09T10:00:00Z").unwrap().with_timezone(&Utc);
        let ticket = ticket_number(at);
        assert!(ticket.starts_with("TKT-20260409-"));
        let suffix = &ticket["TKT-20260409-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_plan_books_each_seat() {
        let v = vehicle();
        let seats = generate(v.id, &[SeatRow { floor: Floor::Lower, side: SeatSide::A, count: 4 }]);
        let agent = Agent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dealer_id: None,
            rule: CommissionRule { kind: CommissionKind::Flat, value: dec!(40) },
            is_active: true,
            committee_ids: vec![v.committee_id],
            created_at: Utc::now(),
        };
        let ctx = BookingContext { booked_by: agent.user_id, vehicle: &v, seats: &seats, agent: Some(&agent), dealer: None };
        let now = Utc::now();

        let bookings = plan(&ctx, &request(v.id, vec![seats[0].id, seats[2].id], now), now).unwrap();
        assert_eq!(bookings.len(), 2);
        assert!(bookings.iter().all(|b| b.status == BookingStatus::Booked));
        assert!(bookings.iter().all(|b| b.agent_id == Some(agent.id)));
        assert_eq!(bookings[0].actual_price, dec!(1200));
        assert_eq!(bookings[0].commissions.agent, dec!(40.00));
        assert_ne!(bookings[0].ticket_number, bookings[1].ticket_number);
    }

    #[test]
    fn test_plan_rejects_taken_foreign_and_past() {
        let v = vehicle();
        let mut seats = generate(v.id, &[SeatRow { floor: Floor::Upper, side: SeatSide::B, count: 2 }]);
        seats[1].status = SeatStatus::Booked;
        let ctx = BookingContext { booked_by: Uuid::new_v4(), vehicle: &v, seats: &seats, agent: None, dealer: None };
        let now = Utc::now();

        assert!(matches!(
            plan(&ctx, &request(v.id, vec![seats[0].id, seats[1].id], now), now),
            Err(TravelError::SeatsUnavailable)
        ));
        assert!(matches!(
            plan(&ctx, &request(v.id, vec![Uuid::new_v4()], now), now),
            Err(TravelError::SeatsUnavailable)
        ));
        assert!(matches!(
            plan(&ctx, &request(v.id, vec![], now), now),
            Err(TravelError::NoSeats)
        ));
        assert!(matches!(
            plan(&ctx, &request(v.id, vec![seats[0].id], now - Duration::days(2)), now),
            Err(TravelError::PastDate)
        ));
    }
}

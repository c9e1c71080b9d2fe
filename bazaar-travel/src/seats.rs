use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Floor, Seat, SeatSide, SeatStatus};
use crate::{TravelError, TravelResult};

#[derive(Debug, Clone, Serialize)]
pub struct SeatCell {
    pub id: Uuid,
    pub number: i32,
    pub status: SeatStatus,
}

/// Seats grouped by floor then side, each side ordered by number.
pub type SeatLayout = BTreeMap<Floor, BTreeMap<SeatSide, Vec<SeatCell>>>;

pub fn layout(seats: &[Seat]) -> SeatLayout {
    let mut grouped: SeatLayout = BTreeMap::new();
    for floor in [Floor::Lower, Floor::Upper] {
        let sides = grouped.entry(floor).or_default();
        for side in [SeatSide::A, SeatSide::B, SeatSide::C] {
            sides.entry(side).or_default();
        }
    }

    for seat in seats {
        grouped
            .entry(seat.floor)
            .or_default()
            .entry(seat.side)
            .or_default()
            .push(SeatCell { id: seat.id, number: seat.number, status: seat.status });
    }
    for sides in grouped.values_mut() {
        for cells in sides.values_mut() {
            cells.sort_by_key(|c| c.number);
        }
    }
    grouped
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatAvailability {
    pub id: Uuid,
    pub side: SeatSide,
    pub number: i32,
    pub floor: Floor,
    pub status: SeatStatus,
}

/// `held` holds the seats with a pending or booked booking on the date.
pub fn availability(seats: &[Seat], held: &HashSet<Uuid>) -> Vec<SeatAvailability> {
    seats
        .iter()
        .map(|seat| {
            let taken = seat.status.is_taken() || held.contains(&seat.id);
            SeatAvailability {
                id: seat.id,
                side: seat.side,
                number: seat.number,
                floor: seat.floor,
                status: if taken { SeatStatus::Booked } else { SeatStatus::Available },
            }
        })
        .collect()
}

pub fn check_travel_date(date: NaiveDate, today: NaiveDate) -> TravelResult<()> {
    if date < today {
        return Err(TravelError::PastDate);
    }
    Ok(())
}

pub fn check_reset_date(date: Option<NaiveDate>, today: NaiveDate) -> TravelResult<()> {
    match date {
        Some(d) if d < today => Err(TravelError::PastResetDate),
        _ => Ok(()),
    }
}

/// One row of a layout request: `count` seats on `side` of `floor`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeatRow {
    pub floor: Floor,
    pub side: SeatSide,
    pub count: u32,
}

/// Fresh available seats numbered from 1 on each floor and side.
pub fn generate(vehicle_id: Uuid, rows: &[SeatRow]) -> Vec<Seat> {
    let mut next: BTreeMap<(Floor, SeatSide), i32> = BTreeMap::new();
    let mut seats = Vec::new();
    for row in rows {
        let counter = next.entry((row.floor, row.side)).or_insert(0);
        for _ in 0..row.count {
            *counter += 1;
            seats.push(Seat {
                id: Uuid::new_v4(),
                vehicle_id,
                side: row.side,
                number: *counter,
                floor: row.floor,
                status: SeatStatus::Available,
            });
        }
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_numbers_per_floor_and_side() {
        let vehicle = Uuid::new_v4();
        let seats = generate(
            vehicle,
            &[
                SeatRow { floor: Floor::Lower, side: SeatSide::A, count: 2 },
                SeatRow { floor: Floor::Lower, side: SeatSide::B, count: 2 },
                SeatRow { floor: Floor::Lower, side: SeatSide::A, count: 1 },
            ],
        );
        assert_eq!(seats.len(), 5);
        let a_numbers: Vec<i32> = seats.iter().filter(|s| s.side == SeatSide::A).map(|s| s.number).collect();
        assert_eq!(a_numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_layout_groups_and_orders() {
        let vehicle = Uuid::new_v4();
        let mut seats = generate(vehicle, &[SeatRow { floor: Floor::Upper, side: SeatSide::C, count: 3 }]);
        seats.reverse();
        let grouped = layout(&seats);

        let cells = &grouped[&Floor::Upper][&SeatSide::C];
        assert_eq!(cells.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(grouped[&Floor::Lower][&SeatSide::A].is_empty());

        let json = serde_json::to_value(&grouped).unwrap();
        assert_eq!(json["upper"]["C"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_availability_uses_status_and_holds() {
        let vehicle = Uuid::new_v4();
        let mut seats = generate(vehicle, &[SeatRow { floor: Floor::Lower, side: SeatSide::A, count: 3 }]);
        seats[0].status = SeatStatus::Boarded;
        let held: HashSet<Uuid> = [seats[1].id].into_iter().collect();

        let view = availability(&seats, &held);
        assert_eq!(view[0].status, SeatStatus::Booked);
        assert_eq!(view[1].status, SeatStatus::Booked);
        assert_eq!(view[2].status, SeatStatus::Available);
    }

    #[test]
    fn test_reset_date_rules() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(check_reset_date(None, today).is_ok());
        assert!(check_reset_date(Some(today), today).is_ok());
        assert!(check_reset_date(today.pred_opt(), today).is_err());
    }
}

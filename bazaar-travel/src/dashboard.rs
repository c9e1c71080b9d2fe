use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use bazaar_core::PeriodTotals;
use bazaar_shared::round_money;

use crate::models::{Agent, BookingStatus, CommissionRule, Committee, Seat, TravelBooking, TravelVehicle};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookingCounts {
    pub total: usize,
    pub today: usize,
    pub week: usize,
    pub month: usize,
    pub pending: usize,
}

impl BookingCounts {
    /// Buckets are by creation day.
    pub fn collect(bookings: &[TravelBooking], today: NaiveDate) -> Self {
        let week_ago = today - Duration::days(7);
        let month_ago = today - Duration::days(30);

        bookings.iter().fold(Self::default(), |mut acc, b| {
            let day = b.created_at.date_naive();
            acc.total += 1;
            if day == today {
                acc.today += 1;
            }
            if day >= week_ago {
                acc.week += 1;
            }
            if day >= month_ago {
                acc.month += 1;
            }
            if b.status == BookingStatus::Pending {
                acc.pending += 1;
            }
            acc
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActiveCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl ActiveCounts {
    fn from_flags(flags: impl Iterator<Item = bool>) -> Self {
        let (total, active) = flags.fold((0, 0), |(t, a), on| (t + 1, a + usize::from(on)));
        Self { total, active, inactive: total - active }
    }
}

/// Percent of seats booked or boarded, to two places.
pub fn occupancy_rate(seats: &[Seat]) -> Decimal {
    if seats.is_empty() {
        return Decimal::ZERO;
    }
    let taken = seats.iter().filter(|s| s.status.is_taken()).count();
    round_money(Decimal::from(taken) * Decimal::ONE_HUNDRED / Decimal::from(seats.len()))
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Committee> for CommitteeSummary {
    fn from(c: &Committee) -> Self {
        Self { id: c.id, name: c.name.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeDashboard {
    pub committee: CommitteeSummary,
    pub vehicles: ActiveCounts,
    pub bookings: BookingCounts,
    pub revenue: PeriodTotals,
    pub staff_count: usize,
    pub occupancy_rate: Decimal,
    pub balance: Decimal,
}

impl CommitteeDashboard {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        committee: &Committee,
        vehicles: &[TravelVehicle],
        seats: &[Seat],
        bookings: &[TravelBooking],
        revenue: PeriodTotals,
        staff_count: usize,
        balance: Decimal,
        today: NaiveDate,
    ) -> Self {
        Self {
            committee: committee.into(),
            vehicles: ActiveCounts::from_flags(vehicles.iter().map(|v| v.is_active)),
            bookings: BookingCounts::collect(bookings, today),
            revenue,
            staff_count,
            occupancy_rate: occupancy_rate(seats),
            balance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffPermissions {
    pub booking: bool,
    pub boarding: bool,
    pub finance: bool,
}

/// Widgets appear only for the permissions the staff member holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StaffWidgets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingWidget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boarding: Option<BoardingWidget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance: Option<FinanceWidget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingWidget {
    pub today_bookings: usize,
    pub pending_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardingWidget {
    pub queue_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinanceWidget {
    pub today_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffDashboard {
    pub staff_id: Uuid,
    pub committee: CommitteeSummary,
    pub permissions: StaffPermissions,
    pub widgets: StaffWidgets,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopAgent {
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub booking_count: usize,
}

/// The `limit` agents with the most bookings, ties broken by agent id.
pub fn top_agents(agents: &[Agent], bookings: &[TravelBooking], limit: usize) -> Vec<TopAgent> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for agent_id in bookings.iter().filter_map(|b| b.agent_id) {
        *counts.entry(agent_id).or_default() += 1;
    }

    let mut ranked: Vec<TopAgent> = agents
        .iter()
        .map(|a| TopAgent {
            agent_id: a.id,
            user_id: a.user_id,
            booking_count: counts.get(&a.id).copied().unwrap_or(0),
        })
        .collect();
    ranked.sort_by(|a, b| b.booking_count.cmp(&a.booking_count).then(a.agent_id.cmp(&b.agent_id)));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, Serialize)]
pub struct DealerDashboard {
    pub dealer_id: Uuid,
    #[serde(flatten)]
    pub rule: CommissionRule,
    pub agents: ActiveCounts,
    pub bookings: BookingCounts,
    pub revenue: PeriodTotals,
    pub top_agents: Vec<TopAgent>,
    pub balance: Decimal,
}

impl DealerDashboard {
    pub fn agent_counts(agents: &[Agent]) -> ActiveCounts {
        ActiveCounts::from_flags(agents.iter().map(|a| a.is_active))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDashboard {
    pub agent_id: Uuid,
    pub dealer_id: Option<Uuid>,
    pub bookings: BookingCounts,
    pub revenue: PeriodTotals,
    pub committees: Vec<CommitteeSummary>,
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::Commissions;
    use crate::models::{CommissionKind, Floor, Gender, Passenger, SeatSide, SeatStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn booking(agent_id: Option<Uuid>, days_ago: i64, status: BookingStatus) -> TravelBooking {
        TravelBooking {
            id: Uuid::new_v4(),
            ticket_number: format!("TKT-{}", Uuid::new_v4()),
            customer_id: None,
            passenger: Passenger { name: "P".into(), phone: "98".into(), gender: Gender::Male, nationality: None },
            remarks: None,
            agent_id,
            booked_by: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            status,
            booking_date: Utc::now(),
            boarding_date: None,
            boarding_place: None,
            actual_price: dec!(100),
            commissions: Commissions::default(),
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_booking_counts() {
        let today = Utc::now().date_naive();
        let bookings = vec![
            booking(None, 0, BookingStatus::Booked),
            booking(None, 3, BookingStatus::Pending),
            booking(None, 20, BookingStatus::Boarded),
            booking(None, 90, BookingStatus::Boarded),
        ];
        let counts = BookingCounts::collect(&bookings, today);
        assert_eq!(counts, BookingCounts { total: 4, today: 1, week: 2, month: 3, pending: 1 });
    }

    #[test]
    fn test_occupancy_rounds() {
        let vehicle = Uuid::new_v4();
        let seat = |status| Seat { id: Uuid::new_v4(), vehicle_id: vehicle, side: SeatSide::A, number: 1, floor: Floor::Lower, status };
        let seats = vec![seat(SeatStatus::Booked), seat(SeatStatus::Available), seat(SeatStatus::Available)];
        assert_eq!(occupancy_rate(&seats), dec!(33.33));
        assert_eq!(occupancy_rate(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_top_agents_ranked_by_bookings() {
        let agent = |active| Agent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dealer_id: None,
            rule: CommissionRule { kind: CommissionKind::Flat, value: dec!(1) },
            is_active: active,
            committee_ids: vec![],
            created_at: Utc::now(),
        };
        let agents = vec![agent(true), agent(true), agent(false)];
        let bookings = vec![
            booking(Some(agents[1].id), 0, BookingStatus::Booked),
            booking(Some(agents[1].id), 0, BookingStatus::Booked),
            booking(Some(agents[0].id), 0, BookingStatus::Booked),
        ];

        let top = top_agents(&agents, &bookings, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].agent_id, agents[1].id);
        assert_eq!(top[0].booking_count, 2);
        assert_eq!(DealerDashboard::agent_counts(&agents), ActiveCounts { total: 3, active: 2, inactive: 1 });
    }
}

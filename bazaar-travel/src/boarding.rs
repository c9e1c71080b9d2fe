use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use bazaar_core::{Account, Credit, Reference, TransactionType};

use crate::models::{BookingStatus, Seat, SeatStatus, Staff, TravelBooking, TravelVehicle};
use crate::{TravelError, TravelResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketScan {
    pub ticket_number: Option<String>,
    pub qr_code: Option<String>,
}

impl TicketScan {
    /// QR codes encode the ticket number, so either field identifies the ticket.
    pub fn lookup_value(&self) -> TravelResult<&str> {
        self.ticket_number
            .as_deref()
            .or(self.qr_code.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(TravelError::MissingTicket)
    }
}

pub fn check_scannable(booking: &TravelBooking, seat: &Seat, today: NaiveDate) -> TravelResult<()> {
    let travel_date = booking.booking_date.date_naive();
    if travel_date != today {
        return Err(TravelError::NotToday(travel_date));
    }
    if booking.status != BookingStatus::Booked {
        return Err(TravelError::NotBoardable(booking.status));
    }
    if seat.status != SeatStatus::Booked {
        return Err(TravelError::SeatNotBooked);
    }
    Ok(())
}

pub fn check_boardable(booking: &TravelBooking, vehicle: &TravelVehicle, staff: &Staff) -> TravelResult<()> {
    if vehicle.committee_id != staff.committee_id {
        return Err(TravelError::ForeignCommittee);
    }
    if booking.status != BookingStatus::Booked {
        return Err(TravelError::NotBoardable(booking.status));
    }
    Ok(())
}

/// The users who receive a share when a passenger boards.
#[derive(Debug, Clone, Copy)]
pub struct Payees {
    pub committee_owner: Uuid,
    pub dealer_user: Option<Uuid>,
    pub agent_user: Option<Uuid>,
}

/// Credits paid out on boarding: the committee owner receives the actual
/// price, intermediaries their commission, and the system account the rest.
/// When the intermediaries earn more than the margin the system account is
/// debited the shortfall as a commission deduction.
pub fn distribution(booking: &TravelBooking, payees: Payees) -> Vec<Credit> {
    let reference = Some(Reference::travel_booking(booking.id));
    let revenue = |account: Account, amount| Credit {
        account,
        amount,
        transaction_type: TransactionType::TravelBookingRevenue,
        description: format!("Travel booking revenue for ticket {}", booking.ticket_number),
        reference,
    };

    let mut credits = vec![revenue(Account::User(payees.committee_owner), booking.actual_price)];
    if let Some(dealer) = payees.dealer_user {
        credits.push(revenue(Account::User(dealer), booking.commissions.dealer));
    }
    if let Some(agent) = payees.agent_user {
        credits.push(revenue(Account::User(agent), booking.commissions.agent));
    }
    let net = booking.commissions.platform_net();
    let (transaction_type, description) = if net < Decimal::ZERO {
        (
            TransactionType::CommissionDeduction,
            format!("Commission shortfall for travel booking ticket {}", booking.ticket_number),
        )
    } else {
        (
            TransactionType::TravelBookingCommission,
            format!("System commission for travel booking ticket {}", booking.ticket_number),
        )
    };
    credits.push(Credit {
        account: Account::System,
        amount: net,
        transaction_type,
        description,
        reference,
    });
    credits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::Commissions;
    use crate::models::{Floor, Gender, Passenger, SeatSide};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn booking(status: BookingStatus) -> TravelBooking {
        TravelBooking {
            id: Uuid::new_v4(),
            ticket_number: "TKT-20260101-ABCDEF12".into(),
            customer_id: None,
            passenger: Passenger { name: "Gita".into(), phone: "9800000011".into(), gender: Gender::Female, nationality: None },
            remarks: None,
            agent_id: Some(Uuid::new_v4()),
            booked_by: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            status,
            booking_date: Utc::now(),
            boarding_date: None,
            boarding_place: None,
            actual_price: dec!(1200),
            commissions: Commissions { system: dec!(300), dealer: dec!(30), agent: dec!(50) },
            created_at: Utc::now(),
        }
    }

    fn seat(status: SeatStatus) -> Seat {
        Seat { id: Uuid::new_v4(), vehicle_id: Uuid::new_v4(), side: SeatSide::A, number: 1, floor: Floor::Lower, status }
    }

    #[test]
    fn test_scan_prefers_ticket_number() {
        let scan = TicketScan { ticket_number: Some(" TKT-1 ".into()), qr_code: Some("TKT-2".into()) };
        assert_eq!(scan.lookup_value().unwrap(), "TKT-1");
        assert!(TicketScan::default().lookup_value().is_err());
    }

    #[test]
    fn test_scannable_checks() {
        let today = Utc::now().date_naive();
        let b = booking(BookingStatus::Booked);
        assert!(check_scannable(&b, &seat(SeatStatus::Booked), today).is_ok());
        assert!(matches!(check_scannable(&b, &seat(SeatStatus::Available), today), Err(TravelError::SeatNotBooked)));
        assert!(matches!(
            check_scannable(&b, &seat(SeatStatus::Booked), today + Duration::days(1)),
            Err(TravelError::NotToday(_))
        ));
        let boarded = booking(BookingStatus::Boarded);
        assert!(matches!(
            check_scannable(&boarded, &seat(SeatStatus::Booked), today),
            Err(TravelError::NotBoardable(BookingStatus::Boarded))
        ));
    }

    #[test]
    fn test_distribution_balances_to_seat_price() {
        let b = booking(BookingStatus::Boarded);
        let payees = Payees { committee_owner: Uuid::new_v4(), dealer_user: Some(Uuid::new_v4()), agent_user: Some(Uuid::new_v4()) };
        let credits = distribution(&b, payees);

        assert_eq!(credits.len(), 4);
        let total: Decimal = credits.iter().map(|c| c.amount).sum();
        assert_eq!(total, dec!(1500));
        let system = credits.last().unwrap();
        assert_eq!(system.account, Account::System);
        assert_eq!(system.amount, dec!(220));
        assert_eq!(system.transaction_type, TransactionType::TravelBookingCommission);
    }

    #[test]
    fn test_distribution_debits_system_on_shortfall() {
        let mut b = booking(BookingStatus::Boarded);
        b.actual_price = dec!(1000);
        b.commissions = Commissions { system: dec!(0), dealer: dec!(0), agent: dec!(10) };
        let payees = Payees { committee_owner: Uuid::new_v4(), dealer_user: None, agent_user: Some(Uuid::new_v4()) };
        let credits = distribution(&b, payees);

        assert_eq!(credits.len(), 3);
        let total: Decimal = credits.iter().map(|c| c.amount).sum();
        assert_eq!(total, dec!(1000));
        let system = credits.last().unwrap();
        assert_eq!(system.account, Account::System);
        assert_eq!(system.amount, dec!(-10.00));
        assert_eq!(system.transaction_type, TransactionType::CommissionDeduction);
    }
}

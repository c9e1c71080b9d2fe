use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_shared::round_money;

use crate::models::{TaxiBooking, TripStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EarningsWindow {
    pub earnings: Decimal,
    pub bookings: usize,
}

/// Completed trips grouped by trip date, plus the driver's open workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverEarnings {
    pub total: EarningsWindow,
    pub week: EarningsWindow,
    pub month: EarningsWindow,
    pub active_bookings: usize,
    pub vehicle_count: usize,
}

impl DriverEarnings {
    pub fn collect(bookings: &[TaxiBooking], vehicle_count: usize, today: NaiveDate) -> Self {
        let week_ago = today - Duration::days(7);
        let month_ago = today - Duration::days(30);
        let mut out = Self { vehicle_count, ..Default::default() };

        for b in bookings {
            if b.trip_status.is_active() {
                out.active_bookings += 1;
            }
            if b.trip_status != TripStatus::Completed {
                continue;
            }
            add(&mut out.total, b.price);
            if b.date >= week_ago {
                add(&mut out.week, b.price);
            }
            if b.date >= month_ago {
                add(&mut out.month, b.price);
            }
        }
        out
    }
}

fn add(window: &mut EarningsWindow, amount: Decimal) {
    window.earnings = round_money(window.earnings + amount);
    window.bookings += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentStatus;
    use chrono::{NaiveTime, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn booking(status: TripStatus, days_ago: i64, today: NaiveDate, price: Decimal) -> TaxiBooking {
        TaxiBooking {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            seater_id: Uuid::new_v4(),
            price,
            date: today - Duration::days(days_ago),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            payment_status: PaymentStatus::Paid,
            vehicle_id: Some(Uuid::new_v4()),
            trip_status: status,
            remarks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_earnings_windows() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap();
        let bookings = vec![
            booking(TripStatus::Completed, 1, today, dec!(500)),
            booking(TripStatus::Completed, 10, today, dec!(700)),
            booking(TripStatus::Completed, 45, today, dec!(900)),
            booking(TripStatus::Confirmed, 0, today, dec!(400)),
            booking(TripStatus::Cancelled, 0, today, dec!(400)),
        ];

        let e = DriverEarnings::collect(&bookings, 2, today);
        assert_eq!(e.total, EarningsWindow { earnings: dec!(2100), bookings: 3 });
        assert_eq!(e.week, EarningsWindow { earnings: dec!(500), bookings: 1 });
        assert_eq!(e.month, EarningsWindow { earnings: dec!(1200), bookings: 2 });
        assert_eq!(e.active_bookings, 1);
        assert_eq!(e.vehicle_count, 2);
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_shared::{percent_of, round_money};

use crate::models::{Agent, CommissionKind, CommissionRule, Dealer, TravelVehicle};

/// Per-seat split of the margin between seat price and actual seat price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Commissions {
    #[serde(rename = "system_commission")]
    pub system: Decimal,
    #[serde(rename = "dealer_commission")]
    pub dealer: Decimal,
    #[serde(rename = "agent_commission")]
    pub agent: Decimal,
}

impl Commissions {
    /// What the platform keeps after paying the intermediaries. Negative when
    /// the intermediaries earn more than the margin.
    pub fn platform_net(&self) -> Decimal {
        round_money(self.system - self.dealer - self.agent)
    }
}

impl CommissionRule {
    pub fn apply(&self, system: Decimal) -> Decimal {
        match self.kind {
            CommissionKind::Flat => round_money(self.value),
            CommissionKind::Percentage => percent_of(system, self.value),
        }
    }
}

/// Dealer commission applies only through an agent that belongs to that dealer.
/// Intermediary commissions are kept as configured even when they exceed the
/// margin; the shortfall is settled against the system account on boarding.
pub fn compute(vehicle: &TravelVehicle, agent: Option<&Agent>, dealer: Option<&Dealer>) -> Commissions {
    let system = round_money(vehicle.seat_price - vehicle.actual_seat_price);

    let dealer_commission = match (agent, dealer) {
        (Some(a), Some(d)) if a.dealer_id == Some(d.id) => d.rule.apply(system),
        _ => Decimal::ZERO,
    };
    let agent_commission = agent.map(|a| a.rule.apply(system)).unwrap_or(Decimal::ZERO);

    Commissions {
        system,
        dealer: dealer_commission,
        agent: agent_commission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn vehicle(seat_price: Decimal, actual: Decimal) -> TravelVehicle {
        TravelVehicle {
            id: Uuid::new_v4(),
            committee_id: Uuid::new_v4(),
            name: "Sajha".into(),
            vehicle_no: "NA 3 KHA 101".into(),
            from_place: Uuid::new_v4(),
            to_place: Uuid::new_v4(),
            departure_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            seat_price,
            actual_seat_price: actual,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn dealer(kind: CommissionKind, value: Decimal) -> Dealer {
        Dealer {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rule: CommissionRule { kind, value },
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn agent(dealer_id: Option<Uuid>, kind: CommissionKind, value: Decimal) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dealer_id,
            rule: CommissionRule { kind, value },
            is_active: true,
            committee_ids: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_staff_booking_keeps_full_margin() {
        let c = compute(&vehicle(dec!(1500), dec!(1200)), None, None);
        assert_eq!(c.system, dec!(300.00));
        assert_eq!(c.dealer, Decimal::ZERO);
        assert_eq!(c.agent, Decimal::ZERO);
        assert_eq!(c.platform_net(), dec!(300.00));
    }

    #[test]
    fn test_percentage_and_flat_rules() {
        let d = dealer(CommissionKind::Percentage, dec!(10));
        let a = agent(Some(d.id), CommissionKind::Flat, dec!(50));

        let c = compute(&vehicle(dec!(1500), dec!(1200)), Some(&a), Some(&d));
        assert_eq!(c.system, dec!(300.00));
        assert_eq!(c.dealer, dec!(30.00));
        assert_eq!(c.agent, dec!(50.00));
        assert_eq!(c.platform_net(), dec!(220.00));
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let d = dealer(CommissionKind::Percentage, dec!(12.5));
        let a = agent(Some(d.id), CommissionKind::Percentage, dec!(7.5));

        // 100.20 * 12.5% = 12.525 and 100.20 * 7.5% = 7.515
        let c = compute(&vehicle(dec!(1100.20), dec!(1000)), Some(&a), Some(&d));
        assert_eq!(c.dealer, dec!(12.53));
        assert_eq!(c.agent, dec!(7.52));
    }

    #[test]
    fn test_dealer_ignored_without_matching_agent() {
        let d = dealer(CommissionKind::Flat, dec!(20));
        let a = agent(None, CommissionKind::Flat, dec!(10));

        let c = compute(&vehicle(dec!(500), dec!(400)), Some(&a), Some(&d));
        assert_eq!(c.dealer, Decimal::ZERO);
        assert_eq!(c.agent, dec!(10.00));

        let c = compute(&vehicle(dec!(500), dec!(400)), None, Some(&d));
        assert_eq!(c.dealer, Decimal::ZERO);
    }

    #[test]
    fn test_intermediaries_may_exceed_margin() {
        let d = dealer(CommissionKind::Flat, dec!(80));
        let a = agent(Some(d.id), CommissionKind::Flat, dec!(30));

        let c = compute(&vehicle(dec!(500), dec!(400)), Some(&a), Some(&d));
        assert_eq!(c.dealer, dec!(80.00));
        assert_eq!(c.agent, dec!(30.00));
        assert_eq!(c.platform_net(), dec!(-10.00));

        // no margin at all still pays a flat agent rule
        let c = compute(&vehicle(dec!(1000), dec!(1000)), Some(&a), None);
        assert_eq!(c.system, dec!(0.00));
        assert_eq!(c.agent, dec!(30.00));
        assert_eq!(c.platform_net(), dec!(-30.00));
    }
}

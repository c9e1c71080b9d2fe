use serde::Serialize;
use uuid::Uuid;

use crate::models::{Agent, Committee, Dealer, Staff, TravelBooking, TravelVehicle};
use crate::repository::{BookingScope, VehicleScope};
use crate::{TravelError, TravelResult};

/// Every travel role a user holds. A user may hold several; the first in
/// priority order decides what they see.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TravelRoles {
    pub user_id: Uuid,
    pub committee: Option<Committee>,
    pub staff: Option<Staff>,
    pub dealer: Option<Dealer>,
    pub agent: Option<Agent>,
}

#[derive(Debug, Clone, Copy)]
pub enum PrimaryRole<'a> {
    Committee(&'a Committee),
    Staff(&'a Staff),
    Dealer(&'a Dealer),
    Agent(&'a Agent),
    Customer,
}

impl TravelRoles {
    pub fn primary(&self) -> PrimaryRole<'_> {
        if let Some(c) = &self.committee {
            PrimaryRole::Committee(c)
        } else if let Some(s) = &self.staff {
            PrimaryRole::Staff(s)
        } else if let Some(d) = &self.dealer {
            PrimaryRole::Dealer(d)
        } else if let Some(a) = &self.agent {
            PrimaryRole::Agent(a)
        } else {
            PrimaryRole::Customer
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self.primary() {
            PrimaryRole::Committee(_) => "committee",
            PrimaryRole::Staff(_) => "staff",
            PrimaryRole::Dealer(_) => "dealer",
            PrimaryRole::Agent(_) => "agent",
            PrimaryRole::Customer => "customer",
        }
    }

    /// The committee this user administers, as owner or staff.
    pub fn managed_committee(&self) -> Option<Uuid> {
        match self.primary() {
            PrimaryRole::Committee(c) => Some(c.id),
            PrimaryRole::Staff(s) => Some(s.committee_id),
            _ => None,
        }
    }

    pub fn require_committee(&self) -> TravelResult<&Committee> {
        self.committee
            .as_ref()
            .ok_or(TravelError::PermissionDenied("manage this committee"))
    }

    pub fn require_dealer(&self) -> TravelResult<&Dealer> {
        self.dealer.as_ref().ok_or(TravelError::PermissionDenied("list agents"))
    }

    pub fn require_agent(&self) -> TravelResult<&Agent> {
        self.agent.as_ref().ok_or(TravelError::PermissionDenied("view the agent dashboard"))
    }

    pub fn require_staff(&self) -> TravelResult<&Staff> {
        self.staff.as_ref().ok_or(TravelError::PermissionDenied("view the staff dashboard"))
    }

    pub fn boarding_staff(&self) -> TravelResult<&Staff> {
        match &self.staff {
            Some(s) if s.boarding_permission => Ok(s),
            _ => Err(TravelError::PermissionDenied("board passengers")),
        }
    }

    /// Agents book for themselves; staff need the booking permission.
    pub fn booking_agent(&self) -> TravelResult<Option<&Agent>> {
        if let Some(agent) = &self.agent {
            return Ok(Some(agent));
        }
        match &self.staff {
            Some(s) if s.booking_permission => Ok(None),
            _ => Err(TravelError::PermissionDenied("create bookings")),
        }
    }

    pub fn booking_scope(&self) -> BookingScope {
        match self.primary() {
            PrimaryRole::Committee(c) => BookingScope::Committee(c.id),
            PrimaryRole::Staff(s) => BookingScope::Committee(s.committee_id),
            PrimaryRole::Dealer(d) => BookingScope::Dealer(d.id),
            PrimaryRole::Agent(a) => BookingScope::Agent(a.id),
            PrimaryRole::Customer => BookingScope::Customer(self.user_id),
        }
    }

    /// `active_committees` are the agent's assigned committees that are still active.
    pub fn vehicle_scope(&self, active_committees: Vec<Uuid>) -> VehicleScope {
        match self.primary() {
            PrimaryRole::Committee(c) => VehicleScope::Committee(c.id),
            PrimaryRole::Staff(s) => VehicleScope::Committee(s.committee_id),
            PrimaryRole::Agent(_) => VehicleScope::Committees(active_committees),
            PrimaryRole::Dealer(_) | PrimaryRole::Customer => VehicleScope::AllActive,
        }
    }

    pub fn can_view_booking(&self, booking: &TravelBooking, vehicle: &TravelVehicle, agent_dealer: Option<Uuid>) -> bool {
        match self.primary() {
            PrimaryRole::Committee(c) => vehicle.committee_id == c.id,
            PrimaryRole::Staff(s) => vehicle.committee_id == s.committee_id,
            PrimaryRole::Dealer(d) => booking.agent_id.is_some() && agent_dealer == Some(d.id),
            PrimaryRole::Agent(a) => booking.agent_id == Some(a.id),
            PrimaryRole::Customer => booking.customer_id == Some(self.user_id),
        }
    }

    pub fn can_view_vehicle(&self, vehicle: &TravelVehicle) -> bool {
        match self.primary() {
            PrimaryRole::Committee(c) => vehicle.committee_id == c.id,
            PrimaryRole::Staff(s) => vehicle.committee_id == s.committee_id,
            PrimaryRole::Agent(a) => a.committee_ids.contains(&vehicle.committee_id),
            PrimaryRole::Dealer(_) | PrimaryRole::Customer => vehicle.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommissionKind, CommissionRule};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn staff(committee_id: Uuid, booking: bool, boarding: bool) -> Staff {
        Staff {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            committee_id,
            booking_permission: booking,
            boarding_permission: boarding,
            finance_permission: false,
            created_at: Utc::now(),
        }
    }

    fn agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dealer_id: None,
            rule: CommissionRule { kind: CommissionKind::Flat, value: Decimal::ZERO },
            is_active: true,
            committee_ids: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_staff_outranks_agent() {
        let committee_id = Uuid::new_v4();
        let roles = TravelRoles {
            user_id: Uuid::new_v4(),
            staff: Some(staff(committee_id, false, true)),
            agent: Some(agent()),
            ..Default::default()
        };
        assert_eq!(roles.role_name(), "staff");
        assert!(matches!(roles.booking_scope(), BookingScope::Committee(id) if id == committee_id));
        // Agents may still book even when their primary role is staff.
        assert!(matches!(roles.booking_agent(), Ok(Some(_))));
    }

    #[test]
    fn test_booking_permission() {
        let roles = TravelRoles {
            user_id: Uuid::new_v4(),
            staff: Some(staff(Uuid::new_v4(), false, true)),
            ..Default::default()
        };
        assert!(roles.booking_agent().is_err());
        assert!(roles.boarding_staff().is_ok());

        let customer = TravelRoles { user_id: Uuid::new_v4(), ..Default::default() };
        assert!(customer.booking_agent().is_err());
        assert!(matches!(customer.booking_scope(), BookingScope::Customer(_)));
    }
}

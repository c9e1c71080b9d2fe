use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use bazaar_core::{CoreError, CoreResult, Credit, Reference};
use bazaar_travel::models::{CommissionRule, Passenger};
use bazaar_travel::repository::BoardingOutcome;
use bazaar_travel::{
    Agent, BookingScope, BookingStatus, Commissions, Committee, Dealer, Seat, Staff, TravelBooking, TravelRepository,
    TravelVehicle, VehicleScope,
};

use crate::database::{db_err, from_text, to_text};
use crate::ledger;

pub struct StoreTravelRepository {
    pool: PgPool,
}

impl StoreTravelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CommitteeRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CommitteeRow> for Committee {
    fn from(row: CommitteeRow) -> Self {
        Committee {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: Uuid,
    user_id: Uuid,
    committee_id: Uuid,
    booking_permission: bool,
    boarding_permission: bool,
    finance_permission: bool,
    created_at: DateTime<Utc>,
}

impl From<StaffRow> for Staff {
    fn from(row: StaffRow) -> Self {
        Staff {
            id: row.id,
            user_id: row.user_id,
            committee_id: row.committee_id,
            booking_permission: row.booking_permission,
            boarding_permission: row.boarding_permission,
            finance_permission: row.finance_permission,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DealerRow {
    id: Uuid,
    user_id: Uuid,
    commission_type: String,
    commission_value: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<DealerRow> for Dealer {
    type Error = CoreError;

    fn try_from(row: DealerRow) -> CoreResult<Self> {
        Ok(Dealer {
            id: row.id,
            user_id: row.user_id,
            rule: CommissionRule { kind: from_text(&row.commission_type)?, value: row.commission_value },
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    user_id: Uuid,
    dealer_id: Option<Uuid>,
    commission_type: String,
    commission_value: Decimal,
    is_active: bool,
    committee_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AgentRow> for Agent {
    type Error = CoreError;

    fn try_from(row: AgentRow) -> CoreResult<Self> {
        Ok(Agent {
            id: row.id,
            user_id: row.user_id,
            dealer_id: row.dealer_id,
            rule: CommissionRule { kind: from_text(&row.commission_type)?, value: row.commission_value },
            is_active: row.is_active,
            committee_ids: row.committee_ids,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    committee_id: Uuid,
    name: String,
    vehicle_no: String,
    from_place: Uuid,
    to_place: Uuid,
    departure_time: NaiveTime,
    seat_price: Decimal,
    actual_seat_price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<VehicleRow> for TravelVehicle {
    fn from(row: VehicleRow) -> Self {
        TravelVehicle {
            id: row.id,
            committee_id: row.committee_id,
            name: row.name,
            vehicle_no: row.vehicle_no,
            from_place: row.from_place,
            to_place: row.to_place,
            departure_time: row.departure_time,
            seat_price: row.seat_price,
            actual_seat_price: row.actual_seat_price,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    vehicle_id: Uuid,
    side: String,
    number: i32,
    floor: String,
    status: String,
}

impl TryFrom<SeatRow> for Seat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> CoreResult<Self> {
        Ok(Seat {
            id: row.id,
            vehicle_id: row.vehicle_id,
            side: from_text(&row.side)?,
            number: row.number,
            floor: from_text(&row.floor)?,
            status: from_text(&row.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ticket_number: String,
    customer_id: Option<Uuid>,
    name: String,
    phone: String,
    gender: String,
    nationality: Option<String>,
    remarks: Option<String>,
    agent_id: Option<Uuid>,
    booked_by: Uuid,
    vehicle_id: Uuid,
    seat_id: Uuid,
    status: String,
    booking_date: DateTime<Utc>,
    boarding_date: Option<DateTime<Utc>>,
    boarding_place: Option<Uuid>,
    actual_price: Decimal,
    system_commission: Decimal,
    dealer_commission: Decimal,
    agent_commission: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for TravelBooking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> CoreResult<Self> {
        Ok(TravelBooking {
            id: row.id,
            ticket_number: row.ticket_number,
            customer_id: row.customer_id,
            passenger: Passenger {
                name: row.name,
                phone: row.phone,
                gender: from_text(&row.gender)?,
                nationality: row.nationality,
            },
            remarks: row.remarks,
            agent_id: row.agent_id,
            booked_by: row.booked_by,
            vehicle_id: row.vehicle_id,
            seat_id: row.seat_id,
            status: from_text(&row.status)?,
            booking_date: row.booking_date,
            boarding_date: row.boarding_date,
            boarding_place: row.boarding_place,
            actual_price: row.actual_price,
            commissions: Commissions {
                system: row.system_commission,
                dealer: row.dealer_commission,
                agent: row.agent_commission,
            },
            created_at: row.created_at,
        })
    }
}

fn bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<TravelBooking>> {
    rows.into_iter().map(TravelBooking::try_from).collect()
}

#[async_trait]
impl TravelRepository for StoreTravelRepository {
    async fn create_committee(&self, committee: &Committee) -> CoreResult<()> {
        sqlx::query("INSERT INTO travel_committees (id, user_id, name, is_active, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(committee.id)
            .bind(committee.user_id)
            .bind(&committee.name)
            .bind(committee.is_active)
            .bind(committee.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_committee(&self, id: Uuid) -> CoreResult<Option<Committee>> {
        let row = sqlx::query_as::<_, CommitteeRow>("SELECT * FROM travel_committees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Committee::from))
    }

    async fn update_committee(&self, committee: &Committee) -> CoreResult<()> {
        let result = sqlx::query("UPDATE travel_committees SET name = $2, is_active = $3 WHERE id = $1")
            .bind(committee.id)
            .bind(&committee.name)
            .bind(committee.is_active)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("committee", committee.id));
        }
        Ok(())
    }

    async fn committee_for_user(&self, user_id: Uuid) -> CoreResult<Option<Committee>> {
        let row = sqlx::query_as::<_, CommitteeRow>(
            "SELECT * FROM travel_committees WHERE user_id = $1 AND is_active ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Committee::from))
    }

    async fn staff_for_user(&self, user_id: Uuid) -> CoreResult<Option<Staff>> {
        let row = sqlx::query_as::<_, StaffRow>("SELECT * FROM travel_staff WHERE user_id = $1 ORDER BY created_at LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Staff::from))
    }

    async fn get_staff(&self, id: Uuid) -> CoreResult<Option<Staff>> {
        let row = sqlx::query_as::<_, StaffRow>("SELECT * FROM travel_staff WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Staff::from))
    }

    async fn list_staff(&self, committee_id: Uuid) -> CoreResult<Vec<Staff>> {
        let rows = sqlx::query_as::<_, StaffRow>(
            "SELECT * FROM travel_staff WHERE committee_id = $1 ORDER BY created_at DESC",
        )
        .bind(committee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Staff::from).collect())
    }

    async fn create_staff(&self, staff: &Staff) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO travel_staff
                (id, user_id, committee_id, booking_permission, boarding_permission, finance_permission, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(staff.id)
        .bind(staff.user_id)
        .bind(staff.committee_id)
        .bind(staff.booking_permission)
        .bind(staff.boarding_permission)
        .bind(staff.finance_permission)
        .bind(staff.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_staff(&self, staff: &Staff) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE travel_staff
            SET booking_permission = $2, boarding_permission = $3, finance_permission = $4
            WHERE id = $1
            "#,
        )
        .bind(staff.id)
        .bind(staff.booking_permission)
        .bind(staff.boarding_permission)
        .bind(staff.finance_permission)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("staff", staff.id));
        }
        Ok(())
    }

    async fn delete_staff(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM travel_staff WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("staff", id));
        }
        Ok(())
    }

    async fn create_dealer(&self, dealer: &Dealer) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO travel_dealers (id, user_id, commission_type, commission_value, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(dealer.id)
        .bind(dealer.user_id)
        .bind(to_text(&dealer.rule.kind))
        .bind(dealer.rule.value)
        .bind(dealer.is_active)
        .bind(dealer.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_dealer(&self, id: Uuid) -> CoreResult<Option<Dealer>> {
        sqlx::query_as::<_, DealerRow>("SELECT * FROM travel_dealers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Dealer::try_from)
            .transpose()
    }

    async fn update_dealer(&self, dealer: &Dealer) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE travel_dealers SET commission_type = $2, commission_value = $3, is_active = $4 WHERE id = $1",
        )
        .bind(dealer.id)
        .bind(to_text(&dealer.rule.kind))
        .bind(dealer.rule.value)
        .bind(dealer.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("dealer", dealer.id));
        }
        Ok(())
    }

    async fn dealer_for_user(&self, user_id: Uuid) -> CoreResult<Option<Dealer>> {
        sqlx::query_as::<_, DealerRow>("SELECT * FROM travel_dealers WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Dealer::try_from)
            .transpose()
    }

    async fn create_agent(&self, agent: &Agent) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO travel_agents
                (id, user_id, dealer_id, commission_type, commission_value, is_active, committee_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(agent.id)
        .bind(agent.user_id)
        .bind(agent.dealer_id)
        .bind(to_text(&agent.rule.kind))
        .bind(agent.rule.value)
        .bind(agent.is_active)
        .bind(&agent.committee_ids)
        .bind(agent.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_agent(&self, id: Uuid) -> CoreResult<Option<Agent>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM travel_agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Agent::try_from)
            .transpose()
    }

    async fn update_agent(&self, agent: &Agent) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE travel_agents
            SET dealer_id = $2, commission_type = $3, commission_value = $4, is_active = $5, committee_ids = $6
            WHERE id = $1
            "#,
        )
        .bind(agent.id)
        .bind(agent.dealer_id)
        .bind(to_text(&agent.rule.kind))
        .bind(agent.rule.value)
        .bind(agent.is_active)
        .bind(&agent.committee_ids)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("agent", agent.id));
        }
        Ok(())
    }

    async fn agent_for_user(&self, user_id: Uuid) -> CoreResult<Option<Agent>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM travel_agents WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Agent::try_from)
            .transpose()
    }

    async fn list_agents(&self, dealer_id: Uuid) -> CoreResult<Vec<Agent>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM travel_agents WHERE dealer_id = $1 ORDER BY created_at DESC")
            .bind(dealer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Agent::try_from)
            .collect()
    }

    async fn create_vehicle(&self, vehicle: &TravelVehicle, seats: &[Seat]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO travel_vehicles
                (id, committee_id, name, vehicle_no, from_place, to_place, departure_time,
                 seat_price, actual_seat_price, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.committee_id)
        .bind(&vehicle.name)
        .bind(&vehicle.vehicle_no)
        .bind(vehicle.from_place)
        .bind(vehicle.to_place)
        .bind(vehicle.departure_time)
        .bind(vehicle.seat_price)
        .bind(vehicle.actual_seat_price)
        .bind(vehicle.is_active)
        .bind(vehicle.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for seat in seats {
            sqlx::query(
                "INSERT INTO travel_seats (id, vehicle_id, side, number, floor, status) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(seat.id)
            .bind(seat.vehicle_id)
            .bind(to_text(&seat.side))
            .bind(seat.number)
            .bind(to_text(&seat.floor))
            .bind(to_text(&seat.status))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<TravelVehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>("SELECT * FROM travel_vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(TravelVehicle::from))
    }

    async fn update_vehicle(&self, vehicle: &TravelVehicle) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE travel_vehicles
            SET name = $2, vehicle_no = $3, from_place = $4, to_place = $5, departure_time = $6,
                seat_price = $7, actual_seat_price = $8, is_active = $9
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.name)
        .bind(&vehicle.vehicle_no)
        .bind(vehicle.from_place)
        .bind(vehicle.to_place)
        .bind(vehicle.departure_time)
        .bind(vehicle.seat_price)
        .bind(vehicle.actual_seat_price)
        .bind(vehicle.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("vehicle", vehicle.id));
        }
        Ok(())
    }

    async fn list_vehicles(&self, scope: &VehicleScope) -> CoreResult<Vec<TravelVehicle>> {
        let query = match scope {
            VehicleScope::Committee(id) => {
                sqlx::query_as::<_, VehicleRow>(
                    "SELECT * FROM travel_vehicles WHERE committee_id = $1 ORDER BY created_at DESC",
                )
                .bind(*id)
            }
            VehicleScope::Committees(ids) => sqlx::query_as::<_, VehicleRow>(
                "SELECT * FROM travel_vehicles WHERE is_active AND committee_id = ANY($1) ORDER BY created_at DESC",
            )
            .bind(ids.clone()),
            VehicleScope::AllActive => {
                sqlx::query_as::<_, VehicleRow>("SELECT * FROM travel_vehicles WHERE is_active ORDER BY created_at DESC")
            }
        };
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(TravelVehicle::from).collect())
    }

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>> {
        let mut seats = sqlx::query_as::<_, SeatRow>("SELECT * FROM travel_seats WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Seat::try_from)
            .collect::<CoreResult<Vec<_>>>()?;
        // Enum order, not the text order of the stored values.
        seats.sort_by_key(|s| (s.floor, s.side, s.number));
        Ok(seats)
    }

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>> {
        sqlx::query_as::<_, SeatRow>("SELECT * FROM travel_seats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Seat::try_from)
            .transpose()
    }

    async fn held_seats(&self, vehicle_id: Uuid, date: NaiveDate) -> CoreResult<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT seat_id FROM travel_bookings
            WHERE vehicle_id = $1 AND status IN ('pending', 'booked')
              AND (booking_date AT TIME ZONE 'UTC')::date = $2
            "#,
        )
        .bind(vehicle_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn commit_bookings(&self, bookings: &[TravelBooking]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for booking in bookings {
            let claimed = sqlx::query(
                "UPDATE travel_seats SET status = 'booked' WHERE id = $1 AND vehicle_id = $2 AND status = 'available'",
            )
            .bind(booking.seat_id)
            .bind(booking.vehicle_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if claimed.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(CoreError::Conflict("One or more selected seats are no longer available".into()));
            }

            sqlx::query(
                r#"
                INSERT INTO travel_bookings
                    (id, ticket_number, customer_id, name, phone, gender, nationality, remarks,
                     agent_id, booked_by, vehicle_id, seat_id, status, booking_date, boarding_date,
                     boarding_place, actual_price, system_commission, dealer_commission, agent_commission, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
                "#,
            )
            .bind(booking.id)
            .bind(&booking.ticket_number)
            .bind(booking.customer_id)
            .bind(&booking.passenger.name)
            .bind(&booking.passenger.phone)
            .bind(to_text(&booking.passenger.gender))
            .bind(&booking.passenger.nationality)
            .bind(&booking.remarks)
            .bind(booking.agent_id)
            .bind(booking.booked_by)
            .bind(booking.vehicle_id)
            .bind(booking.seat_id)
            .bind(to_text(&booking.status))
            .bind(booking.booking_date)
            .bind(booking.boarding_date)
            .bind(booking.boarding_place)
            .bind(booking.actual_price)
            .bind(booking.commissions.system)
            .bind(booking.commissions.dealer)
            .bind(booking.commissions.agent)
            .bind(booking.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<TravelBooking>> {
        sqlx::query_as::<_, BookingRow>("SELECT * FROM travel_bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(TravelBooking::try_from)
            .transpose()
    }

    async fn find_ticket(&self, committee_id: Uuid, ticket_number: &str) -> CoreResult<Option<TravelBooking>> {
        sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.* FROM travel_bookings b
            JOIN travel_vehicles v ON v.id = b.vehicle_id
            WHERE b.ticket_number = $1 AND v.committee_id = $2
            "#,
        )
        .bind(ticket_number)
        .bind(committee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(TravelBooking::try_from)
        .transpose()
    }

    async fn list_bookings(&self, scope: BookingScope, status: Option<BookingStatus>) -> CoreResult<Vec<TravelBooking>> {
        let (filter, id) = match scope {
            BookingScope::Committee(id) => (
                "b.vehicle_id IN (SELECT id FROM travel_vehicles WHERE committee_id = $1)",
                id,
            ),
            BookingScope::Dealer(id) => ("b.agent_id IN (SELECT id FROM travel_agents WHERE dealer_id = $1)", id),
            BookingScope::Agent(id) => ("b.agent_id = $1", id),
            BookingScope::Customer(id) => ("b.customer_id = $1", id),
        };
        let sql = format!(
            "SELECT b.* FROM travel_bookings b WHERE {} AND ($2::text IS NULL OR b.status = $2) ORDER BY b.created_at DESC",
            filter
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(status.map(|s| s.to_string()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        bookings(rows)
    }

    async fn boarding_queue(&self, committee_id: Uuid) -> CoreResult<Vec<TravelBooking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.* FROM travel_bookings b
            JOIN travel_vehicles v ON v.id = b.vehicle_id
            WHERE v.committee_id = $1 AND b.status = 'booked'
            ORDER BY b.booking_date
            "#,
        )
        .bind(committee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        bookings(rows)
    }

    async fn board_passenger(
        &self,
        booking_id: Uuid,
        boarded_at: DateTime<Utc>,
        credits: &[Credit],
    ) -> CoreResult<BoardingOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut booking = sqlx::query_as::<_, BookingRow>("SELECT * FROM travel_bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))
            .and_then(TravelBooking::try_from)?;
        if booking.status != BookingStatus::Booked {
            return Err(CoreError::Conflict(format!("Booking status is {}, expected booked", booking.status)));
        }

        let transactions = if ledger::has_completed(&mut tx, Reference::travel_booking(booking_id)).await? {
            Vec::new()
        } else {
            ledger::apply_credits(&mut tx, credits, boarded_at).await?
        };

        sqlx::query("UPDATE travel_bookings SET status = 'boarded', boarding_date = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(boarded_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE travel_seats SET status = 'boarded' WHERE id = $1")
            .bind(booking.seat_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        booking.status = BookingStatus::Boarded;
        booking.boarding_date = Some(boarded_at);
        Ok(BoardingOutcome { booking, transactions })
    }

    async fn reset_booked_seats(&self, vehicle_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query("UPDATE travel_seats SET status = 'available' WHERE vehicle_id = $1 AND status = 'booked'")
            .bind(vehicle_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

//! `PostgreSQL` registration store.
//!
//! Runtime `sqlx` queries over the schema migrated by `hub-postgres`. Money
//! columns are `BIGINT` cents and counts are `INT`.

use super::{RegistrationStore, RegistrationTx};
use crate::error::{RegistrationError, Result};
use crate::types::{
    AttendeeId, CheckoutAttendee, CheckoutId, Company, CompanyId, CreditMemo, Employee,
    EmployeeId, Enrollment, Event, EventCheckout, EventDiscount, EventId, EventSession,
    EventVoucher, Invoice, PaymentProfile, PaymentRecord, SessionId, Timezone, Venue,
    WaitlistEntry, WaitlistEntryId,
};
use chrono::{DateTime, Utc};
use hub_core::Money;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn cents(money: Money) -> i64 {
    i64::try_from(money.cents()).unwrap_or(i64::MAX)
}

fn money(cents: i64) -> Money {
    Money::from_cents(u64::try_from(cents).unwrap_or(0))
}

fn db(context: &'static str) -> impl FnOnce(sqlx::Error) -> RegistrationError {
    move |e| RegistrationError::Database(format!("Failed to {context}: {e}"))
}

// ============================================================================
// Row mapping
// ============================================================================

const EMPLOYEE_SELECT: &str = "SELECT e.id, e.company_id, e.first_name, e.last_name, e.work_email,
        r.internal_name AS role
     FROM employees e
     LEFT JOIN business_roles r ON r.id = e.business_role_id";

fn employee_from_row(row: &PgRow) -> std::result::Result<Employee, sqlx::Error> {
    Ok(Employee {
        id: EmployeeId::from_uuid(row.try_get("id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        work_email: row.try_get("work_email")?,
        role: row.try_get("role")?,
    })
}

const SESSION_SELECT: &str = "SELECT s.id, s.event_id, s.name, s.start_date, s.end_date,
        s.max_enrollments, s.notes, s.virtual_link, s.is_published, s.is_virtual_only,
        v.id AS venue_id, v.name AS venue_name, v.address AS venue_address,
        v.city AS venue_city, v.state AS venue_state, v.postal_code AS venue_postal_code,
        t.identifier AS tz_identifier, t.short_name AS tz_short_name
     FROM event_sessions s
     LEFT JOIN event_venues v ON v.id = s.venue_id
     LEFT JOIN timezones t ON t.id = s.timezone_id";

fn session_from_row(row: &PgRow) -> std::result::Result<EventSession, sqlx::Error> {
    let venue = match row.try_get::<Option<Uuid>, _>("venue_id")? {
        Some(id) => Some(Venue {
            id: id.into(),
            name: row.try_get("venue_name")?,
            address: row.try_get("venue_address")?,
            city: row.try_get("venue_city")?,
            state: row.try_get("venue_state")?,
            postal_code: row.try_get("venue_postal_code")?,
        }),
        None => None,
    };
    let timezone = match row.try_get::<Option<String>, _>("tz_identifier")? {
        Some(identifier) => Some(Timezone {
            identifier,
            short_name: row.try_get("tz_short_name")?,
        }),
        None => None,
    };

    Ok(EventSession {
        id: SessionId::from_uuid(row.try_get("id")?),
        event_id: EventId::from_uuid(row.try_get("event_id")?),
        name: row.try_get("name")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        max_enrollments: to_u32(row.try_get("max_enrollments")?),
        notes: row.try_get("notes")?,
        virtual_link: row.try_get("virtual_link")?,
        is_published: row.try_get("is_published")?,
        is_virtual_only: row.try_get("is_virtual_only")?,
        venue,
        timezone,
    })
}

const CHECKOUT_SELECT: &str = "SELECT id, event_session_id, company_id, created_by_id, status,
        contact_name, contact_email, contact_phone, group_notes, reservation_expires_at,
        confirmation_number, amount_cents, finalized_at, authnet_customer_profile_id,
        authnet_payment_profile_id, card_last4, card_type, created_at, updated_at
     FROM event_checkouts";

fn checkout_from_row(row: &PgRow) -> Result<EventCheckout> {
    let status: String = row.try_get("status")?;
    Ok(EventCheckout {
        id: CheckoutId::from_uuid(row.try_get("id")?),
        session_id: SessionId::from_uuid(row.try_get("event_session_id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        created_by: EmployeeId::from_uuid(row.try_get("created_by_id")?),
        status: status.parse().map_err(RegistrationError::Database)?,
        contact_name: row.try_get("contact_name")?,
        contact_email: row.try_get("contact_email")?,
        contact_phone: row.try_get("contact_phone")?,
        group_notes: row.try_get("group_notes")?,
        reservation_expires_at: row.try_get("reservation_expires_at")?,
        confirmation_number: row.try_get("confirmation_number")?,
        amount: row.try_get::<Option<i64>, _>("amount_cents")?.map(money),
        finalized_at: row.try_get("finalized_at")?,
        customer_profile_id: row.try_get("authnet_customer_profile_id")?,
        payment_profile_id: row.try_get("authnet_payment_profile_id")?,
        card_last4: row.try_get("card_last4")?,
        card_type: row.try_get("card_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn attendee_from_row(row: &PgRow) -> std::result::Result<CheckoutAttendee, sqlx::Error> {
    Ok(CheckoutAttendee {
        id: AttendeeId::from_uuid(row.try_get("id")?),
        checkout_id: CheckoutId::from_uuid(row.try_get("event_checkout_id")?),
        position: to_u32(row.try_get("position")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        special_requests: row.try_get("special_requests")?,
        is_selected: row.try_get("is_selected")?,
        is_waitlist: row.try_get("is_waitlist")?,
    })
}

const ENROLLMENT_SELECT: &str = "SELECT id, event_checkout_id, event_session_id, employee_id,
        first_name, last_name, email, special_requests, enrolled_at
     FROM event_enrollments";

fn enrollment_from_row(row: &PgRow) -> std::result::Result<Enrollment, sqlx::Error> {
    Ok(Enrollment {
        id: row.try_get::<Uuid, _>("id")?.into(),
        checkout_id: row.try_get::<Option<Uuid>, _>("event_checkout_id")?.map(Into::into),
        session_id: row.try_get::<Uuid, _>("event_session_id")?.into(),
        employee_id: row.try_get::<Option<Uuid>, _>("employee_id")?.map(Into::into),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        special_requests: row.try_get("special_requests")?,
        enrolled_at: row.try_get("enrolled_at")?,
    })
}

const WAITLIST_SELECT: &str = "SELECT id, event_session_id, employee_id, original_checkout_id,
        first_name, last_name, email, special_requests, waitlisted_at, waitlist_position,
        seat_price_cents, promoted_at
     FROM event_enrollment_waitlist";

fn waitlist_from_row(row: &PgRow) -> std::result::Result<WaitlistEntry, sqlx::Error> {
    Ok(WaitlistEntry {
        id: row.try_get::<Uuid, _>("id")?.into(),
        session_id: row.try_get::<Uuid, _>("event_session_id")?.into(),
        employee_id: row.try_get::<Option<Uuid>, _>("employee_id")?.map(Into::into),
        original_checkout_id: row
            .try_get::<Option<Uuid>, _>("original_checkout_id")?
            .map(Into::into),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        special_requests: row.try_get("special_requests")?,
        waitlisted_at: row.try_get("waitlisted_at")?,
        position: to_u32(row.try_get("waitlist_position")?),
        seat_price: money(row.try_get("seat_price_cents")?),
        promoted_at: row.try_get("promoted_at")?,
    })
}

const DISCOUNT_SELECT: &str = "SELECT d.id, d.code, d.description, d.discount_type,
        d.discount_value, d.minimum_purchase_cents, d.maximum_uses, d.start_date,
        d.end_date, d.is_active,
        ARRAY(SELECT de.event_id FROM event_discount_events de
              WHERE de.event_discount_id = d.id) AS event_ids
     FROM event_discounts d";

fn discount_from_row(row: &PgRow) -> Result<EventDiscount> {
    let discount_type: String = row.try_get("discount_type")?;
    let event_ids: Vec<Uuid> = row.try_get("event_ids")?;
    Ok(EventDiscount {
        id: row.try_get::<Uuid, _>("id")?.into(),
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        discount_type: discount_type.parse().map_err(RegistrationError::Database)?,
        discount_value: row.try_get("discount_value")?,
        minimum_purchase: row
            .try_get::<Option<i64>, _>("minimum_purchase_cents")?
            .map(money),
        maximum_uses: row.try_get::<Option<i32>, _>("maximum_uses")?.map(to_u32),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        is_active: row.try_get("is_active")?,
        event_ids: event_ids.into_iter().map(EventId::from_uuid).collect(),
    })
}

fn payment_profile_from_row(row: &PgRow) -> std::result::Result<PaymentProfile, sqlx::Error> {
    Ok(PaymentProfile {
        id: row.try_get::<Uuid, _>("id")?.into(),
        employee_id: row.try_get::<Uuid, _>("employee_id")?.into(),
        customer_profile_id: row.try_get("authnet_customer_profile_id")?,
        payment_profile_id: row.try_get("authnet_payment_profile_id")?,
        card_last4: row.try_get("card_last4")?,
        card_type: row.try_get("card_type")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const PAYMENT_PROFILE_SELECT: &str = "SELECT id, employee_id, authnet_customer_profile_id,
        authnet_payment_profile_id, card_last4, card_type, updated_at
     FROM payment_profiles";

// ============================================================================
// Store
// ============================================================================

/// `PostgreSQL`-backed [`RegistrationStore`].
#[derive(Debug, Clone)]
pub struct PostgresRegistrationStore {
    pool: PgPool,
}

impl PostgresRegistrationStore {
    /// Wrap a migrated pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RegistrationStore for PostgresRegistrationStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let tx = self.pool.begin().await.map_err(db("begin transaction"))?;
        Ok(PostgresTx { tx })
    }

    async fn ping(&self) -> Result<()> {
        hub_postgres::ping(&self.pool)
            .await
            .map_err(|e| RegistrationError::Database(e.to_string()))
    }
}

/// Transaction over [`PostgresRegistrationStore`].
#[derive(Debug)]
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl RegistrationTx for PostgresTx {
    async fn find_company(&mut self, id: CompanyId) -> Result<Option<Company>> {
        let row = sqlx::query("SELECT id, company_name FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load company"))?;

        row.map(|row| -> Result<Company> {
            Ok(Company {
                id: CompanyId::from_uuid(row.try_get("id")?),
                name: row.try_get("company_name")?,
            })
        })
        .transpose()
    }

    async fn find_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        let row = sqlx::query(&format!("{EMPLOYEE_SELECT} WHERE e.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load employee"))?;
        Ok(row.map(|r| employee_from_row(&r)).transpose()?)
    }

    async fn find_employee_by_email(
        &mut self,
        company: CompanyId,
        email: &str,
    ) -> Result<Option<Employee>> {
        let row = sqlx::query(&format!(
            "{EMPLOYEE_SELECT} WHERE e.company_id = $1 AND lower(e.work_email) = lower($2)
             ORDER BY e.created_at LIMIT 1"
        ))
        .bind(company.as_uuid())
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load employee by email"))?;
        Ok(row.map(|r| employee_from_row(&r)).transpose()?)
    }

    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT id, event_name, event_price_cents, is_voucher_eligible, is_published
             FROM events WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load event"))?;

        row.map(|row| -> Result<Event> {
            Ok(Event {
                id: EventId::from_uuid(row.try_get("id")?),
                name: row.try_get("event_name")?,
                price: money(row.try_get("event_price_cents")?),
                is_voucher_eligible: row.try_get("is_voucher_eligible")?,
                is_published: row.try_get("is_published")?,
            })
        })
        .transpose()
    }

    async fn find_session(&mut self, id: SessionId) -> Result<Option<EventSession>> {
        let row = sqlx::query(&format!("{SESSION_SELECT} WHERE s.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load session"))?;
        Ok(row.map(|r| session_from_row(&r)).transpose()?)
    }

    async fn find_checkout(&mut self, id: CheckoutId) -> Result<Option<EventCheckout>> {
        let row = sqlx::query(&format!("{CHECKOUT_SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load checkout"))?;
        row.map(|r| checkout_from_row(&r)).transpose()
    }

    async fn find_in_progress_checkout(
        &mut self,
        employee: EmployeeId,
        session: SessionId,
        company: CompanyId,
    ) -> Result<Option<EventCheckout>> {
        let row = sqlx::query(&format!(
            "{CHECKOUT_SELECT}
             WHERE created_by_id = $1 AND event_session_id = $2 AND company_id = $3
               AND status = 'in_progress'"
        ))
        .bind(employee.as_uuid())
        .bind(session.as_uuid())
        .bind(company.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load in-progress checkout"))?;
        row.map(|r| checkout_from_row(&r)).transpose()
    }

    async fn find_checkout_by_confirmation_number(
        &mut self,
        confirmation_number: &str,
    ) -> Result<Option<EventCheckout>> {
        let row = sqlx::query(&format!("{CHECKOUT_SELECT} WHERE confirmation_number = $1"))
            .bind(confirmation_number)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load checkout by confirmation number"))?;
        row.map(|r| checkout_from_row(&r)).transpose()
    }

    async fn insert_checkout(&mut self, checkout: &EventCheckout) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_checkouts
                (id, event_session_id, company_id, created_by_id, status, contact_name,
                 contact_email, contact_phone, group_notes, reservation_expires_at,
                 confirmation_number, amount_cents, finalized_at, authnet_customer_profile_id,
                 authnet_payment_profile_id, card_last4, card_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     $17, $18, $19)",
        )
        .bind(checkout.id.as_uuid())
        .bind(checkout.session_id.as_uuid())
        .bind(checkout.company_id.as_uuid())
        .bind(checkout.created_by.as_uuid())
        .bind(checkout.status.as_str())
        .bind(&checkout.contact_name)
        .bind(&checkout.contact_email)
        .bind(&checkout.contact_phone)
        .bind(&checkout.group_notes)
        .bind(checkout.reservation_expires_at)
        .bind(&checkout.confirmation_number)
        .bind(checkout.amount.map(cents))
        .bind(checkout.finalized_at)
        .bind(&checkout.customer_profile_id)
        .bind(&checkout.payment_profile_id)
        .bind(&checkout.card_last4)
        .bind(&checkout.card_type)
        .bind(checkout.created_at)
        .bind(checkout.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert checkout"))?;
        Ok(())
    }

    async fn update_checkout(&mut self, checkout: &EventCheckout) -> Result<()> {
        sqlx::query(
            "UPDATE event_checkouts SET
                status = $2, contact_name = $3, contact_email = $4, contact_phone = $5,
                group_notes = $6, reservation_expires_at = $7, confirmation_number = $8,
                amount_cents = $9, finalized_at = $10, authnet_customer_profile_id = $11,
                authnet_payment_profile_id = $12, card_last4 = $13, card_type = $14,
                updated_at = $15
             WHERE id = $1",
        )
        .bind(checkout.id.as_uuid())
        .bind(checkout.status.as_str())
        .bind(&checkout.contact_name)
        .bind(&checkout.contact_email)
        .bind(&checkout.contact_phone)
        .bind(&checkout.group_notes)
        .bind(checkout.reservation_expires_at)
        .bind(&checkout.confirmation_number)
        .bind(checkout.amount.map(cents))
        .bind(checkout.finalized_at)
        .bind(&checkout.customer_profile_id)
        .bind(&checkout.payment_profile_id)
        .bind(&checkout.card_last4)
        .bind(&checkout.card_type)
        .bind(checkout.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update checkout"))?;
        Ok(())
    }

    async fn list_attendees(&mut self, checkout: CheckoutId) -> Result<Vec<CheckoutAttendee>> {
        let rows = sqlx::query(
            "SELECT id, event_checkout_id, position, first_name, last_name, email,
                    special_requests, is_selected, is_waitlist
             FROM event_checkout_attendees
             WHERE event_checkout_id = $1
             ORDER BY position, created_at",
        )
        .bind(checkout.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("list attendees"))?;

        Ok(rows
            .iter()
            .map(attendee_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn insert_attendee(&mut self, attendee: &CheckoutAttendee) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_checkout_attendees
                (id, event_checkout_id, position, first_name, last_name, email,
                 special_requests, is_selected, is_waitlist)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(attendee.id.as_uuid())
        .bind(attendee.checkout_id.as_uuid())
        .bind(to_i32(attendee.position))
        .bind(&attendee.first_name)
        .bind(&attendee.last_name)
        .bind(&attendee.email)
        .bind(&attendee.special_requests)
        .bind(attendee.is_selected)
        .bind(attendee.is_waitlist)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert attendee"))?;
        Ok(())
    }

    async fn update_attendee(&mut self, attendee: &CheckoutAttendee) -> Result<()> {
        sqlx::query(
            "UPDATE event_checkout_attendees SET
                position = $2, first_name = $3, last_name = $4, email = $5,
                special_requests = $6, is_selected = $7, is_waitlist = $8
             WHERE id = $1",
        )
        .bind(attendee.id.as_uuid())
        .bind(to_i32(attendee.position))
        .bind(&attendee.first_name)
        .bind(&attendee.last_name)
        .bind(&attendee.email)
        .bind(&attendee.special_requests)
        .bind(attendee.is_selected)
        .bind(attendee.is_waitlist)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update attendee"))?;
        Ok(())
    }

    async fn delete_attendee(&mut self, id: AttendeeId) -> Result<()> {
        sqlx::query("DELETE FROM event_checkout_attendees WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db("delete attendee"))?;
        Ok(())
    }

    async fn count_held_seats(
        &mut self,
        session: SessionId,
        exclude: Option<CheckoutId>,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM event_checkout_attendees a
             JOIN event_checkouts c ON c.id = a.event_checkout_id
             WHERE c.event_session_id = $1
               AND c.status = 'in_progress'
               AND c.reservation_expires_at > $2
               AND a.is_selected AND NOT a.is_waitlist
               AND ($3::uuid IS NULL OR c.id <> $3)",
        )
        .bind(session.as_uuid())
        .bind(now)
        .bind(exclude.map(|id| *id.as_uuid()))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("count held seats"))?;
        Ok(count(held))
    }

    async fn count_enrollments(&mut self, session: SessionId) -> Result<u32> {
        let enrolled: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_enrollments WHERE event_session_id = $1")
                .bind(session.as_uuid())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db("count enrollments"))?;
        Ok(count(enrolled))
    }

    async fn find_enrollment_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "{ENROLLMENT_SELECT} WHERE event_session_id = $1 AND employee_id = $2 LIMIT 1"
        ))
        .bind(session.as_uuid())
        .bind(employee.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load enrollment"))?;
        Ok(row.map(|r| enrollment_from_row(&r)).transpose()?)
    }

    async fn find_enrollment_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "{ENROLLMENT_SELECT} WHERE event_session_id = $1 AND lower(email) = lower($2) LIMIT 1"
        ))
        .bind(session.as_uuid())
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load enrollment by email"))?;
        Ok(row.map(|r| enrollment_from_row(&r)).transpose()?)
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_enrollments
                (id, event_checkout_id, event_session_id, employee_id, first_name, last_name,
                 email, special_requests, enrolled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(enrollment.id.as_uuid())
        .bind(enrollment.checkout_id.map(|id| *id.as_uuid()))
        .bind(enrollment.session_id.as_uuid())
        .bind(enrollment.employee_id.map(|id| *id.as_uuid()))
        .bind(&enrollment.first_name)
        .bind(&enrollment.last_name)
        .bind(&enrollment.email)
        .bind(&enrollment.special_requests)
        .bind(enrollment.enrolled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert enrollment"))?;
        Ok(())
    }

    async fn find_waitlist_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> Result<Option<WaitlistEntry>> {
        let row = sqlx::query(&format!(
            "{WAITLIST_SELECT}
             WHERE event_session_id = $1 AND employee_id = $2 AND promoted_at IS NULL
             LIMIT 1"
        ))
        .bind(session.as_uuid())
        .bind(employee.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load waitlist entry"))?;
        Ok(row.map(|r| waitlist_from_row(&r)).transpose()?)
    }

    async fn find_waitlist_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> Result<Option<WaitlistEntry>> {
        let row = sqlx::query(&format!(
            "{WAITLIST_SELECT}
             WHERE event_session_id = $1 AND lower(email) = lower($2) AND promoted_at IS NULL
             LIMIT 1"
        ))
        .bind(session.as_uuid())
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load waitlist entry by email"))?;
        Ok(row.map(|r| waitlist_from_row(&r)).transpose()?)
    }

    async fn max_waitlist_position(&mut self, session: SessionId) -> Result<Option<u32>> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(waitlist_position) FROM event_enrollment_waitlist
             WHERE event_session_id = $1",
        )
        .bind(session.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("read max waitlist position"))?;
        Ok(max.map(to_u32))
    }

    async fn list_waitlist(&mut self, session: SessionId) -> Result<Vec<WaitlistEntry>> {
        let rows = sqlx::query(&format!(
            "{WAITLIST_SELECT} WHERE event_session_id = $1 ORDER BY waitlist_position"
        ))
        .bind(session.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("list waitlist"))?;

        Ok(rows
            .iter()
            .map(waitlist_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }

    async fn find_waitlist_entry(&mut self, id: WaitlistEntryId) -> Result<Option<WaitlistEntry>> {
        let row = sqlx::query(&format!("{WAITLIST_SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load waitlist entry"))?;
        Ok(row.map(|r| waitlist_from_row(&r)).transpose()?)
    }

    async fn insert_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_enrollment_waitlist
                (id, event_session_id, employee_id, original_checkout_id, first_name, last_name,
                 email, special_requests, waitlisted_at, waitlist_position, seat_price_cents,
                 promoted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.session_id.as_uuid())
        .bind(entry.employee_id.map(|id| *id.as_uuid()))
        .bind(entry.original_checkout_id.map(|id| *id.as_uuid()))
        .bind(&entry.first_name)
        .bind(&entry.last_name)
        .bind(&entry.email)
        .bind(&entry.special_requests)
        .bind(entry.waitlisted_at)
        .bind(to_i32(entry.position))
        .bind(cents(entry.seat_price))
        .bind(entry.promoted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert waitlist entry"))?;
        Ok(())
    }

    async fn update_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<()> {
        sqlx::query(
            "UPDATE event_enrollment_waitlist SET
                employee_id = $2, first_name = $3, last_name = $4, email = $5,
                special_requests = $6, waitlist_position = $7, seat_price_cents = $8,
                promoted_at = $9
             WHERE id = $1",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.employee_id.map(|id| *id.as_uuid()))
        .bind(&entry.first_name)
        .bind(&entry.last_name)
        .bind(&entry.email)
        .bind(&entry.special_requests)
        .bind(to_i32(entry.position))
        .bind(cents(entry.seat_price))
        .bind(entry.promoted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update waitlist entry"))?;
        Ok(())
    }

    async fn find_discount_by_code(&mut self, code: &str) -> Result<Option<EventDiscount>> {
        let row = sqlx::query(&format!("{DISCOUNT_SELECT} WHERE d.code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load discount"))?;
        row.map(|r| discount_from_row(&r)).transpose()
    }

    async fn list_active_discounts(&mut self) -> Result<Vec<EventDiscount>> {
        let rows = sqlx::query(&format!("{DISCOUNT_SELECT} WHERE d.is_active ORDER BY d.code"))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db("list discounts"))?;
        rows.iter().map(discount_from_row).collect()
    }

    async fn count_discount_uses(&mut self, code: &str) -> Result<u32> {
        let uses: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoice_line_items WHERE discount_code = $1")
                .bind(code)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db("count discount uses"))?;
        Ok(count(uses))
    }

    async fn list_active_vouchers(
        &mut self,
        company: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventVoucher>> {
        let rows = sqlx::query(
            "SELECT id, company_id, name, total_seats, start_date, end_date, is_active
             FROM event_vouchers
             WHERE company_id = $1 AND is_active
               AND (start_date IS NULL OR start_date <= $2)
               AND (end_date IS NULL OR end_date >= $2)
             ORDER BY created_at",
        )
        .bind(company.as_uuid())
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("list vouchers"))?;

        rows.iter()
            .map(|row| -> Result<EventVoucher> {
                Ok(EventVoucher {
                    id: row.try_get::<Uuid, _>("id")?.into(),
                    company_id: row.try_get::<Uuid, _>("company_id")?.into(),
                    name: row.try_get("name")?,
                    total_seats: to_u32(row.try_get("total_seats")?),
                    start_date: row.try_get("start_date")?,
                    end_date: row.try_get("end_date")?,
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }

    async fn count_voucher_seats_used(&mut self, company: CompanyId) -> Result<u32> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM credit_memo_line_items l
             JOIN credit_memos m ON m.id = l.credit_memo_id
             WHERE m.company_id = $1 AND m.credit_type = 'voucher'",
        )
        .bind(company.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("count voucher seats"))?;
        Ok(count(used))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            "INSERT INTO invoices
                (id, invoice_number, company_id, event_session_id, invoice_date, status,
                 total_amount_cents, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(invoice.id.as_uuid())
        .bind(&invoice.invoice_number)
        .bind(invoice.company_id.as_uuid())
        .bind(invoice.session_id.map(|id| *id.as_uuid()))
        .bind(invoice.invoice_date)
        .bind(invoice.status.as_str())
        .bind(cents(invoice.total_amount))
        .bind(&invoice.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert invoice"))?;

        for (sort_order, line) in (0_i32..).zip(&invoice.line_items) {
            sqlx::query(
                "INSERT INTO invoice_line_items
                    (id, invoice_id, sort_order, kind, description, quantity,
                     unit_price_cents, line_total_cents, discount_code)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(Uuid::new_v4())
            .bind(invoice.id.as_uuid())
            .bind(sort_order)
            .bind(line.kind.as_str())
            .bind(&line.description)
            .bind(to_i32(line.quantity))
            .bind(cents(line.unit_price))
            .bind(line.signed_total_cents())
            .bind(&line.discount_code)
            .execute(&mut *self.tx)
            .await
            .map_err(db("insert invoice line item"))?;
        }
        Ok(())
    }

    async fn insert_credit_memo(&mut self, memo: &CreditMemo) -> Result<()> {
        sqlx::query(
            "INSERT INTO credit_memos
                (id, invoice_id, company_id, memo_date, credit_type, total_amount_cents, reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(memo.id.as_uuid())
        .bind(memo.invoice_id.as_uuid())
        .bind(memo.company_id.as_uuid())
        .bind(memo.memo_date)
        .bind(memo.credit_type.as_str())
        .bind(cents(memo.total_amount))
        .bind(&memo.reason)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert credit memo"))?;

        for line in &memo.line_items {
            sqlx::query(
                "INSERT INTO credit_memo_line_items (id, credit_memo_id, description, amount_cents)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(memo.id.as_uuid())
            .bind(&line.description)
            .bind(cents(line.amount))
            .execute(&mut *self.tx)
            .await
            .map_err(db("insert credit memo line item"))?;
        }
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments
                (id, invoice_id, transaction_id, amount_cents, response_code, auth_code,
                 card_last4, card_type, customer_profile_id, payment_profile_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.invoice_id.as_uuid())
        .bind(&payment.transaction_id)
        .bind(cents(payment.amount))
        .bind(&payment.response_code)
        .bind(&payment.auth_code)
        .bind(&payment.card_last4)
        .bind(&payment.card_type)
        .bind(&payment.customer_profile_id)
        .bind(&payment.payment_profile_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert payment"))?;
        Ok(())
    }

    async fn find_payment_profile(
        &mut self,
        employee: EmployeeId,
        customer_profile_id: &str,
        payment_profile_id: &str,
    ) -> Result<Option<PaymentProfile>> {
        let row = sqlx::query(&format!(
            "{PAYMENT_PROFILE_SELECT}
             WHERE employee_id = $1 AND authnet_customer_profile_id = $2
               AND authnet_payment_profile_id = $3"
        ))
        .bind(employee.as_uuid())
        .bind(customer_profile_id)
        .bind(payment_profile_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load payment profile"))?;
        Ok(row.map(|r| payment_profile_from_row(&r)).transpose()?)
    }

    async fn find_latest_payment_profile(
        &mut self,
        employee: EmployeeId,
    ) -> Result<Option<PaymentProfile>> {
        let row = sqlx::query(&format!(
            "{PAYMENT_PROFILE_SELECT} WHERE employee_id = $1 ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(employee.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load latest payment profile"))?;
        Ok(row.map(|r| payment_profile_from_row(&r)).transpose()?)
    }

    async fn insert_payment_profile(&mut self, profile: &PaymentProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO payment_profiles
                (id, employee_id, authnet_customer_profile_id, authnet_payment_profile_id,
                 card_last4, card_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
        )
        .bind(profile.id.as_uuid())
        .bind(profile.employee_id.as_uuid())
        .bind(&profile.customer_profile_id)
        .bind(&profile.payment_profile_id)
        .bind(&profile.card_last4)
        .bind(&profile.card_type)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert payment profile"))?;
        Ok(())
    }

    async fn update_payment_profile(&mut self, profile: &PaymentProfile) -> Result<()> {
        sqlx::query(
            "UPDATE payment_profiles SET card_last4 = $2, card_type = $3, updated_at = $4
             WHERE id = $1",
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.card_last4)
        .bind(&profile.card_type)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update payment profile"))?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(db("commit transaction"))
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(db("roll back transaction"))
    }
}

//! HTTP API integration tests.
//!
//! Drives the real router over the in-memory store with `axum-test`, checking
//! routing, the acting-employee headers, JSON field names and the status
//! codes errors map to.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use event_registration::app::{RegistrationEnvironment, RegistrationService};
use event_registration::payment_gateway::MockPaymentGateway;
use event_registration::server::{AppState, build_router};
use event_registration::store::InMemoryRegistrationStore;
use event_registration::types::{
    Company, CompanyId, Employee, EmployeeId, Event, EventId, EventSession, SessionId,
};
use hub_core::{Clock, Money};
use hub_testing::test_clock;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

const EMPLOYEE: HeaderName = HeaderName::from_static("x-employee-id");
const COMPANY: HeaderName = HeaderName::from_static("x-company-id");

struct Api {
    server: TestServer,
    employee: EmployeeId,
    company: CompanyId,
    session: SessionId,
}

impl Api {
    async fn new() -> Self {
        let store = InMemoryRegistrationStore::new();
        let clock = test_clock();
        let now = clock.now();

        let company = CompanyId::new();
        store
            .seed_company(Company {
                id: company,
                name: "Acme HVAC".to_string(),
            })
            .await;
        let employee = EmployeeId::new();
        store
            .seed_employee(Employee {
                id: employee,
                company_id: company,
                first_name: "Dana".to_string(),
                last_name: "Reyes".to_string(),
                work_email: Some("dana@acme.test".to_string()),
                role: None,
            })
            .await;
        let event = EventId::new();
        store
            .seed_event(Event {
                id: event,
                name: "Service Bootcamp".to_string(),
                price: Money::from_dollars(50),
                is_voucher_eligible: false,
                is_published: true,
            })
            .await;
        let session = SessionId::new();
        store
            .seed_session(EventSession {
                id: session,
                event_id: event,
                name: Some("Spring cohort".to_string()),
                start_date: now + chrono::Duration::days(7),
                end_date: now + chrono::Duration::days(8),
                max_enrollments: 1,
                notes: None,
                virtual_link: None,
                is_published: true,
                is_virtual_only: true,
                venue: None,
                timezone: None,
            })
            .await;

        let env = RegistrationEnvironment::new(Arc::new(clock), MockPaymentGateway::shared());
        let service = RegistrationService::new(store, env);
        let server = TestServer::new(build_router(AppState::new(service)))
            .expect("test server should start");

        Self {
            server,
            employee,
            company,
            session,
        }
    }

    fn header(id: impl ToString) -> HeaderValue {
        HeaderValue::from_str(&id.to_string()).unwrap()
    }

    async fn start(&self) -> Value {
        let response = self
            .server
            .post(&format!("/api/event-sessions/{}/checkout", self.session))
            .add_header(EMPLOYEE, Self::header(self.employee))
            .add_header(COMPANY, Self::header(self.company))
            .await;
        response.assert_status_ok();
        response.json()
    }

    async fn put_attendees(&self, checkout: &str, attendees: Value) -> axum_test::TestResponse {
        self.server
            .put(&format!("/api/event-checkout-sessions/{checkout}"))
            .add_header(EMPLOYEE, Self::header(self.employee))
            .add_header(COMPANY, Self::header(self.company))
            .json(&json!({ "contactName": "Dana Reyes", "attendees": attendees }))
            .await
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let api = Api::new().await;

    let health = api.server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = api.server.get("/ready").await;
    ready.assert_status_ok();
    let body: Value = ready.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["components"][0]["component"], "database");
}

#[tokio::test]
async fn test_missing_actor_headers_are_unauthorized() {
    let api = Api::new().await;

    let response = api
        .server
        .post(&format!("/api/event-sessions/{}/checkout", api.session))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_checkout_round_trip_uses_camel_case() {
    let api = Api::new().await;
    let started = api.start().await;
    let checkout = started["id"].as_str().unwrap().to_string();
    assert_eq!(started["status"], "in_progress");
    assert_eq!(started["eventSessionId"], api.session.to_string());

    let updated = api
        .put_attendees(
            &checkout,
            json!([
                {"firstName": "Dana", "lastName": "Reyes", "email": "dana@acme.test"},
                {"firstName": "Lee", "lastName": "Park", "email": "lee@acme.test"}
            ]),
        )
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["attendees"][0]["isWaitlist"], false);
    assert_eq!(body["attendees"][1]["isWaitlist"], true);
    assert!(body["reservationExpiresAt"].is_string());

    let details = api
        .server
        .get(&format!("/api/event-checkout-sessions/{checkout}"))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .await;
    details.assert_status_ok();
    let body: Value = details.json();
    assert_eq!(body["event"]["name"], "Service Bootcamp");
    assert_eq!(body["availableSeats"], 1);
    assert_eq!(body["occupiedAttendeeSeatsByCurrentUser"], 1);
    assert!(body["companyAvailableVoucherSeats"].is_null());
}

#[tokio::test]
async fn test_payment_and_waitlist_listing() {
    let api = Api::new().await;
    let checkout = api.start().await["id"].as_str().unwrap().to_string();
    api.put_attendees(
        &checkout,
        json!([
            {"firstName": "Dana", "lastName": "Reyes", "email": "dana@acme.test"},
            {"firstName": "Lee", "lastName": "Park", "email": "lee@acme.test"}
        ]),
    )
    .await
    .assert_status_ok();

    let paid = api
        .server
        .post(&format!("/api/event-checkout-sessions/{checkout}/payment"))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .json(&json!({
            "dataDescriptor": "COMMON.ACCEPT.INAPP.PAYMENT",
            "dataValue": "opaque-card-token",
            "amount": 50.0,
            "invoiceNumber": "INV-2001"
        }))
        .await;
    paid.assert_status_ok();
    let receipt: Value = paid.json();
    assert_eq!(receipt["status"], "completed");
    assert_eq!(receipt["seatsEnrolled"], 1);
    assert_eq!(receipt["attendeesWaitlisted"], 1);

    let waitlist = api
        .server
        .get(&format!("/api/event-sessions/{}/waitlist", api.session))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .await;
    waitlist.assert_status_ok();
    let entries: Value = waitlist.json();
    assert_eq!(entries.as_array().map(Vec::len), Some(1));
    assert_eq!(entries[0]["email"], "lee@acme.test");
    assert_eq!(entries[0]["waitlistPosition"], 1);

    // Promotion is admin-only
    let entry = entries[0]["id"].as_str().unwrap();
    let promote = api
        .server
        .post(&format!("/api/waitlist/{entry}/promote"))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .await;
    promote.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        promote.json::<Value>()["code"],
        "NO_PERMISSION_TO_MANAGE_WAITLIST"
    );
}

#[tokio::test]
async fn test_error_statuses() {
    let api = Api::new().await;
    let checkout = api.start().await["id"].as_str().unwrap().to_string();

    let unknown = api
        .server
        .get(&format!("/api/event-checkout-sessions/{}", Uuid::new_v4()))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .await;
    unknown.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(unknown.json::<Value>()["code"], "CHECKOUT_NOT_FOUND");

    let duplicate = api
        .put_attendees(
            &checkout,
            json!([
                {"firstName": "Dana", "lastName": "Reyes", "email": "dana@acme.test"},
                {"firstName": "Dana", "lastName": "Reyes", "email": "dana@acme.test"}
            ]),
        )
        .await;
    duplicate.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = duplicate.json();
    assert_eq!(body["code"], "DUPLICATE_ATTENDEE_EMAIL");
    assert_eq!(
        body["message"],
        "Attendee email dana@acme.test appears more than once."
    );

    let mismatch = api
        .server
        .post(&format!("/api/event-checkout-sessions/{checkout}/payment"))
        .add_header(EMPLOYEE, Api::header(api.employee))
        .add_header(COMPANY, Api::header(api.company))
        .json(&json!({ "amount": 12.34 }))
        .await;
    mismatch.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(mismatch.json::<Value>()["code"], "PAYMENT_AMOUNT_MISMATCH");
}

//! End-to-end checkout flows against the in-memory store and mock gateway.
//!
//! Covers seating and waitlisting, reservation holds, pricing with vouchers
//! and discount codes, transactional payment capture and waitlist promotion.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::too_many_lines)]

use chrono::Duration;
use event_registration::app::{
    Actor, AttendeeInput, ProcessPaymentRequest, RegistrationEnvironment, RegistrationService,
    UpdateCheckoutRequest,
};
use event_registration::config::CheckoutConfig;
use event_registration::error::RegistrationError;
use event_registration::payment_gateway::{MockPaymentGateway, PaymentGateway};
use event_registration::store::InMemoryRegistrationStore;
use event_registration::types::{
    CheckoutId, CheckoutStatus, Company, CompanyId, CreditType, DiscountId, DiscountType,
    Employee, EmployeeId, Enrollment, EnrollmentId, Event, EventDiscount, EventId, EventSession,
    EventVoucher, LineItemKind, ROLE_ADMIN, ROLE_SUPER_ADMIN, SessionId, VoucherId,
};
use hub_core::lock::{LockError, NamedLocks};
use hub_core::{Clock, Money};
use hub_testing::ManualClock;
use std::sync::Arc;

struct Fixture {
    store: InMemoryRegistrationStore,
    gateway: Arc<MockPaymentGateway>,
    clock: ManualClock,
    service: RegistrationService<InMemoryRegistrationStore>,
    locks: Arc<NamedLocks>,
    company: CompanyId,
    buyer: Employee,
    event: Event,
    session: EventSession,
}

impl Fixture {
    async fn new(capacity: u32) -> Self {
        Self::with_gateway(capacity, MockPaymentGateway::new()).await
    }

    async fn with_gateway(capacity: u32, gateway: MockPaymentGateway) -> Self {
        let store = InMemoryRegistrationStore::new();
        let gateway = Arc::new(gateway);
        let clock = ManualClock::default();

        let company = CompanyId::new();
        store
            .seed_company(Company {
                id: company,
                name: "Acme HVAC".to_string(),
            })
            .await;

        let buyer = employee(company, "Dana", "dana@acme.test", None);
        store.seed_employee(buyer.clone()).await;

        let event = Event {
            id: EventId::new(),
            name: "Service Bootcamp".to_string(),
            price: Money::from_dollars(50),
            is_voucher_eligible: true,
            is_published: true,
        };
        store.seed_event(event.clone()).await;

        let now = clock.now();
        let session = EventSession {
            id: SessionId::new(),
            event_id: event.id,
            name: None,
            start_date: now + Duration::days(30),
            end_date: now + Duration::days(31),
            max_enrollments: capacity,
            notes: None,
            virtual_link: None,
            is_published: true,
            is_virtual_only: false,
            venue: None,
            timezone: None,
        };
        store.seed_session(session.clone()).await;

        let shared: Arc<dyn PaymentGateway> = gateway.clone();
        let locks = NamedLocks::shared();
        let env = RegistrationEnvironment::new(Arc::new(clock.clone()), shared)
            .with_locks(Arc::clone(&locks))
            .with_settings(CheckoutConfig {
                lock_timeout_secs: 1,
                ..CheckoutConfig::default()
            });
        let service = RegistrationService::new(store.clone(), env);

        Self {
            store,
            gateway,
            clock,
            service,
            locks,
            company,
            buyer,
            event,
            session,
        }
    }

    fn actor(&self) -> Actor {
        Actor {
            employee_id: self.buyer.id,
            company_id: self.company,
        }
    }

    async fn colleague(&self, first_name: &str, email: &str, role: Option<&str>) -> Employee {
        let colleague = employee(self.company, first_name, email, role);
        self.store.seed_employee(colleague.clone()).await;
        colleague
    }

    async fn cart_with(&self, actor: Actor, attendees: &[(&str, &str)]) -> CheckoutId {
        let view = self
            .service
            .start_checkout(actor, self.session.id)
            .await
            .expect("start checkout");
        self.service
            .update_checkout(actor, view.id, update(attendees))
            .await
            .expect("update checkout");
        view.id
    }

    fn session_lock(&self) -> String {
        format!("update_event_checkout_{}", self.session.id)
    }

    async fn take_seat(&self, name: &str) {
        self.store
            .seed_enrollment(Enrollment {
                id: EnrollmentId::new(),
                checkout_id: None,
                session_id: self.session.id,
                employee_id: None,
                first_name: name.to_string(),
                last_name: "Earlier".to_string(),
                email: Some(format!("{}@elsewhere.test", name.to_lowercase())),
                special_requests: None,
                enrolled_at: self.clock.now(),
            })
            .await;
    }
}

fn employee(company: CompanyId, first_name: &str, email: &str, role: Option<&str>) -> Employee {
    Employee {
        id: EmployeeId::new(),
        company_id: company,
        first_name: first_name.to_string(),
        last_name: "Reyes".to_string(),
        work_email: Some(email.to_string()),
        role: role.map(str::to_string),
    }
}

fn update(attendees: &[(&str, &str)]) -> UpdateCheckoutRequest {
    UpdateCheckoutRequest {
        contact_name: Some("Dana Reyes".to_string()),
        contact_email: Some("dana@acme.test".to_string()),
        contact_phone: None,
        group_notes: None,
        attendees: attendees
            .iter()
            .map(|(first_name, email)| AttendeeInput {
                id: None,
                first_name: (*first_name).to_string(),
                last_name: "Reyes".to_string(),
                email: Some((*email).to_string()),
                special_requests: None,
                is_selected: None,
            })
            .collect(),
    }
}

fn payment(amount: f64) -> ProcessPaymentRequest {
    ProcessPaymentRequest {
        data_descriptor: Some("COMMON.ACCEPT.INAPP.PAYMENT".to_string()),
        data_value: Some("opaque-card-token".to_string()),
        amount,
        invoice_number: Some("INV-1001".to_string()),
        ..ProcessPaymentRequest::default()
    }
}

// ============================================================================
// Seating
// ============================================================================

#[tokio::test]
async fn test_update_seats_in_order_and_waitlists_overflow() {
    let fx = Fixture::new(2).await;
    let view = fx.service.start_checkout(fx.actor(), fx.session.id).await.unwrap();

    let view = fx
        .service
        .update_checkout(
            fx.actor(),
            view.id,
            update(&[
                ("Dana", "dana@acme.test"),
                ("Lee", "lee@acme.test"),
                ("Sam", "sam@acme.test"),
            ]),
        )
        .await
        .unwrap();

    let waitlisted: Vec<bool> = view.attendees.iter().map(|a| a.is_waitlist).collect();
    assert_eq!(waitlisted, vec![false, false, true]);
    assert_eq!(
        view.reservation_expires_at,
        Some(fx.clock.now() + Duration::minutes(30))
    );
}

#[tokio::test]
async fn test_start_checkout_resumes_open_cart() {
    let fx = Fixture::new(5).await;
    let first = fx.service.start_checkout(fx.actor(), fx.session.id).await.unwrap();
    let second = fx.service.start_checkout(fx.actor(), fx.session.id).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, CheckoutStatus::InProgress);
}

#[tokio::test]
async fn test_live_holds_of_other_carts_count_until_they_expire() {
    let fx = Fixture::new(2).await;
    let colleague = fx.colleague("Kim", "kim@acme.test", None).await;
    let other = Actor {
        employee_id: colleague.id,
        company_id: fx.company,
    };
    fx.cart_with(other, &[("Kim", "kim@acme.test"), ("Ola", "ola@acme.test")])
        .await;

    let mine = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    let details = fx.service.checkout_details(fx.actor(), mine).await.unwrap();
    assert_eq!(details.available_seats, 0);
    assert!(details.checkout.attendees[0].is_waitlist);
    assert_eq!(details.checkout.reservation_expires_at, None);

    fx.clock.advance(Duration::minutes(31));
    let view = fx
        .service
        .update_checkout(fx.actor(), mine, update(&[("Dana", "dana@acme.test")]))
        .await
        .unwrap();
    assert!(!view.attendees[0].is_waitlist);
    assert!(view.reservation_expires_at.is_some());
}

#[tokio::test]
async fn test_duplicate_attendee_email_is_rejected() {
    let fx = Fixture::new(5).await;
    let view = fx.service.start_checkout(fx.actor(), fx.session.id).await.unwrap();

    let result = fx
        .service
        .update_checkout(
            fx.actor(),
            view.id,
            update(&[("Dana", "dana@acme.test"), ("Dana", " dana@acme.test ")]),
        )
        .await;

    assert!(matches!(
        result,
        Err(RegistrationError::DuplicateAttendeeEmail { ref email }) if email == "dana@acme.test"
    ));
}

#[tokio::test]
async fn test_cart_of_another_employee_reads_as_missing() {
    let fx = Fixture::new(5).await;
    let mine = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    let stranger = Actor {
        employee_id: EmployeeId::new(),
        company_id: fx.company,
    };

    let result = fx.service.checkout_details(stranger, mine).await;
    assert!(matches!(result, Err(RegistrationError::CheckoutNotFound(id)) if id == mine));
}

// ============================================================================
// Payment
// ============================================================================

#[tokio::test]
async fn test_payment_enrolls_invoices_and_completes() {
    let fx = Fixture::new(10).await;
    let checkout = fx
        .cart_with(fx.actor(), &[("Dana", "dana@acme.test"), ("Lee", "lee@acme.test")])
        .await;

    let receipt = fx
        .service
        .process_payment(fx.actor(), checkout, payment(100.0))
        .await
        .unwrap();

    assert_eq!(receipt.status, CheckoutStatus::Completed);
    assert!(receipt.confirmation_number.starts_with("CN-"));
    assert_eq!(receipt.confirmation_number.len(), 11);
    assert_eq!(receipt.invoice_number, "INV-1001");
    assert_eq!(receipt.seats_enrolled, 2);
    assert_eq!(receipt.attendees_waitlisted, 0);
    assert!(receipt.transaction_id.is_some());
    assert_eq!(fx.gateway.charge_count(), 1);

    let stored = fx.store.checkout(checkout).await.unwrap();
    assert_eq!(stored.status, CheckoutStatus::Completed);
    assert_eq!(stored.amount, Some(Money::from_dollars(100)));
    assert_eq!(stored.reservation_expires_at, None);
    assert_eq!(stored.card_last4.as_deref(), Some("XXXX1111"));

    let enrollments = fx.store.enrollments().await;
    assert_eq!(enrollments.len(), 2);
    assert_eq!(enrollments[0].employee_id, Some(fx.buyer.id));
    assert_eq!(enrollments[1].employee_id, None);

    let invoices = fx.store.invoices().await;
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].total_amount, Money::from_dollars(100));
    assert_eq!(fx.store.payments().await.len(), 1);
    assert_eq!(fx.store.payment_profiles().await.len(), 1);
}

#[tokio::test]
async fn test_vouchers_and_discount_code_stack() {
    let fx = Fixture::new(10).await;
    fx.store
        .seed_voucher(EventVoucher {
            id: VoucherId::new(),
            company_id: fx.company,
            name: "2025 training pack".to_string(),
            total_seats: 3,
            start_date: None,
            end_date: None,
            is_active: true,
        })
        .await;
    fx.store
        .seed_discount(EventDiscount {
            id: DiscountId::new(),
            code: "SPRING10".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 10.0,
            minimum_purchase: None,
            maximum_uses: None,
            start_date: None,
            end_date: None,
            is_active: true,
            event_ids: vec![],
        })
        .await;

    let checkout = fx
        .cart_with(fx.actor(), &[("Dana", "dana@acme.test"), ("Lee", "lee@acme.test")])
        .await;

    // 100.00 - 50.00 voucher - 10.00 code
    let request = ProcessPaymentRequest {
        voucher_quantity: Some(1),
        discount_code: Some("SPRING10".to_string()),
        ..payment(40.0)
    };
    let receipt = fx
        .service
        .process_payment(fx.actor(), checkout, request)
        .await
        .unwrap();
    assert!((receipt.total - 40.0).abs() < f64::EPSILON);

    let invoice = &fx.store.invoices().await[0];
    let kinds: Vec<LineItemKind> = invoice.line_items.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LineItemKind::EventSeat,
            LineItemKind::DiscountCode,
            LineItemKind::Voucher
        ]
    );
    let signed: i64 = invoice.line_items.iter().map(|l| l.signed_total_cents()).sum();
    assert_eq!(signed, 4000);

    let memos = fx.store.credit_memos().await;
    assert_eq!(memos.len(), 1);
    assert_eq!(memos[0].credit_type, CreditType::Voucher);
    assert_eq!(memos[0].line_items.len(), 1);
    assert_eq!(memos[0].total_amount, Money::from_dollars(50));
}

#[tokio::test]
async fn test_amount_mismatch_never_reaches_gateway() {
    let fx = Fixture::new(10).await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;

    let result = fx
        .service
        .process_payment(fx.actor(), checkout, payment(49.99))
        .await;

    assert!(matches!(
        result,
        Err(RegistrationError::PaymentAmountMismatch { expected, .. })
            if expected == Money::from_dollars(50)
    ));
    assert_eq!(fx.gateway.charge_count(), 0);
    assert!(fx.store.checkout(checkout).await.unwrap().is_in_progress());
}

#[tokio::test]
async fn test_admin_discount_requires_super_admin() {
    let fx = Fixture::new(10).await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;

    let request = ProcessPaymentRequest {
        admin_discount_type: Some(DiscountType::FixedAmount),
        admin_discount_value: Some(20.0),
        admin_discount_reason: Some("Loyalty".to_string()),
        ..payment(30.0)
    };
    let result = fx
        .service
        .process_payment(fx.actor(), checkout, request.clone())
        .await;
    assert!(matches!(
        result,
        Err(RegistrationError::NoPermissionToApplyAdminDiscount)
    ));

    let admin = fx
        .colleague("Ada", "ada@acme.test", Some(ROLE_SUPER_ADMIN))
        .await;
    let admin_actor = Actor {
        employee_id: admin.id,
        company_id: fx.company,
    };
    let admin_checkout = fx.cart_with(admin_actor, &[("Ada", "ada@acme.test")]).await;
    let receipt = fx
        .service
        .process_payment(admin_actor, admin_checkout, request)
        .await
        .unwrap();
    assert!((receipt.total - 30.0).abs() < f64::EPSILON);

    let invoice = &fx.store.invoices().await[0];
    assert_eq!(invoice.line_items[1].kind, LineItemKind::AdminDiscount);
    assert_eq!(invoice.line_items[1].description, "Loyalty");
}

#[tokio::test]
async fn test_declined_card_leaves_nothing_behind() {
    let fx = Fixture::with_gateway(
        10,
        MockPaymentGateway::declining("This transaction has been declined."),
    )
    .await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;

    let result = fx
        .service
        .process_payment(fx.actor(), checkout, payment(50.0))
        .await;

    assert!(matches!(result, Err(RegistrationError::Payment(_))));
    let stored = fx.store.checkout(checkout).await.unwrap();
    assert!(stored.is_in_progress());
    assert_eq!(stored.confirmation_number, None);
    assert!(fx.store.enrollments().await.is_empty());
    assert!(fx.store.invoices().await.is_empty());
    assert!(fx.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_storage_failure_after_charge_rolls_back() {
    let fx = Fixture::new(10).await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    fx.store.fail_invoice_inserts();

    let result = fx
        .service
        .process_payment(fx.actor(), checkout, payment(50.0))
        .await;

    assert!(matches!(result, Err(RegistrationError::Database(_))));
    assert_eq!(fx.gateway.charge_count(), 1);
    assert!(fx.store.checkout(checkout).await.unwrap().is_in_progress());
    assert!(fx.store.enrollments().await.is_empty());
    assert!(fx.store.payment_profiles().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_payments_charge_once() {
    let fx = Fixture::new(10).await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;

    let (a, b) = tokio::join!(
        fx.service.process_payment(fx.actor(), checkout, payment(50.0)),
        fx.service.process_payment(fx.actor(), checkout, payment(50.0)),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(RegistrationError::CheckoutNotInProgress(id)) if *id == checkout
    )));
    assert_eq!(fx.gateway.charge_count(), 1);
    assert_eq!(fx.store.enrollments().await.len(), 1);
}

#[tokio::test]
async fn test_session_lock_guards_every_cart_of_the_session() {
    let fx = Fixture::new(10).await;
    let checkout = fx
        .service
        .start_checkout(fx.actor(), fx.session.id)
        .await
        .unwrap()
        .id;

    let held = fx.locks.acquire(&fx.session_lock()).await.unwrap();
    let update_result = fx
        .service
        .update_checkout(fx.actor(), checkout, update(&[("Dana", "dana@acme.test")]))
        .await;
    assert!(matches!(
        update_result,
        Err(RegistrationError::Lock(LockError::Timeout { .. }))
    ));
    let payment_result = fx
        .service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await;
    assert!(matches!(
        payment_result,
        Err(RegistrationError::Lock(LockError::Timeout { .. }))
    ));
    assert_eq!(fx.store.checkout(checkout).await.unwrap().reservation_expires_at, None);
    drop(held);

    let view = fx
        .service
        .update_checkout(fx.actor(), checkout, update(&[("Dana", "dana@acme.test")]))
        .await
        .unwrap();
    assert!(view.reservation_expires_at.is_some());
}

#[tokio::test]
async fn test_concurrent_carts_never_overbook_the_session() {
    let fx = Fixture::new(3).await;
    let lee = fx.colleague("Lee", "lee@acme.test", None).await;
    let lee_actor = Actor {
        employee_id: lee.id,
        company_id: fx.company,
    };
    let dana_cart = fx
        .service
        .start_checkout(fx.actor(), fx.session.id)
        .await
        .unwrap()
        .id;
    let lee_cart = fx
        .service
        .start_checkout(lee_actor, fx.session.id)
        .await
        .unwrap()
        .id;

    let (a, b) = tokio::join!(
        fx.service.update_checkout(
            fx.actor(),
            dana_cart,
            update(&[("Dana", "dana@acme.test"), ("Sam", "sam@acme.test")]),
        ),
        fx.service.update_checkout(
            lee_actor,
            lee_cart,
            update(&[("Lee", "lee@acme.test"), ("Kim", "kim@acme.test")]),
        ),
    );

    let seated = [a.unwrap(), b.unwrap()]
        .iter()
        .flat_map(|view| view.attendees.iter())
        .filter(|attendee| !attendee.is_waitlist)
        .count();
    assert_eq!(seated, 3);
}

#[tokio::test]
async fn test_promotion_and_payment_share_the_session_lock() {
    let fx = Fixture::new(1).await;
    fx.take_seat("Pat").await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    fx.service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await
        .unwrap();
    let entry = fx.store.waitlist().await[0].clone();
    let admin = fx.colleague("Ada", "ada@acme.test", Some(ROLE_ADMIN)).await;
    let admin_actor = Actor {
        employee_id: admin.id,
        company_id: fx.company,
    };

    let mut bigger = fx.session.clone();
    bigger.max_enrollments = 2;
    fx.store.seed_session(bigger).await;

    // A payment in flight on the session keeps promotion out
    let held = fx.locks.acquire(&fx.session_lock()).await.unwrap();
    let blocked = fx.service.promote_waitlist_entry(admin_actor, entry.id).await;
    assert!(matches!(
        blocked,
        Err(RegistrationError::Lock(LockError::Timeout { .. }))
    ));
    assert_eq!(fx.gateway.profile_charge_count(), 0);
    drop(held);

    // Lee pays for the last seat first; the promotion then finds the session full
    let lee = fx.colleague("Lee", "lee@acme.test", None).await;
    let lee_actor = Actor {
        employee_id: lee.id,
        company_id: fx.company,
    };
    let lee_cart = fx.cart_with(lee_actor, &[("Lee", "lee@acme.test")]).await;
    let (paid, promoted) = tokio::join!(
        fx.service.process_payment(lee_actor, lee_cart, payment(50.0)),
        fx.service.promote_waitlist_entry(admin_actor, entry.id),
    );

    assert!(paid.is_ok());
    assert!(matches!(
        promoted,
        Err(RegistrationError::NotEnoughSeatsAvailable { available: 0, .. })
    ));
    assert_eq!(fx.store.enrollments().await.len(), 2);
    assert_eq!(fx.gateway.profile_charge_count(), 0);
}

#[tokio::test]
async fn test_details_suggest_buyer_unless_enrolled_by_email() {
    let fx = Fixture::new(5).await;
    let checkout = fx
        .service
        .start_checkout(fx.actor(), fx.session.id)
        .await
        .unwrap()
        .id;

    let details = fx
        .service
        .checkout_details(fx.actor(), checkout)
        .await
        .unwrap();
    assert_eq!(details.checkout.attendees.len(), 1);
    assert!(details.checkout.attendees[0].is_default);

    fx.store
        .seed_enrollment(Enrollment {
            id: EnrollmentId::new(),
            checkout_id: None,
            session_id: fx.session.id,
            employee_id: None,
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            email: Some("dana@acme.test".to_string()),
            special_requests: None,
            enrolled_at: fx.clock.now(),
        })
        .await;

    let details = fx
        .service
        .checkout_details(fx.actor(), checkout)
        .await
        .unwrap();
    assert!(details.checkout.attendees.is_empty());
}

// ============================================================================
// Waitlist
// ============================================================================

#[tokio::test]
async fn test_waitlist_only_checkout_stores_card_without_charging() {
    let fx = Fixture::new(1).await;
    fx.take_seat("Pat").await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;

    let receipt = fx
        .service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await
        .unwrap();

    assert_eq!(receipt.seats_enrolled, 0);
    assert_eq!(receipt.attendees_waitlisted, 1);
    assert_eq!(receipt.transaction_id, None);
    assert_eq!(fx.gateway.charge_count(), 0);
    assert_eq!(fx.gateway.profile_count(), 1);
    assert_eq!(fx.store.payment_profiles().await.len(), 1);
    assert!(fx.store.payments().await.is_empty());

    let waitlist = fx.service.list_waitlist(fx.session.id).await.unwrap();
    assert_eq!(waitlist.len(), 1);
    assert_eq!(waitlist[0].waitlist_position, 1);
    assert_eq!(waitlist[0].email.as_deref(), Some("dana@acme.test"));
}

#[tokio::test]
async fn test_waitlisted_attendee_cannot_be_added_again() {
    let fx = Fixture::new(1).await;
    fx.take_seat("Pat").await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    fx.service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await
        .unwrap();

    let again = fx.service.start_checkout(fx.actor(), fx.session.id).await.unwrap();
    assert_ne!(again.id, checkout);
    let result = fx
        .service
        .update_checkout(fx.actor(), again.id, update(&[("Dana", "DANA@acme.test")]))
        .await;
    assert!(matches!(
        result,
        Err(RegistrationError::AttendeeAlreadyWaitlisted { .. })
    ));
}

#[tokio::test]
async fn test_promotion_charges_stored_card_and_enrolls() {
    let fx = Fixture::new(1).await;
    fx.take_seat("Pat").await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    fx.service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await
        .unwrap();
    let entry = fx.store.waitlist().await[0].clone();

    let admin = fx.colleague("Ada", "ada@acme.test", Some(ROLE_ADMIN)).await;
    let admin_actor = Actor {
        employee_id: admin.id,
        company_id: fx.company,
    };

    // Still full
    let full = fx.service.promote_waitlist_entry(admin_actor, entry.id).await;
    assert!(matches!(
        full,
        Err(RegistrationError::NotEnoughSeatsAvailable { available: 0, .. })
    ));

    let mut bigger = fx.session.clone();
    bigger.max_enrollments = 2;
    fx.store.seed_session(bigger).await;

    let receipt = fx
        .service
        .promote_waitlist_entry(admin_actor, entry.id)
        .await
        .unwrap();
    assert!((receipt.amount_charged - 50.0).abs() < f64::EPSILON);
    assert!(receipt.transaction_id.is_some());
    assert!(receipt.entry.promoted_at.is_some());
    assert_eq!(fx.gateway.profile_charge_count(), 1);

    let enrollments = fx.store.enrollments().await;
    assert_eq!(enrollments.len(), 2);
    assert!(enrollments.iter().any(|e| e.email.as_deref() == Some("dana@acme.test")));
    assert_eq!(fx.store.payments().await.len(), 1);

    let again = fx.service.promote_waitlist_entry(admin_actor, entry.id).await;
    assert!(matches!(
        again,
        Err(RegistrationError::WaitlistAlreadyPromoted(id)) if id == entry.id
    ));
}

#[tokio::test]
async fn test_only_admins_promote() {
    let fx = Fixture::new(1).await;
    fx.take_seat("Pat").await;
    let checkout = fx.cart_with(fx.actor(), &[("Dana", "dana@acme.test")]).await;
    fx.service
        .process_payment(fx.actor(), checkout, payment(0.0))
        .await
        .unwrap();
    let entry = fx.store.waitlist().await[0].clone();

    let result = fx.service.promote_waitlist_entry(fx.actor(), entry.id).await;
    assert!(matches!(
        result,
        Err(RegistrationError::NoPermissionToManageWaitlist)
    ));
    assert_eq!(fx.gateway.profile_charge_count(), 0);
}

//! Payment gateway abstraction and an in-process mock.
//!
//! Cards never reach this service: the browser tokenizes them into an opaque
//! `(descriptor, value)` pair. The gateway turns that token into a reusable
//! customer/payment profile and charges the profile. See
//! [`crate::authnet::AuthorizeNetGateway`] for the production implementation.

use hub_core::Money;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Boxed future returned by gateway calls
pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send>>;

/// Payment gateway error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    /// The processor refused the transaction
    Declined {
        /// Customer-facing reason
        reason: String,
    },
    /// Customer profile could not be created
    CustomerProfileFailed,
    /// Payment profile could not be created from the card token
    PaymentProfileFailed,
    /// Transaction response missing
    IncompleteResponse,
    /// Gateway timeout
    Timeout,
    /// Transport or protocol failure
    Other {
        /// Error message
        message: String,
    },
}

impl std::fmt::Display for PaymentGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declined { reason } => write!(f, "{reason}"),
            Self::CustomerProfileFailed => write!(f, "Failed to create Customer Profile"),
            Self::PaymentProfileFailed => write!(f, "Failed to create Customer Payment Profile"),
            Self::IncompleteResponse => write!(
                f,
                "We received an incomplete response from the payment processor."
            ),
            Self::Timeout => write!(f, "Gateway timeout"),
            Self::Other { message } => write!(f, "Payment error: {message}"),
        }
    }
}

impl std::error::Error for PaymentGatewayError {}

/// Tokenized card plus the customer it belongs to.
#[derive(Debug, Clone)]
pub struct CardToken {
    /// Merchant-side customer id (the acting employee)
    pub customer_id: String,
    /// Customer email, stored on a new customer profile
    pub customer_email: Option<String>,
    /// Opaque data descriptor from the browser tokenizer
    pub data_descriptor: String,
    /// Opaque data value from the browser tokenizer
    pub data_value: String,
}

/// Charge a freshly tokenized card.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Card to store and charge
    pub card: CardToken,
    /// Amount to capture
    pub amount: Money,
    /// Invoice number shown on the transaction
    pub invoice_number: Option<String>,
}

/// Charge a previously stored profile.
#[derive(Debug, Clone)]
pub struct ProfileChargeRequest {
    /// Gateway customer profile
    pub customer_profile_id: String,
    /// Gateway payment profile
    pub payment_profile_id: String,
    /// Amount to capture
    pub amount: Money,
    /// Invoice number shown on the transaction
    pub invoice_number: Option<String>,
}

/// Approved gateway response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResponse {
    /// Transaction id, absent when nothing was charged
    pub transaction_id: Option<String>,
    /// Customer profile used
    pub customer_profile_id: Option<String>,
    /// Payment profile used
    pub payment_profile_id: Option<String>,
    /// Processor response code, `"1"` when approved
    pub response_code: Option<String>,
    /// Authorization code
    pub auth_code: Option<String>,
    /// Masked card number, e.g. `XXXX1111`
    pub account_last4: Option<String>,
    /// Card brand
    pub account_type: Option<String>,
}

impl GatewayResponse {
    /// Whether money was captured.
    #[must_use]
    pub const fn charged(&self) -> bool {
        self.transaction_id.is_some()
    }
}

/// Payment gateway trait
///
/// Implementations return `Ok` only for approved requests; declines and
/// profile failures come back as [`PaymentGatewayError`].
pub trait PaymentGateway: Send + Sync {
    /// Store the card as a profile and capture `amount` on it.
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be created or the charge is declined
    fn charge(&self, request: ChargeRequest) -> GatewayFuture<GatewayResponse>;

    /// Store the card as a profile without charging it.
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be created
    fn store_payment_profile(&self, card: CardToken) -> GatewayFuture<GatewayResponse>;

    /// Capture `amount` on an existing profile.
    ///
    /// # Errors
    ///
    /// Returns error if the charge is declined
    fn charge_profile(&self, request: ProfileChargeRequest) -> GatewayFuture<GatewayResponse>;
}

/// Mock payment gateway for development and tests.
///
/// Approves everything unless built with [`MockPaymentGateway::declining`],
/// and counts calls so tests can assert what reached the gateway.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    decline_reason: Option<String>,
    charges: AtomicUsize,
    profiles_stored: AtomicUsize,
    profile_charges: AtomicUsize,
}

impl MockPaymentGateway {
    /// Creates a mock that approves every request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that declines charges with `reason`
    #[must_use]
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            decline_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }

    /// Number of [`PaymentGateway::charge`] calls
    #[must_use]
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of [`PaymentGateway::store_payment_profile`] calls
    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.profiles_stored.load(Ordering::SeqCst)
    }

    /// Number of [`PaymentGateway::charge_profile`] calls
    #[must_use]
    pub fn profile_charge_count(&self) -> usize {
        self.profile_charges.load(Ordering::SeqCst)
    }

    fn profile_ids(customer_id: &str) -> (String, String) {
        (
            format!("mock_cust_{customer_id}"),
            format!("mock_pay_{}", uuid::Uuid::new_v4().simple()),
        )
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn charge(&self, request: ChargeRequest) -> GatewayFuture<GatewayResponse> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        let decline = self.decline_reason.clone();

        Box::pin(async move {
            if let Some(reason) = decline {
                tracing::info!(amount = request.amount.cents(), %reason, "Mock charge declined");
                return Err(PaymentGatewayError::Declined { reason });
            }

            let (customer_profile_id, payment_profile_id) =
                Self::profile_ids(&request.card.customer_id);
            let transaction_id = format!("mock_txn_{}", uuid::Uuid::new_v4());

            tracing::info!(
                amount = request.amount.cents(),
                transaction_id = %transaction_id,
                invoice_number = ?request.invoice_number,
                "Mock payment processed successfully"
            );

            Ok(GatewayResponse {
                transaction_id: Some(transaction_id),
                customer_profile_id: Some(customer_profile_id),
                payment_profile_id: Some(payment_profile_id),
                response_code: Some("1".to_string()),
                auth_code: Some("MOCK01".to_string()),
                account_last4: Some("XXXX1111".to_string()),
                account_type: Some("Visa".to_string()),
            })
        })
    }

    fn store_payment_profile(&self, card: CardToken) -> GatewayFuture<GatewayResponse> {
        self.profiles_stored.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            let (customer_profile_id, payment_profile_id) = Self::profile_ids(&card.customer_id);
            tracing::info!(
                customer_profile_id = %customer_profile_id,
                "Mock payment profile stored"
            );

            Ok(GatewayResponse {
                transaction_id: None,
                customer_profile_id: Some(customer_profile_id),
                payment_profile_id: Some(payment_profile_id),
                response_code: Some("1".to_string()),
                auth_code: None,
                account_last4: Some("XXXX1111".to_string()),
                account_type: Some("Visa".to_string()),
            })
        })
    }

    fn charge_profile(&self, request: ProfileChargeRequest) -> GatewayFuture<GatewayResponse> {
        self.profile_charges.fetch_add(1, Ordering::SeqCst);
        let decline = self.decline_reason.clone();

        Box::pin(async move {
            if let Some(reason) = decline {
                return Err(PaymentGatewayError::Declined { reason });
            }

            Ok(GatewayResponse {
                transaction_id: Some(format!("mock_txn_{}", uuid::Uuid::new_v4())),
                customer_profile_id: Some(request.customer_profile_id),
                payment_profile_id: Some(request.payment_profile_id),
                response_code: Some("1".to_string()),
                auth_code: Some("MOCK01".to_string()),
                account_last4: None,
                account_type: None,
            })
        })
    }
}

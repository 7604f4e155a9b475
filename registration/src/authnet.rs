//! Authorize.Net gateway over the JSON API.
//!
//! Every charge goes through Customer Information Manager profiles: find or
//! create the customer profile, attach the tokenized card as a payment
//! profile, then `authCaptureTransaction` against the profile. Stored
//! profiles are later charged directly for waitlist promotions.
//!
//! The JSON API is translated to XML on Authorize.Net's side, so member order
//! matters. Request bodies are typed structs to keep serialization order
//! fixed.

use crate::config::PaymentConfig;
use crate::payment_gateway::{
    CardToken, ChargeRequest, GatewayFuture, GatewayResponse, GatewayResult, PaymentGateway,
    PaymentGatewayError, ProfileChargeRequest,
};
use hub_core::Money;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// Result code Authorize.Net uses for a successful API call
const RESULT_OK: &str = "Ok";

/// Duplicate payment profile; the response still carries the existing id
const DUPLICATE_PAYMENT_PROFILE: &str = "E00039";

// ============================================================================
// Wire types
// ============================================================================

/// `{"<root>": body}` without routing `body` through `serde_json::Value`,
/// which would sort its members.
struct Envelope<'a, B> {
    root: &'static str,
    body: &'a B,
}

impl<B: Serialize> Serialize for Envelope<'_, B> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.root, self.body)?;
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct MerchantAuthentication {
    name: String,
    transaction_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetCustomerProfileRequest<'a> {
    merchant_authentication: &'a MerchantAuthentication,
    merchant_customer_id: &'a str,
    include_issuer_info: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerProfile<'a> {
    merchant_customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerProfileRequest<'a> {
    merchant_authentication: &'a MerchantAuthentication,
    profile: CustomerProfile<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpaqueData<'a> {
    data_descriptor: &'a str,
    data_value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentData<'a> {
    opaque_data: OpaqueData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPaymentProfile<'a> {
    customer_type: &'static str,
    payment: PaymentData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerPaymentProfileRequest<'a> {
    merchant_authentication: &'a MerchantAuthentication,
    customer_profile_id: &'a str,
    payment_profile: NewPaymentProfile<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetCustomerPaymentProfileRequest<'a> {
    merchant_authentication: &'a MerchantAuthentication,
    customer_profile_id: &'a str,
    customer_payment_profile_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileReference<'a> {
    payment_profile_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileToCharge<'a> {
    customer_profile_id: &'a str,
    payment_profile: ProfileReference<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Order<'a> {
    invoice_number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest<'a> {
    transaction_type: &'static str,
    amount: String,
    profile: ProfileToCharge<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<Order<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionRequest<'a> {
    merchant_authentication: &'a MerchantAuthentication,
    transaction_request: TransactionRequest<'a>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessage {
    #[serde(default)]
    code: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessages {
    #[serde(default)]
    result_code: String,
    #[serde(default)]
    message: Vec<ApiMessage>,
}

impl ApiMessages {
    fn is_ok(&self) -> bool {
        self.result_code == RESULT_OK
    }

    fn first_code(&self) -> Option<&str> {
        self.message.first().map(|m| m.code.as_str())
    }

    fn first_text(&self) -> Option<&str> {
        self.message.first().map(|m| m.text.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    customer_profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetCustomerProfileResponse {
    profile: Option<ProfileBody>,
    #[serde(default)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerProfileResponse {
    customer_profile_id: Option<String>,
    #[serde(default)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerPaymentProfileResponse {
    customer_payment_profile_id: Option<String>,
    #[serde(default)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditCardMasked {
    card_number: Option<String>,
    card_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPayment {
    credit_card: Option<CreditCardMasked>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPaymentProfile {
    payment: Option<StoredPayment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetCustomerPaymentProfileResponse {
    payment_profile: Option<StoredPaymentProfile>,
    #[serde(default)]
    messages: ApiMessages,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    response_code: Option<String>,
    auth_code: Option<String>,
    trans_id: Option<String>,
    account_number: Option<String>,
    account_type: Option<String>,
    #[serde(default)]
    errors: Vec<TransactionError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionResponse {
    transaction_response: Option<TransactionResponse>,
}

/// Empty strings come back for absent fields.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Customer-facing text for a failed transaction.
fn decline_message(txn: &TransactionResponse) -> Option<String> {
    if txn.response_code.as_deref() == Some("1") {
        return None;
    }

    if let Some(error) = txn.errors.first() {
        let mapped = match error.error_code.as_str() {
            "2" | "3" | "4" => "Your card was declined by your bank.",
            "6" | "37" => "The card number is invalid.",
            "7" | "8" => "The card has expired.",
            "11" => "A duplicate transaction was submitted. Please wait before trying again.",
            "27" => "The billing address does not match the card.",
            "44" | "45" | "65" => "The card security code did not match.",
            _ => return Some(error.error_text.clone()),
        };
        return Some(mapped.to_string());
    }

    let message = match txn.response_code.as_deref() {
        Some("2") => "Your card was declined by your bank.",
        Some("3") => "There was an error processing your payment. Please verify and try again.",
        Some("4") => "Your payment requires additional verification. Our team will contact you.",
        _ => "We received an unexpected response from the payment processor.",
    };
    Some(message.to_string())
}

// ============================================================================
// Gateway
// ============================================================================

/// Authorize.Net implementation of [`PaymentGateway`].
#[derive(Debug, Clone)]
pub struct AuthorizeNetGateway {
    client: Client,
    endpoint: String,
    auth: MerchantAuthentication,
}

impl AuthorizeNetGateway {
    /// Build a gateway from payment configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGatewayError::Other`] if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentGatewayError::Other {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.environment.endpoint().to_string(),
            auth: MerchantAuthentication {
                name: config.api_login_id.clone(),
                transaction_key: config.transaction_key.clone(),
            },
        })
    }

    async fn call<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        root: &'static str,
        body: &B,
    ) -> GatewayResult<R> {
        let envelope = Envelope { root, body };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentGatewayError::Timeout
                } else {
                    PaymentGatewayError::Other {
                        message: e.to_string(),
                    }
                }
            })?;

        let text = response.text().await.map_err(|e| PaymentGatewayError::Other {
            message: e.to_string(),
        })?;

        // Authorize.Net prefixes JSON bodies with a byte-order mark
        serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
            PaymentGatewayError::Other {
                message: format!("Unparseable {root} response: {e}"),
            }
        })
    }

    async fn find_customer_profile(&self, customer_id: &str) -> Option<String> {
        if customer_id.is_empty() {
            return None;
        }

        let request = GetCustomerProfileRequest {
            merchant_authentication: &self.auth,
            merchant_customer_id: customer_id,
            include_issuer_info: true,
        };

        match self
            .call::<_, GetCustomerProfileResponse>("getCustomerProfileRequest", &request)
            .await
        {
            Ok(response) if response.messages.is_ok() => {
                response.profile.and_then(|p| non_empty(p.customer_profile_id))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Customer profile lookup failed");
                None
            }
        }
    }

    async fn create_customer_profile(&self, card: &CardToken) -> GatewayResult<String> {
        let request = CreateCustomerProfileRequest {
            merchant_authentication: &self.auth,
            profile: CustomerProfile {
                merchant_customer_id: &card.customer_id,
                email: card.customer_email.as_deref(),
            },
        };

        let response: CreateCustomerProfileResponse = self
            .call("createCustomerProfileRequest", &request)
            .await
            .map_err(|_| PaymentGatewayError::CustomerProfileFailed)?;

        if !response.messages.is_ok() {
            tracing::warn!(
                code = ?response.messages.first_code(),
                message = ?response.messages.first_text(),
                "Customer profile creation rejected"
            );
            return Err(PaymentGatewayError::CustomerProfileFailed);
        }
        non_empty(response.customer_profile_id).ok_or(PaymentGatewayError::CustomerProfileFailed)
    }

    async fn create_payment_profile(
        &self,
        customer_profile_id: &str,
        card: &CardToken,
    ) -> GatewayResult<String> {
        let request = CreateCustomerPaymentProfileRequest {
            merchant_authentication: &self.auth,
            customer_profile_id,
            payment_profile: NewPaymentProfile {
                customer_type: "individual",
                payment: PaymentData {
                    opaque_data: OpaqueData {
                        data_descriptor: &card.data_descriptor,
                        data_value: &card.data_value,
                    },
                },
            },
        };

        let response: CreateCustomerPaymentProfileResponse = self
            .call("createCustomerPaymentProfileRequest", &request)
            .await
            .map_err(|_| PaymentGatewayError::PaymentProfileFailed)?;

        let usable = response.messages.is_ok()
            || response.messages.first_code() == Some(DUPLICATE_PAYMENT_PROFILE);
        if !usable {
            tracing::warn!(
                code = ?response.messages.first_code(),
                message = ?response.messages.first_text(),
                "Payment profile creation rejected"
            );
            return Err(PaymentGatewayError::PaymentProfileFailed);
        }
        non_empty(response.customer_payment_profile_id)
            .ok_or(PaymentGatewayError::PaymentProfileFailed)
    }

    /// Customer profile, then payment profile, for a card token.
    async fn ensure_profiles(&self, card: &CardToken) -> GatewayResult<(String, String)> {
        let customer_profile_id = match self.find_customer_profile(&card.customer_id).await {
            Some(id) => id,
            None => self.create_customer_profile(card).await?,
        };
        let payment_profile_id = self.create_payment_profile(&customer_profile_id, card).await?;
        Ok((customer_profile_id, payment_profile_id))
    }

    async fn masked_card(
        &self,
        customer_profile_id: &str,
        payment_profile_id: &str,
    ) -> (Option<String>, Option<String>) {
        let request = GetCustomerPaymentProfileRequest {
            merchant_authentication: &self.auth,
            customer_profile_id,
            customer_payment_profile_id: payment_profile_id,
        };

        match self
            .call::<_, GetCustomerPaymentProfileResponse>("getCustomerPaymentProfileRequest", &request)
            .await
        {
            Ok(response) if response.messages.is_ok() => response
                .payment_profile
                .and_then(|p| p.payment)
                .and_then(|p| p.credit_card)
                .map_or((None, None), |card| {
                    (non_empty(card.card_number), non_empty(card.card_type))
                }),
            _ => (None, None),
        }
    }

    async fn capture(
        &self,
        customer_profile_id: &str,
        payment_profile_id: &str,
        amount: Money,
        invoice_number: Option<&str>,
    ) -> GatewayResult<GatewayResponse> {
        let request = CreateTransactionRequest {
            merchant_authentication: &self.auth,
            transaction_request: TransactionRequest {
                transaction_type: "authCaptureTransaction",
                amount: amount.to_decimal_string(),
                profile: ProfileToCharge {
                    customer_profile_id,
                    payment_profile: ProfileReference { payment_profile_id },
                },
                order: invoice_number
                    .filter(|n| !n.is_empty())
                    .map(|invoice_number| Order { invoice_number }),
            },
        };

        let response: CreateTransactionResponse =
            self.call("createTransactionRequest", &request).await?;
        let txn = response
            .transaction_response
            .ok_or(PaymentGatewayError::IncompleteResponse)?;

        if let Some(reason) = decline_message(&txn) {
            tracing::info!(
                response_code = ?txn.response_code,
                %reason,
                "Authorize.Net transaction declined"
            );
            return Err(PaymentGatewayError::Declined { reason });
        }

        Ok(GatewayResponse {
            transaction_id: non_empty(txn.trans_id),
            customer_profile_id: Some(customer_profile_id.to_string()),
            payment_profile_id: Some(payment_profile_id.to_string()),
            response_code: non_empty(txn.response_code),
            auth_code: non_empty(txn.auth_code),
            account_last4: non_empty(txn.account_number),
            account_type: non_empty(txn.account_type),
        })
    }
}

impl PaymentGateway for AuthorizeNetGateway {
    fn charge(&self, request: ChargeRequest) -> GatewayFuture<GatewayResponse> {
        let this = self.clone();
        Box::pin(async move {
            let (customer_profile_id, payment_profile_id) =
                this.ensure_profiles(&request.card).await?;
            this.capture(
                &customer_profile_id,
                &payment_profile_id,
                request.amount,
                request.invoice_number.as_deref(),
            )
            .await
        })
    }

    fn store_payment_profile(&self, card: CardToken) -> GatewayFuture<GatewayResponse> {
        let this = self.clone();
        Box::pin(async move {
            let (customer_profile_id, payment_profile_id) = this.ensure_profiles(&card).await?;
            let (account_last4, account_type) =
                this.masked_card(&customer_profile_id, &payment_profile_id).await;

            Ok(GatewayResponse {
                transaction_id: None,
                customer_profile_id: Some(customer_profile_id),
                payment_profile_id: Some(payment_profile_id),
                response_code: Some("1".to_string()),
                auth_code: None,
                account_last4,
                account_type,
            })
        })
    }

    fn charge_profile(&self, request: ProfileChargeRequest) -> GatewayFuture<GatewayResponse> {
        let this = self.clone();
        Box::pin(async move {
            this.capture(
                &request.customer_profile_id,
                &request.payment_profile_id,
                request.amount,
                request.invoice_number.as_deref(),
            )
            .await
        })
    }
}

//! services/api/src/adapters/toss.rs
//!
//! This module contains the adapter for the Toss Payments REST API.
//! It implements the `PaymentGateway` port from the `core` crate.
//!
//! Requests authenticate with HTTP basic auth: the secret key as the username
//! and an empty password. A non-2xx answer is a gateway decision and becomes
//! `GatewayOutcome::Rejected`; only transport failures are port errors.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smart_cart_core::domain::PaymentReceipt;
use smart_cart_core::ports::{
    CancelReceipt, GatewayFailure, GatewayOutcome, PaymentGateway, PortError, PortResult,
};
use tracing::{error, info};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    payment_key: &'a str,
    order_id: &'a str,
    amount: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest<'a> {
    cancel_reason: &'a str,
}

/// The subset of the Toss `Payment` object the cart core needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TossPayment {
    payment_key: String,
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    status: String,
    method: Option<String>,
    approved_at: Option<String>,
    #[serde(default)]
    total_amount: u64,
}

impl TossPayment {
    fn into_receipt(self) -> PaymentReceipt {
        PaymentReceipt {
            payment_key: self.payment_key,
            order_id: self.order_id,
            status: self.status,
            method: self.method,
            approved_at: self.approved_at,
            total_amount: self.total_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TossErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Builds a failure from an error response body, tolerating bodies that are
/// not JSON at all.
fn failure_from(status: reqwest::StatusCode, body: &str) -> GatewayFailure {
    let parsed = serde_json::from_str::<TossErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.code.clone())
        .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());
    GatewayFailure { code, message }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PaymentGateway` port using Toss Payments.
#[derive(Clone)]
pub struct TossPaymentsAdapter {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl TossPaymentsAdapter {
    /// Creates a new `TossPaymentsAdapter`. `api_base` has no trailing slash.
    pub fn new(client: Client, secret_key: String, api_base: String) -> Self {
        Self {
            client,
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/payments{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<GatewayOutcome<T>> {
        let response = request
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("payment gateway unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !status.is_success() {
            let failure = failure_from(status, &body);
            error!(status = status.as_u16(), code = %failure.code, message = %failure.message, "Toss Payments rejected the request.");
            return Ok(GatewayOutcome::Rejected(failure));
        }

        let payload = serde_json::from_str::<T>(&body)
            .map_err(|e| PortError::Unexpected(format!("unreadable gateway response: {}", e)))?;
        Ok(GatewayOutcome::Approved(payload))
    }
}

//=========================================================================================
// `PaymentGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentGateway for TossPaymentsAdapter {
    async fn confirm(
        &self,
        order_id: &str,
        payment_key: &str,
        amount: u64,
    ) -> PortResult<GatewayOutcome<PaymentReceipt>> {
        let request = self.client.post(self.url("/confirm")).json(&ConfirmRequest {
            payment_key,
            order_id,
            amount,
        });
        let outcome = self.send::<TossPayment>(request).await?;
        if let GatewayOutcome::Approved(payment) = &outcome {
            info!(order_id, status = %payment.status, "Toss Payments approved the payment.");
        }
        Ok(map_approved(outcome, TossPayment::into_receipt))
    }

    async fn cancel(&self, payment_key: &str, reason: &str) -> PortResult<GatewayOutcome<CancelReceipt>> {
        let request = self
            .client
            .post(self.url(&format!("/{}/cancel", payment_key)))
            .json(&CancelRequest {
                cancel_reason: reason,
            });
        let outcome = self.send::<TossPayment>(request).await?;
        Ok(map_approved(outcome, |payment| CancelReceipt {
            payment_key: payment.payment_key,
            status: payment.status,
        }))
    }

    async fn fetch(&self, payment_key: &str) -> PortResult<GatewayOutcome<PaymentReceipt>> {
        let request = self.client.get(self.url(&format!("/{}", payment_key)));
        let outcome = self.send::<TossPayment>(request).await?;
        Ok(map_approved(outcome, TossPayment::into_receipt))
    }
}

fn map_approved<T, U>(outcome: GatewayOutcome<T>, f: impl FnOnce(T) -> U) -> GatewayOutcome<U> {
    match outcome {
        GatewayOutcome::Approved(value) => GatewayOutcome::Approved(f(value)),
        GatewayOutcome::Rejected(failure) => GatewayOutcome::Rejected(failure),
    }
}

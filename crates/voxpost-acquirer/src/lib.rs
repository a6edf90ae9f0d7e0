// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Card acquirer client.
//!
//! Wraps `POST /payments` (initial card-saving payment and recurring charge)
//! and `GET /payments/{id}`. Authentication is HTTP Basic with the shop id
//! and secret key; every mutating call carries the caller's
//! `Idempotence-Key`.

pub mod order;
mod wire;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, info};
use voxpost_config::model::AcquirerConfig;
use voxpost_core::{
    AcquirerAdapter, AdapterType, HealthStatus, InitialPaymentRequest, Payment, PluginAdapter,
    RecurringPaymentRequest, VoxpostError,
};

use crate::wire::CreatePayment;

pub use order::{PAYMENT_PREFIX, SUBSCRIPTION_PREFIX, format_order_id, parse_order_user};

const IDEMPOTENCE_HEADER: &str = "Idempotence-Key";

/// HTTP client for the acquirer's payments API.
#[derive(Debug, Clone)]
pub struct AcquirerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AcquirerClient {
    /// Build a client. Fails when the shop id or secret key is missing.
    pub fn new(config: &AcquirerConfig) -> Result<Self, VoxpostError> {
        let (Some(shop_id), Some(secret)) = (config.shop_id.as_deref(), config.secret_key.as_deref())
        else {
            return Err(VoxpostError::Config(
                "acquirer shop_id and secret_key are required".into(),
            ));
        };

        let credentials = STANDARD.encode(format!("{shop_id}:{secret}"));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| VoxpostError::Config(format!("invalid acquirer credentials: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| VoxpostError::Acquirer {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        info!(base_url = %config.base_url, "acquirer client initialized");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> VoxpostError {
        if e.is_timeout() {
            VoxpostError::Timeout {
                duration: self.timeout,
            }
        } else {
            VoxpostError::Acquirer {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            }
        }
    }

    async fn read_payment(&self, response: reqwest::Response) -> Result<Payment, VoxpostError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoxpostError::Acquirer {
                message: format!("acquirer returned {status}: {body}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }
        response.json::<Payment>().await.map_err(|e| VoxpostError::Acquirer {
            message: format!("failed to parse payment: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })
    }

    async fn create(
        &self,
        body: &CreatePayment<'_>,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError> {
        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header(IDEMPOTENCE_HEADER, idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let payment = self.read_payment(response).await?;
        debug!(payment_id = %payment.id, status = %payment.status, "payment created");
        Ok(payment)
    }
}

#[async_trait]
impl PluginAdapter for AcquirerClient {
    fn name(&self) -> &str {
        "acquirer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Acquirer
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(match self.client.get(&self.base_url).send().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(format!("unreachable: {e}")),
        })
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl AcquirerAdapter for AcquirerClient {
    async fn create_initial_payment(
        &self,
        request: &InitialPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError> {
        self.create(&CreatePayment::initial(request), idempotency_key)
            .await
    }

    async fn create_recurring_payment(
        &self,
        request: &RecurringPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError> {
        self.create(&CreatePayment::recurring(request), idempotency_key)
            .await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, VoxpostError> {
        let response = self
            .client
            .get(format!("{}/payments/{payment_id}", self.base_url))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        self.read_payment(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxpost_core::{PaymentStatus, UserId};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> AcquirerClient {
        let config = AcquirerConfig {
            base_url: base_url.to_string(),
            shop_id: Some("shop".into()),
            secret_key: Some("secret".into()),
            ..AcquirerConfig::default()
        };
        AcquirerClient::new(&config).unwrap()
    }

    fn payment_json(id: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "status": status,
            "paid": status == "succeeded",
            "amount": {"value": "990.00", "currency": "RUB"},
            "confirmation": {"type": "redirect", "confirmation_url": "https://pay.example/confirm"},
            "metadata": {"user_id": "42"}
        })
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = AcquirerClient::new(&AcquirerConfig::default()).unwrap_err();
        assert!(matches!(err, VoxpostError::Config(_)));
    }

    #[tokio::test]
    async fn initial_payment_saves_card_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            // base64("shop:secret")
            .and(header("authorization", "Basic c2hvcDpzZWNyZXQ="))
            .and(header("idempotence-key", "42-123"))
            .and(body_partial_json(serde_json::json!({
                "amount": {"value": "990.00", "currency": "RUB"},
                "save_payment_method": true,
                "customer": {"id": "user-42"},
                "confirmation": {"type": "redirect", "return_url": "https://bot.example/ok"},
                "metadata": {"user_id": "42", "order_id": "sub_42_20260101000000"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(payment_json("p_1", "pending")))
            .expect(1)
            .mount(&server)
            .await;

        let request = InitialPaymentRequest {
            user_id: UserId(42),
            amount_minor: 99_000,
            customer_id: "user-42".into(),
            return_url: "https://bot.example/ok".into(),
            description: "Voxpost subscription".into(),
            order_id: "sub_42_20260101000000".into(),
        };
        let payment = client(&server.uri())
            .create_initial_payment(&request, "42-123")
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.confirmation_url(), Some("https://pay.example/confirm"));
    }

    #[tokio::test]
    async fn recurring_payment_uses_saved_method() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(header("idempotence-key", "88-999"))
            .and(body_partial_json(serde_json::json!({
                "payment_method_id": "pm_88",
                "customer": {"id": "cust_88"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(payment_json("r_1", "succeeded")))
            .expect(1)
            .mount(&server)
            .await;

        let request = RecurringPaymentRequest {
            user_id: UserId(88),
            amount_minor: 99_000,
            customer_id: "cust_88".into(),
            payment_method_id: "pm_88".into(),
            description: "renewal".into(),
            order_id: "pay_88_20260101000000".into(),
        };
        let payment = client(&server.uri())
            .create_recurring_payment(&request, "88-999")
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/p_404"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).get_payment("p_404").await.unwrap_err();
        match err {
            VoxpostError::Acquirer { status, .. } => assert_eq!(status, Some(500)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fetches_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/p_77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payment_json("p_77", "succeeded")))
            .mount(&server)
            .await;

        let payment = client(&server.uri()).get_payment("p_77").await.unwrap();
        assert_eq!(payment.id, "p_77");
        assert_eq!(payment.metadata_user_id(), Some(UserId(42)));
    }
}

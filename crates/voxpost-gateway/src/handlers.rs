// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use voxpost_acquirer::parse_order_user;
use voxpost_billing::{ActivationOutcome, BillingError};
use voxpost_core::{
    Action, Button, HealthStatus, Keyboard, OutboundMessage, PaymentStatus, Tariff, UserId,
};
use voxpost_storage::queries::users;

use crate::server::GatewayState;
use crate::signature::{self, SIGNATURE_HEADER};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Envelope of an acquirer notification. Only the object id is trusted;
/// the payment itself is re-fetched.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
}

/// Query for the ops routes.
#[derive(Debug, Deserialize)]
pub struct OpsQuery {
    pub user_id: i64,
    /// Minor units. Defaults to the configured subscription price.
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: BTreeMap<String, &'static str>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn notify(state: &GatewayState, msg: OutboundMessage) {
    let Some(messenger) = &state.messenger else {
        return;
    };
    let user = msg.user_id;
    if let Err(e) = messenger.send(msg).await {
        warn!(user_id = %user, error = %e, "failed to notify user about payment");
    }
}

// --- webhook ------------------------------------------------------------

/// POST /acquirer/webhook
///
/// Answers 200 for anything well-formed so the acquirer stops redelivering,
/// 400 for unparsable bodies and 401 for bad signatures.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let presented = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !signature::verify(secret, &body, presented) {
            warn!("webhook signature mismatch");
            voxpost_prometheus::record_webhook("rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "webhook body is not a valid envelope");
            voxpost_prometheus::record_webhook("invalid");
            return error_response(StatusCode::BAD_REQUEST, "invalid webhook body");
        }
    };

    let outcome = apply_webhook(&state, &envelope).await;
    voxpost_prometheus::record_webhook(outcome);
    (StatusCode::OK, "ok").into_response()
}

/// Fetch the canonical payment and activate on success. Returns the
/// metric outcome label.
async fn apply_webhook(state: &GatewayState, envelope: &WebhookEnvelope) -> &'static str {
    let payment_id = envelope.object.id.as_str();
    let payment = match state.coordinator.acquirer().get_payment(payment_id).await {
        Ok(payment) => payment,
        Err(e) => {
            warn!(payment_id, event = %envelope.event, error = %e, "could not fetch webhook payment");
            return "fetch_failed";
        }
    };

    if payment.status != PaymentStatus::Succeeded {
        debug!(payment_id, status = %payment.status, event = %envelope.event, "webhook ignored");
        return "ignored";
    }

    let (Some(user), Some(method), Some(customer), Some(amount)) = (
        payment.metadata_user_id(),
        payment.payment_method.as_ref().map(|m| m.id.clone()),
        payment.customer.as_ref().map(|c| c.id.clone()),
        payment.amount.to_minor(),
    ) else {
        warn!(payment_id, "succeeded payment is missing user, method, customer or amount");
        return "incomplete";
    };

    match state
        .coordinator
        .activate_from_webhook(user, &customer, &method, &payment.id, amount)
        .await
    {
        Ok(ActivationOutcome::Activated(_)) => {
            notify(
                state,
                OutboundMessage::text(
                    user,
                    "Your subscription is active. Enjoy unlimited posts!",
                ),
            )
            .await;
            "activated"
        }
        Ok(ActivationOutcome::Duplicate(_)) => "duplicate",
        Err(e) => {
            error!(user_id = %user, payment_id, error = %e, "webhook activation failed");
            "error"
        }
    }
}

// --- ops ----------------------------------------------------------------

fn billing_error_response(err: &BillingError) -> Response {
    let status = match err {
        BillingError::AlreadySubscribed => StatusCode::CONFLICT,
        BillingError::NotSubscribed => StatusCode::NOT_FOUND,
        BillingError::MissingPaymentMethod(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BillingError::MissingConfirmation(_) | BillingError::ChargeFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        BillingError::Core(e) if e.is_transient() => StatusCode::BAD_GATEWAY,
        BillingError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

/// POST /acquirer/init?user_id=&amount=
///
/// Opens a subscription for the user and returns the initial payment.
pub async fn post_ops_init(
    State(state): State<GatewayState>,
    Query(query): Query<OpsQuery>,
) -> Response {
    let user = UserId(query.user_id);
    let amount = query
        .amount
        .unwrap_or(state.coordinator.settings().amount_minor);
    if let Err(e) = users::ensure_user(&state.db, user, None).await {
        return billing_error_response(&BillingError::Core(e));
    }
    match state.coordinator.initiate(user, Tariff::Paid, amount).await {
        Ok(initiated) => {
            info!(user_id = %user, payment_id = %initiated.payment.id, "ops initial payment created");
            Json(initiated.payment).into_response()
        }
        Err(e) => billing_error_response(&e),
    }
}

/// POST /acquirer/charge?user_id=&amount=
///
/// Charges the user's saved card right away.
pub async fn post_ops_charge(
    State(state): State<GatewayState>,
    Query(query): Query<OpsQuery>,
) -> Response {
    let user = UserId(query.user_id);
    let amount = query
        .amount
        .unwrap_or(state.coordinator.settings().amount_minor);
    match state.coordinator.force_charge(user, amount).await {
        Ok(payment) => {
            info!(user_id = %user, payment_id = %payment.id, status = %payment.status, "ops charge made");
            Json(payment).into_response()
        }
        Err(e) => billing_error_response(&e),
    }
}

// --- payment redirects --------------------------------------------------

const SUCCESS_PAGE: &str = "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Payment received</title></head>\
<body><h1>Thank you!</h1><p>Your payment was received. You can return to the bot.</p></body></html>";

const FAIL_PAGE: &str = "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Payment failed</title></head>\
<body><h1>Payment failed</h1><p>The payment did not go through. Return to the bot and try again.</p></body></html>";

/// GET /payment/success?order_id=
pub async fn get_payment_success(
    State(state): State<GatewayState>,
    Query(query): Query<RedirectQuery>,
) -> Html<&'static str> {
    let user = query.order_id.as_deref().and_then(parse_order_user);
    info!(order_id = ?query.order_id, user_id = ?user.map(|u| u.0), "payment success redirect");
    if let Some(user) = user {
        notify(
            &state,
            OutboundMessage::text(
                user,
                "Payment received. Your subscription starts as soon as the bank confirms it.",
            ),
        )
        .await;
    }
    Html(SUCCESS_PAGE)
}

/// GET /payment/fail?order_id=
pub async fn get_payment_fail(
    State(state): State<GatewayState>,
    Query(query): Query<RedirectQuery>,
) -> Html<&'static str> {
    let user = query.order_id.as_deref().and_then(parse_order_user);
    warn!(order_id = ?query.order_id, user_id = ?user.map(|u| u.0), "payment failure redirect");
    if let Some(user) = user {
        notify(
            &state,
            OutboundMessage::text(user, "The payment did not go through.").with_keyboard(
                Keyboard::new(vec![vec![
                    Button::action("Try again", Action::Subscribe),
                    Button::action("Main menu", Action::MainMenu),
                ]]),
            ),
        )
        .await;
    }
    Html(FAIL_PAGE)
}

// --- health and metrics -------------------------------------------------

/// GET /healthz
///
/// Aggregates adapter health. Answers 503 only when something is unhealthy.
pub async fn get_healthz(State(state): State<GatewayState>) -> Response {
    let mut services = BTreeMap::new();
    let mut worst = HealthStatus::Healthy;
    for service in &state.health.services {
        let status = match tokio::time::timeout(HEALTH_TIMEOUT, service.health_check()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => HealthStatus::Unhealthy(e.to_string()),
            Err(_) => HealthStatus::Unhealthy("health check timed out".to_string()),
        };
        if let HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) = &status {
            warn!(service = service.name(), reason = %reason, "service not healthy");
        }
        services.insert(service.name().to_string(), status.label());
        worst = worse(worst, status);
    }

    let code = match worst {
        HealthStatus::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    let body = HealthResponse {
        status: worst.label(),
        services,
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    };
    (code, Json(body)).into_response()
}

fn worse(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    fn rank(s: &HealthStatus) -> u8 {
        match s {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded(_) => 1,
            HealthStatus::Unhealthy(_) => 2,
        }
    }
    if rank(&b) > rank(&a) { b } else { a }
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxpost_core::VoxpostError;

    #[test]
    fn envelope_needs_an_object_id() {
        let ok: WebhookEnvelope =
            serde_json::from_str(r#"{"event":"payment.succeeded","object":{"id":"p1","status":"x"}}"#)
                .unwrap();
        assert_eq!(ok.object.id, "p1");
        assert!(serde_json::from_str::<WebhookEnvelope>(r#"{"event":"payment.succeeded"}"#).is_err());
    }

    #[test]
    fn worst_status_wins() {
        let degraded = worse(HealthStatus::Healthy, HealthStatus::Degraded("slow".into()));
        assert_eq!(degraded.label(), "degraded");
        let down = worse(degraded, HealthStatus::Unhealthy("down".into()));
        assert_eq!(down.label(), "unhealthy");
        let still = worse(down, HealthStatus::Healthy);
        assert_eq!(still.label(), "unhealthy");
    }

    #[test]
    fn billing_errors_map_to_statuses() {
        let conflict = billing_error_response(&BillingError::AlreadySubscribed);
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let missing = billing_error_response(&BillingError::NotSubscribed);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let upstream = billing_error_response(&BillingError::Core(VoxpostError::Provider {
            message: "down".into(),
            status: Some(503),
            source: None,
        }));
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}

// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription lifecycle: pending → active → renewed → cancelled/expired.
//!
//! Every state change is a single storage transaction. Payment tokens are
//! recorded in the `payment_events` ledger, which makes webhook activation
//! and renewal bookkeeping idempotent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use voxpost_acquirer::{PAYMENT_PREFIX, SUBSCRIPTION_PREFIX, format_order_id};
use voxpost_config::VoxpostConfig;
use voxpost_core::{
    AcquirerAdapter, InitialPaymentRequest, Payment, PaymentStatus, RecurringPaymentRequest,
    Tariff, UserId, VoxpostError,
};
use voxpost_storage::queries::subscriptions::{self, Activation, PendingOutcome};
use voxpost_storage::queries::users;
use voxpost_storage::{Database, Subscription};

use crate::error::BillingError;
use crate::keys::IdempotencyKeys;

pub use voxpost_storage::queries::subscriptions::ActivationOutcome;

/// Billing knobs, taken from the `acquirer` and `billing` config sections.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    pub amount_minor: i64,
    pub description: String,
    pub return_url: String,
    pub period: Duration,
    pub max_failures: u32,
    pub pending_settle: Duration,
}

impl BillingSettings {
    pub fn from_config(config: &VoxpostConfig) -> Self {
        Self {
            amount_minor: config.acquirer.subscription_amount_minor,
            description: config.acquirer.description.clone(),
            return_url: config.acquirer.return_url.clone(),
            period: Duration::days(config.billing.period_days),
            max_failures: config.billing.max_failures,
            pending_settle: Duration::hours(config.billing.pending_settle_hours),
        }
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self::from_config(&VoxpostConfig::default())
    }
}

/// A freshly requested initial payment.
#[derive(Debug, Clone)]
pub struct Initiated {
    pub subscription: Subscription,
    pub payment: Payment,
    /// Where the user confirms the payment.
    pub confirmation_url: String,
}

/// What one recurring charge did.
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    Renewed(Payment),
    /// The acquirer has not settled yet; the next attempt was pushed out.
    Pending(Payment),
    Failed {
        payment: Option<Payment>,
        error: String,
        /// The failure exhausted the budget and expired the subscription.
        expired: bool,
    },
}

impl RenewalOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RenewalOutcome::Renewed(_) => "renewed",
            RenewalOutcome::Pending(_) => "pending",
            RenewalOutcome::Failed { expired: true, .. } => "expired",
            RenewalOutcome::Failed { .. } => "failed",
        }
    }
}

/// Idempotency key and order id of one charge request.
struct ChargeIntent {
    key: String,
    order_id: String,
}

/// Owns subscription state transitions and talks to the acquirer.
pub struct SubscriptionCoordinator {
    db: Arc<Database>,
    acquirer: Arc<dyn AcquirerAdapter>,
    settings: BillingSettings,
    keys: IdempotencyKeys,
}

impl SubscriptionCoordinator {
    pub fn new(
        db: Arc<Database>,
        acquirer: Arc<dyn AcquirerAdapter>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            db,
            acquirer,
            settings,
            keys: IdempotencyKeys::new(),
        }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    pub fn acquirer(&self) -> &Arc<dyn AcquirerAdapter> {
        &self.acquirer
    }

    fn return_url(&self, order_id: &str) -> String {
        let sep = if self.settings.return_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{sep}order_id={order_id}", self.settings.return_url)
    }

    /// Open (or retry) a subscription and request the card-saving payment.
    pub async fn initiate(
        &self,
        user: UserId,
        tariff: Tariff,
        amount_minor: i64,
    ) -> Result<Initiated, BillingError> {
        let now = Utc::now();
        let subscription = match subscriptions::open_pending(
            &self.db,
            user,
            tariff,
            amount_minor,
            now,
            now + self.settings.period,
        )
        .await?
        {
            PendingOutcome::Opened(sub) => sub,
            PendingOutcome::AlreadyActive(_) => return Err(BillingError::AlreadySubscribed),
        };

        let customer_id = users::get_user(&self.db, user)
            .await?
            .and_then(|u| u.acq_customer_token)
            .unwrap_or_else(|| format!("user-{}", user.0));
        let order_id = format_order_id(SUBSCRIPTION_PREFIX, user, now);
        let request = InitialPaymentRequest {
            user_id: user,
            amount_minor,
            customer_id,
            return_url: self.return_url(&order_id),
            description: self.settings.description.clone(),
            order_id,
        };
        let key = self.keys.next(user);
        let payment = self.acquirer.create_initial_payment(&request, &key).await?;
        subscriptions::set_subscription_payment(&self.db, subscription.id, &payment.id).await?;

        let confirmation_url = payment
            .confirmation_url()
            .map(str::to_string)
            .ok_or_else(|| BillingError::MissingConfirmation(payment.id.clone()))?;
        info!(
            user_id = %user,
            subscription_id = subscription.id,
            payment_id = %payment.id,
            "initial payment requested"
        );
        Ok(Initiated {
            subscription,
            payment,
            confirmation_url,
        })
    }

    /// Apply a confirmed payment reported by the acquirer. Keyed on
    /// `payment_token`: repeated deliveries change nothing.
    pub async fn activate_from_webhook(
        &self,
        user: UserId,
        customer_token: &str,
        method_token: &str,
        payment_token: &str,
        amount_minor: i64,
    ) -> Result<ActivationOutcome, BillingError> {
        self.activate_at(user, customer_token, method_token, payment_token, amount_minor, Utc::now())
            .await
    }

    pub async fn activate_at(
        &self,
        user: UserId,
        customer_token: &str,
        method_token: &str,
        payment_token: &str,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Result<ActivationOutcome, BillingError> {
        let outcome = subscriptions::activate(
            &self.db,
            Activation {
                user,
                customer_token: customer_token.to_string(),
                method_token: method_token.to_string(),
                payment_token: payment_token.to_string(),
                amount: amount_minor,
                now,
                next_payment: now + self.settings.period,
            },
        )
        .await?;
        match &outcome {
            ActivationOutcome::Activated(sub) => info!(
                user_id = %user,
                subscription_id = sub.id,
                payment_id = payment_token,
                "subscription activated"
            ),
            ActivationOutcome::Duplicate(_) => debug!(
                user_id = %user,
                payment_id = payment_token,
                "payment already applied"
            ),
        }
        Ok(outcome)
    }

    /// Stop renewals. The paid tariff lasts until `next_payment`.
    pub async fn cancel(&self, user: UserId) -> Result<Option<Subscription>, BillingError> {
        let cancelled = subscriptions::cancel(&self.db, user, Utc::now()).await?;
        if let Some(sub) = &cancelled {
            info!(user_id = %user, subscription_id = sub.id, "subscription cancelled");
        }
        Ok(cancelled)
    }

    /// The user's current active or pending subscription.
    pub async fn current(&self, user: UserId) -> Result<Option<Subscription>, BillingError> {
        Ok(subscriptions::get_active(&self.db, user).await?)
    }

    pub async fn due_for_renewal(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, BillingError> {
        Ok(subscriptions::due_for_renewal(&self.db, now).await?)
    }

    /// Charge the saved card for the subscription's amount.
    ///
    /// The idempotency key and order id are derived from `next_payment`, so
    /// retries of an unpaid period repeat the same request.
    pub async fn charge_recurring(
        &self,
        sub: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, BillingError> {
        let intent = match sub.next_payment {
            Some(due) => ChargeIntent {
                key: IdempotencyKeys::for_period(sub.user_id, due),
                order_id: format_order_id(PAYMENT_PREFIX, sub.user_id, due),
            },
            None => self.fresh_intent(sub.user_id, now),
        };
        self.charge(sub, sub.amount, intent, now).await
    }

    fn fresh_intent(&self, user: UserId, now: DateTime<Utc>) -> ChargeIntent {
        ChargeIntent {
            key: self.keys.next(user),
            order_id: format_order_id(PAYMENT_PREFIX, user, now),
        }
    }

    async fn charge(
        &self,
        sub: &Subscription,
        amount_minor: i64,
        intent: ChargeIntent,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, BillingError> {
        let method = sub
            .acq_method_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(BillingError::MissingPaymentMethod(sub.id))?;
        let request = RecurringPaymentRequest {
            user_id: sub.user_id,
            amount_minor,
            customer_id: sub
                .acq_customer_token
                .clone()
                .unwrap_or_else(|| format!("user-{}", sub.user_id.0)),
            payment_method_id: method,
            description: self.settings.description.clone(),
            order_id: intent.order_id,
        };

        let outcome = match self
            .acquirer
            .create_recurring_payment(&request, &intent.key)
            .await
        {
            Ok(payment) => match payment.status {
                PaymentStatus::Succeeded => {
                    let fresh = subscriptions::record_renewal(
                        &self.db,
                        sub.id,
                        &payment.id,
                        amount_minor,
                        now,
                        now + self.settings.period,
                    )
                    .await?;
                    info!(
                        user_id = %sub.user_id,
                        subscription_id = sub.id,
                        payment_id = %payment.id,
                        fresh,
                        "subscription renewed"
                    );
                    RenewalOutcome::Renewed(payment)
                }
                PaymentStatus::Pending | PaymentStatus::WaitingForCapture => {
                    subscriptions::defer_renewal(
                        &self.db,
                        sub.id,
                        now + self.settings.pending_settle,
                        &payment.id,
                    )
                    .await?;
                    info!(
                        user_id = %sub.user_id,
                        payment_id = %payment.id,
                        "recurring charge pending, deferring next attempt"
                    );
                    RenewalOutcome::Pending(payment)
                }
                PaymentStatus::Canceled => {
                    let reason = payment
                        .cancellation_details
                        .as_ref()
                        .map(|d| d.reason.clone())
                        .unwrap_or_else(|| "canceled".into());
                    self.fail(sub, Some(payment), reason).await?
                }
            },
            Err(VoxpostError::Cancelled) => return Err(VoxpostError::Cancelled.into()),
            Err(e) => self.fail(sub, None, e.to_string()).await?,
        };
        voxpost_prometheus::record_renewal(outcome.label());
        Ok(outcome)
    }

    async fn fail(
        &self,
        sub: &Subscription,
        payment: Option<Payment>,
        error: String,
    ) -> Result<RenewalOutcome, BillingError> {
        let updated =
            subscriptions::record_failure(&self.db, sub.id, &error, self.settings.max_failures)
                .await?;
        let expired = !updated.active;
        if expired {
            error!(
                user_id = %sub.user_id,
                subscription_id = sub.id,
                failures = updated.failure_count,
                %error,
                "subscription expired after repeated charge failures"
            );
        } else {
            warn!(
                user_id = %sub.user_id,
                subscription_id = sub.id,
                failures = updated.failure_count,
                %error,
                "recurring charge failed"
            );
        }
        Ok(RenewalOutcome::Failed {
            payment,
            error,
            expired,
        })
    }

    /// Ops: charge the user's active subscription now with `amount_minor`.
    pub async fn force_charge(
        &self,
        user: UserId,
        amount_minor: i64,
    ) -> Result<Payment, BillingError> {
        let sub = subscriptions::get_active(&self.db, user)
            .await?
            .filter(|s| s.status == voxpost_storage::SubscriptionStatus::Active)
            .ok_or(BillingError::NotSubscribed)?;
        let now = Utc::now();
        let intent = self.fresh_intent(user, now);
        match self.charge(&sub, amount_minor, intent, now).await? {
            RenewalOutcome::Renewed(payment)
            | RenewalOutcome::Pending(payment)
            | RenewalOutcome::Failed {
                payment: Some(payment),
                ..
            } => Ok(payment),
            RenewalOutcome::Failed { error, .. } => Err(BillingError::ChargeFailed(error)),
        }
    }

    /// Downgrade users whose cancelled subscriptions have run out.
    pub async fn downgrade_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<UserId>, BillingError> {
        let users = subscriptions::downgrade_lapsed(&self.db, now).await?;
        for user in &users {
            info!(user_id = %user, "paid period over, downgraded to free");
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = VoxpostConfig::default();
        config.billing.period_days = 7;
        config.billing.pending_settle_hours = 2;
        let settings = BillingSettings::from_config(&config);
        assert_eq!(settings.period, Duration::days(7));
        assert_eq!(settings.pending_settle, Duration::hours(2));
        assert_eq!(settings.max_failures, 3);
    }

    #[test]
    fn outcome_labels() {
        let failed = RenewalOutcome::Failed {
            payment: None,
            error: "500".into(),
            expired: false,
        };
        assert_eq!(failed.label(), "failed");
        let expired = RenewalOutcome::Failed {
            payment: None,
            error: "500".into(),
            expired: true,
        };
        assert_eq!(expired.label(), "expired");
    }
}

// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock card acquirer.
//!
//! Initial payments come back `pending` with a confirmation URL. Recurring
//! charges follow a FIFO script and succeed once it runs dry. Every payment
//! created is remembered so `get_payment` can return it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use voxpost_core::payment::{CancellationDetails, Confirmation, CustomerRef, PaymentMethod};
use voxpost_core::{
    AcquirerAdapter, AdapterType, Amount, HealthStatus, InitialPaymentRequest, Payment,
    PaymentStatus, PluginAdapter, RecurringPaymentRequest, UserId, VoxpostError,
};

/// Scripted result of one recurring charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeScript {
    Succeed,
    Pending,
    Decline,
    /// Fail with this HTTP status.
    Status(u16),
}

/// A settled card payment, as the acquirer reports it after confirmation.
pub fn succeeded_payment(
    id: &str,
    user: UserId,
    customer: &str,
    method: &str,
    amount_minor: i64,
) -> Payment {
    let mut payment = bare_payment(id, PaymentStatus::Succeeded, user, amount_minor);
    payment.paid = true;
    payment.customer = Some(CustomerRef {
        id: customer.to_string(),
    });
    payment.payment_method = Some(PaymentMethod {
        id: method.to_string(),
        method_type: Some("bank_card".to_string()),
        saved: true,
    });
    payment
}

fn bare_payment(id: &str, status: PaymentStatus, user: UserId, amount_minor: i64) -> Payment {
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "user_id".to_string(),
        serde_json::Value::String(user.0.to_string()),
    );
    Payment {
        id: id.to_string(),
        status,
        amount: Amount::from_minor(amount_minor),
        description: None,
        payment_method: None,
        customer: None,
        confirmation: None,
        metadata,
        paid: false,
        created_at: None,
        cancellation_details: None,
    }
}

pub struct MockAcquirer {
    charges: Mutex<VecDeque<ChargeScript>>,
    payments: Mutex<HashMap<String, Payment>>,
    initial: Mutex<Vec<(InitialPaymentRequest, String)>>,
    recurring: Mutex<Vec<(RecurringPaymentRequest, String)>>,
    seq: AtomicU64,
}

impl MockAcquirer {
    pub fn new() -> Self {
        Self {
            charges: Mutex::new(VecDeque::new()),
            payments: Mutex::new(HashMap::new()),
            initial: Mutex::new(Vec::new()),
            recurring: Mutex::new(Vec::new()),
            seq: AtomicU64::new(1),
        }
    }

    pub async fn script_charge(&self, script: ChargeScript) {
        self.charges.lock().await.push_back(script);
    }

    /// Make `get_payment` return this object.
    pub async fn insert_payment(&self, payment: Payment) {
        self.payments.lock().await.insert(payment.id.clone(), payment);
    }

    /// Initial payment requests with their idempotency keys.
    pub async fn initial_requests(&self) -> Vec<(InitialPaymentRequest, String)> {
        self.initial.lock().await.clone()
    }

    /// Recurring charge requests with their idempotency keys.
    pub async fn recurring_requests(&self) -> Vec<(RecurringPaymentRequest, String)> {
        self.recurring.lock().await.clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.seq.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for MockAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockAcquirer {
    fn name(&self) -> &str {
        "mock-acquirer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Acquirer
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl AcquirerAdapter for MockAcquirer {
    async fn create_initial_payment(
        &self,
        request: &InitialPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError> {
        self.initial
            .lock()
            .await
            .push((request.clone(), idempotency_key.to_string()));

        let id = self.next_id("pay");
        let mut payment = bare_payment(&id, PaymentStatus::Pending, request.user_id, request.amount_minor);
        payment.description = Some(request.description.clone());
        payment.customer = Some(CustomerRef {
            id: request.customer_id.clone(),
        });
        payment.confirmation = Some(Confirmation {
            kind: "redirect".to_string(),
            confirmation_url: Some(format!("https://pay.example/confirm/{id}")),
            return_url: Some(request.return_url.clone()),
        });
        payment.metadata.insert(
            "order_id".to_string(),
            serde_json::Value::String(request.order_id.clone()),
        );
        self.insert_payment(payment.clone()).await;
        Ok(payment)
    }

    async fn create_recurring_payment(
        &self,
        request: &RecurringPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError> {
        self.recurring
            .lock()
            .await
            .push((request.clone(), idempotency_key.to_string()));

        let script = self
            .charges
            .lock()
            .await
            .pop_front()
            .unwrap_or(ChargeScript::Succeed);
        let id = self.next_id("rec");
        let mut payment = match script {
            ChargeScript::Succeed => succeeded_payment(
                &id,
                request.user_id,
                &request.customer_id,
                &request.payment_method_id,
                request.amount_minor,
            ),
            ChargeScript::Pending => {
                bare_payment(&id, PaymentStatus::Pending, request.user_id, request.amount_minor)
            }
            ChargeScript::Decline => {
                let mut p =
                    bare_payment(&id, PaymentStatus::Canceled, request.user_id, request.amount_minor);
                p.cancellation_details = Some(CancellationDetails {
                    party: "payment_network".to_string(),
                    reason: "insufficient_funds".to_string(),
                });
                p
            }
            ChargeScript::Status(status) => {
                return Err(VoxpostError::Acquirer {
                    message: format!("mock acquirer answered {status}"),
                    status: Some(status),
                    source: None,
                });
            }
        };
        payment.description = Some(request.description.clone());
        self.insert_payment(payment.clone()).await;
        Ok(payment)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, VoxpostError> {
        self.payments
            .lock()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| VoxpostError::Acquirer {
                message: format!("payment {payment_id} not found"),
                status: Some(404),
                source: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recurring(user: i64) -> RecurringPaymentRequest {
        RecurringPaymentRequest {
            user_id: UserId(user),
            amount_minor: 99_000,
            customer_id: "cust".into(),
            payment_method_id: "pm".into(),
            description: "renewal".into(),
            order_id: "pay_1_20260101000000".into(),
        }
    }

    #[tokio::test]
    async fn charges_follow_the_script() {
        let acquirer = MockAcquirer::new();
        acquirer.script_charge(ChargeScript::Status(500)).await;
        acquirer.script_charge(ChargeScript::Decline).await;

        assert!(acquirer.create_recurring_payment(&recurring(1), "k1").await.is_err());
        let declined = acquirer.create_recurring_payment(&recurring(1), "k2").await.unwrap();
        assert_eq!(declined.status, PaymentStatus::Canceled);
        let ok = acquirer.create_recurring_payment(&recurring(1), "k3").await.unwrap();
        assert_eq!(ok.status, PaymentStatus::Succeeded);

        let fetched = acquirer.get_payment(&ok.id).await.unwrap();
        assert_eq!(fetched, ok);
        assert_eq!(acquirer.recurring_requests().await.len(), 3);
    }

    #[test]
    fn succeeded_payment_carries_tokens() {
        let p = succeeded_payment("p_77", UserId(77), "cust_77", "pm_77", 99_000);
        assert_eq!(p.metadata_user_id(), Some(UserId(77)));
        assert_eq!(p.amount.to_minor(), Some(99_000));
        assert_eq!(p.payment_method.unwrap().id, "pm_77");
    }
}

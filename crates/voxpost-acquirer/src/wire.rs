// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request bodies for `POST /payments`.

use std::collections::BTreeMap;

use serde::Serialize;
use voxpost_core::payment::{Amount, CustomerRef};
use voxpost_core::{InitialPaymentRequest, RecurringPaymentRequest};

#[derive(Debug, Serialize)]
pub(crate) struct RedirectConfirmation<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePayment<'a> {
    pub amount: Amount,
    pub capture: bool,
    pub description: &'a str,
    pub customer: CustomerRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_payment_method: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<RedirectConfirmation<'a>>,
    pub metadata: BTreeMap<&'static str, String>,
}

fn metadata(user: i64, order_id: &str) -> BTreeMap<&'static str, String> {
    BTreeMap::from([("user_id", user.to_string()), ("order_id", order_id.to_string())])
}

impl<'a> CreatePayment<'a> {
    pub fn initial(req: &'a InitialPaymentRequest) -> Self {
        Self {
            amount: Amount::from_minor(req.amount_minor),
            capture: true,
            description: &req.description,
            customer: CustomerRef {
                id: req.customer_id.clone(),
            },
            save_payment_method: Some(true),
            payment_method_id: None,
            confirmation: Some(RedirectConfirmation {
                kind: "redirect",
                return_url: &req.return_url,
            }),
            metadata: metadata(req.user_id.0, &req.order_id),
        }
    }

    pub fn recurring(req: &'a RecurringPaymentRequest) -> Self {
        Self {
            amount: Amount::from_minor(req.amount_minor),
            capture: true,
            description: &req.description,
            customer: CustomerRef {
                id: req.customer_id.clone(),
            },
            save_payment_method: None,
            payment_method_id: Some(&req.payment_method_id),
            confirmation: None,
            metadata: metadata(req.user_id.0, &req.order_id),
        }
    }
}

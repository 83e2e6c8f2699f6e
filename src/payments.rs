use crate::directory::AccountDirectory;
use crate::error::{RelayError, Result};
use crate::psp::{Charge, PaymentProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChargeRequest {
    pub account_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: String,
    pub amount: i64,
    pub status: String,
}

impl From<Charge> for PaymentView {
    fn from(charge: Charge) -> Self {
        Self {
            id: charge.id,
            amount: charge.amount,
            status: charge.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCollection {
    pub payments: Vec<PaymentView>,
}

pub struct PaymentService {
    directory: Arc<dyn AccountDirectory>,
    provider: Arc<dyn PaymentProvider>,
    currency: String,
}

impl PaymentService {
    pub fn new(directory: Arc<dyn AccountDirectory>, provider: Arc<dyn PaymentProvider>, currency: impl Into<String>) -> Self {
        Self {
            directory,
            provider,
            currency: currency.into(),
        }
    }

    pub async fn create_charge(&self, req: ChargeRequest) -> Result<PaymentView> {
        validate_account_id(&req.account_id)?;
        if req.amount <= 0 {
            return Err(RelayError::Validation(format!(
                "Amount, {}, is invalid. It must be a positive integer.",
                req.amount
            )));
        }

        let customer_id = self.directory.resolve_or_create(&req.account_id).await?;

        let charge = self
            .provider
            .create_charge(req.amount, &self.currency, &customer_id)
            .await
            .map_err(|source| RelayError::Gateway {
                account_id: req.account_id.clone(),
                source,
            })?;
        self.directory.mark_charged(&req.account_id).await;

        tracing::info!(
            account_id = %req.account_id,
            charge_id = %charge.id,
            amount = charge.amount,
            currency = %charge.currency,
            status = %charge.status,
            "charge created"
        );
        Ok(charge.into())
    }

    pub async fn list_charges(&self, account_id: &str) -> Result<PaymentCollection> {
        let customer_id = self
            .directory
            .lookup(account_id)
            .await
            .ok_or_else(|| RelayError::NotFound("This account does not exist or has no charges.".to_string()))?;

        let charges = self
            .provider
            .list_charges(&customer_id)
            .await
            .map_err(|source| RelayError::Listing {
                account_id: account_id.to_string(),
                source,
            })?;

        tracing::debug!(account_id, count = charges.len(), "listed charges");
        Ok(PaymentCollection {
            payments: charges.into_iter().map(PaymentView::from).collect(),
        })
    }
}

fn validate_account_id(account_id: &str) -> Result<()> {
    if account_id.trim().is_empty() {
        return Err(RelayError::Validation("account_id must not be empty.".to_string()));
    }
    if account_id.contains('/') {
        return Err(RelayError::Validation("account_id must not contain '/'.".to_string()));
    }
    Ok(())
}

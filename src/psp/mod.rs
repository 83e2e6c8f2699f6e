pub mod mock;
pub mod stripe;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A charge as recorded by the payment processor.
#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Provisions a new processor customer for `account_id` and returns its id.
    async fn create_customer(&self, account_id: &str) -> Result<String>;

    async fn create_charge(&self, amount: i64, currency: &str, customer_id: &str) -> Result<Charge>;

    /// Every charge of `customer_id`, in processor order.
    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>>;
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PspConfig {
    pub provider: String,
    pub api_key: String,
    pub api_base: String,
    pub customer_source: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PspConfig {
    fn default() -> Self {
        Self {
            provider: "Stripe".to_string(),
            api_key: String::new(),
            api_base: stripe::DEFAULT_API_BASE.to_string(),
            customer_source: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for PspConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("PspConfig")
            .field("provider", &self.provider)
            .field("api_key", &key)
            .field("api_base", &self.api_base)
            .field("customer_source", &self.customer_source)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

pub fn build_provider(cfg: &PspConfig) -> Result<Arc<dyn PaymentProvider>> {
    match cfg.provider.as_str() {
        "Mock" => Ok(Arc::new(mock::MockProvider::new())),
        "Stripe" => {
            if cfg.api_key.is_empty() {
                anyhow::bail!("Stripe provider requires an API key (set PAYMENT_RELAY_API_KEY)");
            }
            // charges against a customer without a source are always declined
            if cfg.customer_source.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("Stripe provider requires a customer payment source (set PAYMENT_RELAY_CUSTOMER_SOURCE)");
            }
            Ok(Arc::new(stripe::StripeProvider::new(cfg)?))
        }
        other => anyhow::bail!("Unknown payment provider: {}", other),
    }
}

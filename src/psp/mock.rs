use super::{Charge, PaymentProvider};
use anyhow::Result;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process stand-in for a processor: customers and charges live in memory.
pub struct MockProvider {
    customers: Mutex<HashMap<String, Vec<Charge>>>,
}

fn mock_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            customers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn customer_count(&self) -> usize {
        self.customers.lock().await.len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn create_customer(&self, _account_id: &str) -> Result<String> {
        let id = mock_id("cus");
        self.customers.lock().await.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn create_charge(&self, amount: i64, currency: &str, customer_id: &str) -> Result<Charge> {
        let mut customers = self.customers.lock().await;
        let charges = customers
            .get_mut(customer_id)
            .ok_or_else(|| anyhow::anyhow!("No such customer: '{}'", customer_id))?;

        let charge = Charge {
            id: mock_id("ch"),
            amount,
            currency: currency.to_string(),
            status: "succeeded".to_string(),
        };
        // newest first, like a real processor listing
        charges.insert(0, charge.clone());
        Ok(charge)
    }

    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>> {
        self.customers
            .lock()
            .await
            .get(customer_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No such customer: '{}'", customer_id))
    }
}

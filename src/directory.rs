//! Account to processor-customer bindings.
//!
//! A binding is created the first time an account is charged and lives for
//! the rest of the process. Nothing is persisted. An account only becomes
//! visible to [`AccountDirectory::lookup`] once a charge against it went
//! through.

use crate::error::{RelayError, Result};
use crate::psp::PaymentProvider;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Returns the bound customer, provisioning one with the processor if the
    /// account has none yet.
    async fn resolve_or_create(&self, account_id: &str) -> Result<String>;

    /// Records that a charge for `account_id` succeeded.
    async fn mark_charged(&self, account_id: &str);

    /// Customer of an account with at least one successful charge. Pure
    /// read; never provisions.
    async fn lookup(&self, account_id: &str) -> Option<String>;
}

struct Binding {
    customer_id: String,
    charged: AtomicBool,
}

type BindingCell = Arc<OnceCell<Binding>>;

/// Each account owns a cell that is filled at most once. Concurrent first
/// charges for the same account all wait on the same provisioning call; a
/// failed call leaves nothing behind for the next request to trip over.
pub struct InMemoryDirectory {
    provider: Arc<dyn PaymentProvider>,
    bindings: Arc<DashMap<String, BindingCell>>,
}

impl InMemoryDirectory {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            provider,
            bindings: Arc::new(DashMap::new()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.bindings.iter().filter(|entry| entry.value().initialized()).count()
    }

    fn cell(&self, account_id: &str) -> BindingCell {
        // the shard guard is dropped before any await
        self.bindings
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }

    fn binding<T>(&self, account_id: &str, f: impl FnOnce(&Binding) -> T) -> Option<T> {
        self.bindings
            .get(account_id)
            .and_then(|entry| entry.value().get().map(f))
    }
}

/// Fills `cell` through the processor. Runs as its own task so a caller that
/// goes away mid-request cannot abandon a customer the processor already made.
async fn provision(
    provider: Arc<dyn PaymentProvider>,
    bindings: Arc<DashMap<String, BindingCell>>,
    account_id: String,
    cell: BindingCell,
) -> Result<String> {
    let result = cell
        .get_or_try_init(|| async {
            let customer_id = provider
                .create_customer(&account_id)
                .await
                .map_err(|source| RelayError::Provisioning {
                    account_id: account_id.clone(),
                    source,
                })?;
            tracing::info!(account_id = %account_id, customer_id = %customer_id, provider = provider.name(), "bound account to new customer");
            Ok::<_, RelayError>(Binding {
                customer_id,
                charged: AtomicBool::new(false),
            })
        })
        .await;

    match result {
        Ok(binding) => Ok(binding.customer_id.clone()),
        Err(err) => {
            // drop the empty cell unless another caller is still waiting on it
            bindings.remove_if(&account_id, |_, c| {
                Arc::ptr_eq(c, &cell) && !c.initialized() && Arc::strong_count(c) <= 2
            });
            Err(err)
        }
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn resolve_or_create(&self, account_id: &str) -> Result<String> {
        let cell = self.cell(account_id);
        if let Some(binding) = cell.get() {
            return Ok(binding.customer_id.clone());
        }

        let task = tokio::spawn(provision(
            self.provider.clone(),
            self.bindings.clone(),
            account_id.to_string(),
            cell,
        ));

        task.await.map_err(|e| RelayError::Provisioning {
            account_id: account_id.to_string(),
            source: anyhow::Error::new(e),
        })?
    }

    async fn mark_charged(&self, account_id: &str) {
        self.binding(account_id, |b| b.charged.store(true, Ordering::Release));
    }

    async fn lookup(&self, account_id: &str) -> Option<String> {
        self.binding(account_id, |b| {
            b.charged.load(Ordering::Acquire).then(|| b.customer_id.clone())
        })
        .flatten()
    }
}

//! HTTP relay that charges accounts through a payment processor and lists
//! their past charges.
//!
//! - [`psp`] - processor clients (Stripe, in-memory mock)
//! - [`directory`] - account to processor-customer bindings
//! - [`payments`] - create and list charges
//! - [`routes`] - HTTP surface

pub mod config;
pub mod directory;
pub mod error;
pub mod payments;
pub mod psp;
pub mod routes;

use axum::Router;
use directory::InMemoryDirectory;
use payments::PaymentService;
use psp::PaymentProvider;
use std::sync::Arc;

pub fn create_app(provider: Arc<dyn PaymentProvider>, currency: &str) -> Router {
    let directory = Arc::new(InMemoryDirectory::new(provider.clone()));
    let service = Arc::new(PaymentService::new(directory, provider, currency));
    routes::create_routes(service)
}

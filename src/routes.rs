use crate::error::RelayError;
use crate::payments::{ChargeRequest, PaymentCollection, PaymentService, PaymentView};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, DefaultBodyLimit, Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_routes(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/postPayment", post(post_payment).fallback(unknown_url))
        .route("/:account_id/payments", get(list_payments).fallback(unknown_url))
        .fallback(unknown_url)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn post_payment(
    State(service): State<Arc<PaymentService>>,
    payload: Result<Json<ChargeRequest>, JsonRejection>,
) -> Result<Json<PaymentView>, RelayError> {
    let Json(req) = payload
        .map_err(|rejection| RelayError::Validation(format!("Invalid payment request: {}", rejection.body_text())))?;
    Ok(Json(service.create_charge(req).await?))
}

async fn list_payments(
    State(service): State<Arc<PaymentService>>,
    account_id: Result<Path<String>, PathRejection>,
) -> Result<Json<PaymentCollection>, RelayError> {
    let Path(account_id) = account_id.map_err(|_| RelayError::unknown_url())?;
    Ok(Json(service.list_charges(&account_id).await?))
}

async fn unknown_url() -> RelayError {
    RelayError::unknown_url()
}

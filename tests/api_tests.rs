use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use payment_relay::create_app;
use payment_relay::psp::mock::MockProvider;
use payment_relay::psp::{Charge, PaymentProvider};

/// Processor stub that hands out sequential ids and records every charge.
#[derive(Default)]
struct StubProvider {
    customers: AtomicUsize,
    charges: Mutex<Vec<(String, Charge)>>,
    fail_customers: AtomicBool,
    fail_charges: AtomicBool,
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn name(&self) -> &str {
        "Stub"
    }

    async fn create_customer(&self, _account_id: &str) -> anyhow::Result<String> {
        if self.fail_customers.load(Ordering::SeqCst) {
            anyhow::bail!("customer creation refused");
        }
        let n = self.customers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_{}", n))
    }

    async fn create_charge(&self, amount: i64, currency: &str, customer_id: &str) -> anyhow::Result<Charge> {
        if self.fail_charges.load(Ordering::SeqCst) {
            anyhow::bail!("card declined");
        }
        let mut charges = self.charges.lock().await;
        let charge = Charge {
            id: format!("ch_{}", charges.len() + 1),
            amount,
            currency: currency.to_string(),
            status: "succeeded".to_string(),
        };
        charges.push((customer_id.to_string(), charge.clone()));
        Ok(charge)
    }

    async fn list_charges(&self, customer_id: &str) -> anyhow::Result<Vec<Charge>> {
        let charges = self.charges.lock().await;
        Ok(charges
            .iter()
            .filter(|(owner, _)| owner == customer_id)
            .map(|(_, charge)| charge.clone())
            .collect())
    }
}

fn app_with(provider: Arc<StubProvider>) -> Router {
    create_app(provider, "usd")
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn charge_then_list_round_trip() {
    let app = app_with(Arc::new(StubProvider::default()));

    let (status, body) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_1","amount":500}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "ch_1", "amount": 500, "status": "succeeded"}));

    let (status, body) = send(&app, get("/acct_1/payments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"payments": [{"id": "ch_1", "amount": 500, "status": "succeeded"}]}));
}

#[tokio::test]
async fn repeated_charges_share_one_customer() {
    let provider = Arc::new(StubProvider::default());
    let app = app_with(provider.clone());

    for amount in [100, 200, 300] {
        let body = json!({"account_id": "acct_1", "amount": amount}).to_string();
        let (status, _) = send(&app, post_json("/postPayment", &body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(provider.customers.load(Ordering::SeqCst), 1);
    let (_, body) = send(&app, get("/acct_1/payments")).await;
    assert_eq!(body["payments"].as_array().map(Vec::len), Some(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_charges_bind_one_customer() {
    let provider = Arc::new(MockProvider::new());
    let app = create_app(provider.clone(), "usd");

    let mut handles = Vec::new();
    for _ in 0..12 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            send(&app, post_json("/postPayment", r#"{"account_id":"acct_new","amount":250}"#)).await
        }));
    }
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(provider.customer_count().await, 1);
    let (_, body) = send(&app, get("/acct_new/payments")).await;
    assert_eq!(body["payments"].as_array().map(Vec::len), Some(12));
}

#[tokio::test]
async fn listing_unknown_account_is_an_error_not_an_empty_list() {
    let app = app_with(Arc::new(StubProvider::default()));

    let (status, body) = send(&app, get("/acct_ghost/payments")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "This account does not exist or has no charges."}));
}

#[tokio::test]
async fn zero_and_negative_amounts_are_rejected() {
    let provider = Arc::new(StubProvider::default());
    let app = app_with(provider.clone());

    for amount in [0, -1] {
        let body = json!({"account_id": "acct_1", "amount": amount}).to_string();
        let (status, body) = send(&app, post_json("/postPayment", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("is invalid"));
    }
    assert_eq!(provider.customers.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = app_with(Arc::new(StubProvider::default()));

    let bodies = [
        r#"{"account_id":"acct_1","amount":"lots"}"#,
        r#"{"account_id":"acct_1","amount":12.5}"#,
        r#"{"account_id":"acct_1"}"#,
        r#"{"account_id":"acct_1","amount":100,"currency":"eur"}"#,
        "not json",
    ];
    for body in bodies {
        let (status, response) = send(&app, post_json("/postPayment", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(response["message"].as_str().unwrap().starts_with("Invalid payment request"));
    }

    // the process is still serving
    let (status, _) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_1","amount":1}"#)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app_with(Arc::new(StubProvider::default()));
    let padding = "x".repeat(payment_relay::routes::MAX_BODY_BYTES);
    let body = json!({"account_id": padding, "amount": 1}).to_string();

    let (status, response) = send(&app, post_json("/postPayment", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["message"].is_string());
}

#[tokio::test]
async fn unknown_routes_and_methods_get_the_generic_error() {
    let app = app_with(Arc::new(StubProvider::default()));
    let expected = json!({"message": "The requested URL does not exist."});

    let requests = [
        get("/"),
        get("/postPayment"),
        get("/payments/acct_1"),
        get("/a/b/payments"),
        get("/acct_1/payments/extra"),
        post_json("/acct_1/payments", "{}"),
        post_json("/charges", "{}"),
    ];
    for request in requests {
        let uri = request.uri().to_string();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {}", uri);
        assert_eq!(body, expected, "uri: {}", uri);
    }
}

#[tokio::test]
async fn provisioning_failure_stores_no_binding() {
    let provider = Arc::new(StubProvider::default());
    provider.fail_customers.store(true, Ordering::SeqCst);
    let app = app_with(provider.clone());

    let (status, body) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_1","amount":500}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "There was a problem creating a customer for account, acct_1. Please try making the purchase again."
    );

    let (status, _) = send(&app, get("/acct_1/payments")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_failure_is_reported_without_the_cause() {
    let provider = Arc::new(StubProvider::default());
    provider.fail_charges.store(true, Ordering::SeqCst);
    let app = app_with(provider.clone());

    let (status, body) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_1","amount":500}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "There was a problem charging account, acct_1. Please try charging again."}));
}

#[tokio::test]
async fn account_without_a_successful_charge_cannot_list() {
    let provider = Arc::new(StubProvider::default());
    provider.fail_charges.store(true, Ordering::SeqCst);
    let app = app_with(provider.clone());

    let (status, _) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_x","amount":500}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/acct_x/payments")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "This account does not exist or has no charges."}));

    // once a charge goes through, the customer made for the failed attempt is reused
    provider.fail_charges.store(false, Ordering::SeqCst);
    let (status, _) = send(&app, post_json("/postPayment", r#"{"account_id":"acct_x","amount":700}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.customers.load(Ordering::SeqCst), 1);

    let (status, body) = send(&app, get("/acct_x/payments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"payments": [{"id": "ch_1", "amount": 700, "status": "succeeded"}]}));
}

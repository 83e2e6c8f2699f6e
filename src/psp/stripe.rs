use super::{Charge, PaymentProvider, PspConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

const PAGE_LIMIT: &str = "100";

pub struct StripeProvider {
    api_key: String,
    api_base: String,
    customer_source: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Deserialize)]
struct StripeCharge {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeChargeList {
    #[serde(default)]
    data: Vec<StripeCharge>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl From<StripeCharge> for Charge {
    fn from(sc: StripeCharge) -> Self {
        Charge {
            id: sc.id,
            amount: sc.amount,
            currency: sc.currency,
            status: sc.status,
        }
    }
}

impl StripeProvider {
    pub fn new(cfg: &PspConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("failed to build Stripe HTTP client")?;

        Ok(Self {
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            customer_source: cfg.customer_source.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form<T: serde::de::DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let resp = self.client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .form(params)
            .send()
            .await?;

        read_response(resp).await
    }
}

async fn read_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Stripe API error: {}", describe_error(status, &body));
    }
    Ok(resp.json().await?)
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(StripeErrorBody { error: StripeErrorDetail { message: Some(msg), kind } }) => match kind {
            Some(kind) => format!("{} ({}): {}", status, kind, msg),
            None => format!("{}: {}", status, msg),
        },
        _ => status.to_string(),
    }
}

fn customer_params(account_id: &str, source: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("metadata[account_id]", account_id.to_string())];
    if let Some(source) = source {
        params.push(("source", source.to_string()));
    }
    params
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "Stripe"
    }

    async fn create_customer(&self, account_id: &str) -> Result<String> {
        let params = customer_params(account_id, self.customer_source.as_deref());
        let customer: StripeCustomer = self.post_form("/v1/customers", &params).await?;
        Ok(customer.id)
    }

    async fn create_charge(&self, amount: i64, currency: &str, customer_id: &str) -> Result<Charge> {
        let params = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("customer", customer_id.to_string()),
        ];
        let charge: StripeCharge = self.post_form("/v1/charges", &params).await?;
        Ok(charge.into())
    }

    async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>> {
        let mut charges = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![("customer", customer_id.to_string()), ("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let resp = self.client
                .get(self.url("/v1/charges"))
                .bearer_auth(&self.api_key)
                .query(&query)
                .send()
                .await?;

            let page: StripeChargeList = read_response(resp).await?;
            starting_after = page.data.last().map(|c| c.id.clone());
            charges.extend(page.data.into_iter().map(Charge::from));

            if !page.has_more || starting_after.is_none() {
                break;
            }
        }

        Ok(charges)
    }
}

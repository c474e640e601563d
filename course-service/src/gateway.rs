use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PaymentConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in the currency's minor units.
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent>;
}

/// Talks to a Stripe-compatible `/v1/payment_intents` endpoint.
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(client: Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("payment gateway request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("payment gateway returned {status}: {body}"));
        }
        resp.json::<PaymentIntent>()
            .await
            .context("payment gateway response was not a payment intent")
    }
}

/// Local stand-in used when no gateway key is configured.
pub struct StubGateway;

impl StubGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent> {
        let id = format!("pi_stub_{}", Uuid::new_v4().simple());
        info!(amount, currency, intent = %id, "created stub payment intent");
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret_stub"),
            id,
        })
    }
}

pub fn gateway_from_config(config: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    match &config.secret_key {
        Some(key) => Arc::new(StripeGateway::new(Client::new(), &config.api_base, key)),
        None => {
            warn!("PAYMENT_SECRET_KEY not set; using stub payment gateway");
            Arc::new(StubGateway::new())
        }
    }
}

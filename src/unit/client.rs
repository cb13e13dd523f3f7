//! Unit → coordinator transport.

use crate::coordinator::protocol::{
    DeregisterRequest, DeregisterResponse, ENDPOINT_DEREGISTER, ENDPOINT_REGISTER,
    RegisterRequest, RegisterResponse,
};

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn register(&self, unit_id: &str, address: &str) -> Result<RegisterResponse>;

    async fn deregister(&self, unit_id: &str) -> Result<DeregisterResponse>;
}

pub struct HttpCoordinatorClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpCoordinatorClient {
    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    async fn register(&self, unit_id: &str, address: &str) -> Result<RegisterResponse> {
        let payload = RegisterRequest {
            id: unit_id.to_string(),
            address: address.to_string(),
        };

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, ENDPOINT_REGISTER))
            .json(&payload)
            .timeout(REGISTER_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Registration failed: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    async fn deregister(&self, unit_id: &str) -> Result<DeregisterResponse> {
        let payload = DeregisterRequest {
            id: unit_id.to_string(),
        };

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, ENDPOINT_DEREGISTER))
            .json(&payload)
            .timeout(REGISTER_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Deregistration failed: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

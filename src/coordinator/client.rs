//! Coordinator → unit transport.

use crate::search::types::DataRange;
use crate::unit::protocol::{
    ENDPOINT_HEALTH, ENDPOINT_SEARCH, ENDPOINT_SHUTDOWN, ENDPOINT_UPDATE_RANGE, UnitHealthResponse,
    UnitSearchRequest, UnitSearchResponse, UpdateRangeRequest, UpdateRangeResponse,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls a unit at `address` (`host:port`).
#[async_trait]
pub trait UnitClient: Send + Sync {
    async fn update_range(
        &self,
        address: &str,
        range: DataRange,
        total_data_size: usize,
        epoch: u64,
    ) -> Result<UpdateRangeResponse>;

    async fn search(&self, address: &str, request: &UnitSearchRequest) -> Result<UnitSearchResponse>;

    async fn health(&self, address: &str) -> Result<UnitHealthResponse>;
}

#[derive(Clone)]
pub struct HttpUnitClient {
    http_client: reqwest::Client,
}

impl Default for HttpUnitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpUnitClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    fn url(address: &str, endpoint: &str) -> String {
        if address.starts_with("http://") || address.starts_with("https://") {
            format!("{}{}", address.trim_end_matches('/'), endpoint)
        } else {
            format!("http://{}{}", address, endpoint)
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        address: &str,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http_client
            .post(Self::url(address, endpoint))
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "{} {} returned {}",
                address,
                endpoint,
                response.status()
            ));
        }

        Ok(response.json().await?)
    }

    /// Asks the unit to stop serving. Used by the lifecycle manager.
    pub async fn request_shutdown(&self, address: &str) -> Result<()> {
        let response = self
            .http_client
            .post(Self::url(address, ENDPOINT_SHUTDOWN))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Shutdown request failed: {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitClient for HttpUnitClient {
    async fn update_range(
        &self,
        address: &str,
        range: DataRange,
        total_data_size: usize,
        epoch: u64,
    ) -> Result<UpdateRangeResponse> {
        let payload = UpdateRangeRequest {
            data_range: range,
            total_data_size,
            epoch,
        };
        let response: UpdateRangeResponse =
            self.post(address, ENDPOINT_UPDATE_RANGE, &payload).await?;

        if !response.success {
            return Err(anyhow::anyhow!(
                "Unit {} rejected range {}: {}",
                response.unit_id,
                range,
                response.message.unwrap_or_default()
            ));
        }
        Ok(response)
    }

    async fn search(&self, address: &str, request: &UnitSearchRequest) -> Result<UnitSearchResponse> {
        self.post(address, ENDPOINT_SEARCH, request).await
    }

    async fn health(&self, address: &str) -> Result<UnitHealthResponse> {
        let response = self
            .http_client
            .get(Self::url(address, ENDPOINT_HEALTH))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Health check failed: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

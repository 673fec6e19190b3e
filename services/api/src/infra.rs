use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use shipdesk::config::UpstreamConfig;
use shipdesk::workflows::booking::{
    CreateSessionRequest, CreateSessionResponse, CreateShipmentsRequest, GetRatesRequest,
    RateGateway, RateSheet, ShipmentAck, UpstreamError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reqwest-backed adapter for the upstream rate/booking service.
pub(crate) struct HttpRateGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRateGateway {
    pub(crate) fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            let detail = detail.trim();
            return Err(UpstreamError::Rejected(if detail.is_empty() {
                format!("status {}", status.as_u16())
            } else {
                format!("status {}: {detail}", status.as_u16())
            }));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|err| UpstreamError::Malformed(err.to_string()))
    }
}

fn map_send_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

#[async_trait]
impl RateGateway for HttpRateGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, UpstreamError> {
        self.post_json("createSession", &request).await
    }

    async fn fetch_rates(&self, request: GetRatesRequest) -> Result<RateSheet, UpstreamError> {
        self.post_json("getRates", &request).await
    }

    async fn create_shipments(
        &self,
        request: CreateShipmentsRequest,
    ) -> Result<ShipmentAck, UpstreamError> {
        self.post_json("createShipments", &request).await
    }
}

//! HTTP implementation of the backend surface.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::api::Backend;
use crate::config::Config;
use crate::model::{
    DataRequest, FullData, ProcessMode, RealtimeSnapshot, SessionBarcodes, SessionRecord,
    TraceRequest, TraceResponse, WorkerHourlyRequest, WorkerHourlyResponse,
};

pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        let base = Url::parse(&cfg.api_base)?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| anyhow!("bad endpoint {}: {}", path, e))
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let resp = self
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: HTTP {}: {}", path, status, text));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_data(&self, request: &DataRequest) -> Result<FullData> {
        self.post_json("api/data", request).await
    }

    async fn fetch_realtime(&self, mode: ProcessMode) -> Result<RealtimeSnapshot> {
        let resp = self
            .client
            .get(self.endpoint("api/realtime")?)
            .query(&[("process_mode", mode.label())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("api/realtime failed: HTTP {}: {}", status, text));
        }
        Ok(resp.json().await?)
    }

    async fn trace(&self, request: &TraceRequest) -> Result<TraceResponse> {
        self.post_json("api/trace", request).await
    }

    async fn session_barcodes(&self, session: &SessionRecord) -> Result<SessionBarcodes> {
        self.post_json("api/session_barcodes", session).await
    }

    async fn worker_hourly(&self, request: &WorkerHourlyRequest) -> Result<WorkerHourlyResponse> {
        self.post_json("api/worker_hourly", request).await
    }

    async fn barcode_search(&self, barcode: &str) -> Result<Value> {
        self.post_json("api/barcode_search", &serde_json::json!({ "barcode": barcode }))
            .await
    }

    async fn export_excel(&self, sessions: &[SessionRecord]) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.endpoint("api/export_excel")?)
            .json(&serde_json::json!({ "sessions": sessions }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("api/export_excel failed: HTTP {}: {}", status, text));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

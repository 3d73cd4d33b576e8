use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::model::{
    DataRequest, FullData, ProcessMode, RealtimeSnapshot, SessionBarcodes, SessionRecord,
    TraceRequest, TraceResponse, WorkerHourlyRequest, WorkerHourlyResponse,
};

pub mod http;
pub mod retry;

/// The line analytics server's request surface. The engine only ever
/// talks to this trait; tests substitute scripted fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_data(&self, request: &DataRequest) -> Result<FullData>;
    async fn fetch_realtime(&self, mode: ProcessMode) -> Result<RealtimeSnapshot>;
    async fn trace(&self, request: &TraceRequest) -> Result<TraceResponse>;
    async fn session_barcodes(&self, session: &SessionRecord) -> Result<SessionBarcodes>;
    async fn worker_hourly(&self, request: &WorkerHourlyRequest) -> Result<WorkerHourlyResponse>;
    async fn barcode_search(&self, barcode: &str) -> Result<Value>;
    async fn export_excel(&self, sessions: &[SessionRecord]) -> Result<Vec<u8>>;
}

//! Wire types for the line analytics backend.
//!
//! Field names mirror the server's JSON bit-for-bit. The server emits
//! pandas-shaped JSON, so a few spots are loose: flags arrive as bool
//! or 0/1, integer-keyed maps arrive as objects with stringified keys
//! (or as a plain array in the empty-data fallback), and optional
//! sub-objects may arrive as `[]`. Tolerant deserializers normalize all
//! of those to defaults rather than failing the whole payload.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Process modes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessMode {
    #[serde(rename = "검사실")]
    Inspection,
    #[serde(rename = "이적실")]
    Transfer,
    #[serde(rename = "포장실")]
    Packaging,
    #[serde(rename = "전체 비교")]
    AllCompare,
}

impl ProcessMode {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessMode::Inspection => "검사실",
            ProcessMode::Transfer => "이적실",
            ProcessMode::Packaging => "포장실",
            ProcessMode::AllCompare => "전체 비교",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "검사실" => Some(ProcessMode::Inspection),
            "이적실" => Some(ProcessMode::Transfer),
            "포장실" => Some(ProcessMode::Packaging),
            "전체 비교" => Some(ProcessMode::AllCompare),
            _ => None,
        }
    }

    pub fn all() -> [ProcessMode; 4] {
        [
            ProcessMode::Inspection,
            ProcessMode::Transfer,
            ProcessMode::Packaging,
            ProcessMode::AllCompare,
        ]
    }
}

impl Default for ProcessMode {
    fn default() -> Self {
        ProcessMode::Transfer
    }
}

// =============================================================================
// Filter state (persisted across sessions)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub process_mode: ProcessMode,
    pub start_date: String,
    pub end_date: String,
    pub selected_workers: Vec<String>,
    #[serde(default)]
    pub shipping_start_date: Option<String>,
    #[serde(default)]
    pub shipping_end_date: Option<String>,
}

impl FilterState {
    pub fn for_today(today: &str) -> Self {
        Self {
            process_mode: ProcessMode::default(),
            start_date: today.to_string(),
            end_date: today.to_string(),
            selected_workers: Vec::new(),
            shipping_start_date: None,
            shipping_end_date: None,
        }
    }
}

// =============================================================================
// Session records and derived rows
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time_dt: Option<String>,
    #[serde(default)]
    pub end_time_dt: Option<String>,
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub item_display: String,
    #[serde(default, deserialize_with = "de_count")]
    pub pcs_completed: i64,
    #[serde(default)]
    pub work_time: Option<f64>,
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub had_error: bool,
    #[serde(default)]
    pub phase: Option<i64>,
    #[serde(default)]
    pub work_order_id: Option<String>,
    #[serde(default)]
    pub product_batch: Option<String>,
    #[serde(default)]
    pub shipping_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAggregate {
    pub worker: String,
    #[serde(default)]
    pub avg_work_time: f64,
    #[serde(default)]
    pub avg_latency: f64,
    #[serde(default)]
    pub first_pass_yield: f64,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub session_count: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub total_pcs_completed: i64,
    #[serde(default)]
    pub best_work_time: Option<f64>,
    #[serde(default)]
    pub best_work_time_date: Option<String>,
}

/// One row per worker with `<metric>_norm` fields in [0, 1].
/// Metric columns vary by process mode, so they stay dynamic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedWorkerPerformance {
    #[serde(default)]
    pub worker: String,
    #[serde(flatten)]
    pub metrics: HashMap<String, Value>,
}

impl NormalizedWorkerPerformance {
    /// Normalized value for `<field>_norm`, 0.0 when absent.
    pub fn norm(&self, field: &str) -> f64 {
        self.metrics
            .get(&format!("{}_norm", field))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub details: Value,
}

// =============================================================================
// Historical averages (for trend overlays)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalAverages {
    #[serde(default)]
    pub daily_pcs: f64,
    /// Hour of day (0-23) -> average pcs
    #[serde(default, deserialize_with = "de_int_map")]
    pub hourly_pcs: BTreeMap<u32, f64>,
    /// Monday-based weekday (0-6) -> average pcs
    #[serde(default, deserialize_with = "de_int_map")]
    pub weekday_pcs: BTreeMap<u32, f64>,
    /// Week of month (1-5) -> average pcs
    #[serde(default, deserialize_with = "de_int_map")]
    pub week_of_month_pcs: BTreeMap<u32, f64>,
    /// Calendar month (1-12) -> average pcs
    #[serde(default, deserialize_with = "de_int_map")]
    pub monthly_pcs: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalSummary {
    #[serde(default)]
    pub averages: HistoricalAverages,
    #[serde(default)]
    pub date_range: DateRange,
}

// =============================================================================
// /api/data response
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Kpis {
    #[serde(default)]
    pub avg_tray_time: f64,
    #[serde(default)]
    pub avg_fpy: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub total_pcs_completed: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub total_trays: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSummary {
    #[serde(default, deserialize_with = "de_count")]
    pub total_trays: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub total_pcs_completed: i64,
    #[serde(default)]
    pub avg_tray_time: f64,
    #[serde(default)]
    pub avg_fpy: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonSummary {
    #[serde(default)]
    pub inspection: StageSummary,
    #[serde(default)]
    pub transfer: StageSummary,
    #[serde(default)]
    pub packaging: StageSummary,
    #[serde(default, deserialize_with = "de_count")]
    pub transfer_standby_trays: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub transfer_standby_pcs: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub packaging_standby_trays: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub packaging_standby_pcs: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonTrends {
    #[serde(default)]
    pub inspection: Vec<SessionRecord>,
    #[serde(default)]
    pub transfer: Vec<SessionRecord>,
    #[serde(default)]
    pub packaging: Vec<SessionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonData {
    #[serde(default)]
    pub summary_today: Option<ComparisonSummary>,
    #[serde(default)]
    pub summary_period: Option<ComparisonSummary>,
    #[serde(default)]
    pub trends: ComparisonTrends,
}

/// Whole `/api/data` snapshot. Replaced wholesale on every successful
/// fetch; renderers only ever see a complete snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullData {
    #[serde(default)]
    pub workers: Vec<String>,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub kpis: Kpis,
    #[serde(default)]
    pub filtered_sessions_data: Vec<SessionRecord>,
    #[serde(default)]
    pub worker_data: Vec<WorkerAggregate>,
    #[serde(default)]
    pub normalized_performance: Vec<NormalizedWorkerPerformance>,
    #[serde(default)]
    pub filtered_raw_events: Vec<RawEvent>,
    #[serde(default, deserialize_with = "de_or_default")]
    pub comparison_data: Option<ComparisonData>,
    #[serde(default, deserialize_with = "de_or_default")]
    pub historical_summary: HistoricalSummary,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    pub process_mode: ProcessMode,
    pub start_date: String,
    pub end_date: String,
    pub selected_workers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_end_date: Option<String>,
}

impl From<&FilterState> for DataRequest {
    fn from(f: &FilterState) -> Self {
        Self {
            process_mode: f.process_mode,
            start_date: f.start_date.clone(),
            end_date: f.end_date.clone(),
            selected_workers: f.selected_workers.clone(),
            shipping_start_date: f.shipping_start_date.clone(),
            shipping_end_date: f.shipping_end_date.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceRequest {
    #[serde(default)]
    pub wid: String,
    #[serde(default)]
    pub fpb: String,
    #[serde(default)]
    pub barcode: String,
}

pub const TRACE_KIND_BARCODE: &str = "barcode_trace";
pub const TRACE_KIND_SESSION: &str = "session_trace";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceResponse {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHourlyRequest {
    pub worker: String,
    pub start_date: String,
    pub end_date: String,
    pub process_mode: ProcessMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyPoint {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub pcs: f64,
    #[serde(default)]
    pub avg_work_time: f64,
    #[serde(default)]
    pub avg_latency: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub session_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerHourlySummary {
    #[serde(default, deserialize_with = "de_count")]
    pub total_pcs: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub total_sessions: i64,
    #[serde(default)]
    pub avg_daily_pcs: f64,
    #[serde(default)]
    pub avg_work_time: f64,
    #[serde(default)]
    pub avg_latency: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub num_days: i64,
    #[serde(default)]
    pub first_pass_yield: f64,
}

/// `/api/worker_hourly` response. The server answers with empty arrays
/// for `hourly_data`/`summary` when a worker has no sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerHourlyResponse {
    #[serde(default)]
    pub worker: String,
    #[serde(default, deserialize_with = "de_or_default")]
    pub hourly_data: HourlySeries,
    #[serde(default)]
    pub daily_data: Vec<DailyPoint>,
    #[serde(default, deserialize_with = "de_or_default")]
    pub summary: WorkerHourlySummary,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionBarcodes {
    #[serde(default)]
    pub barcodes: Vec<String>,
}

// =============================================================================
// /api/realtime response
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeWorkerRow {
    #[serde(default)]
    pub worker: String,
    #[serde(default, deserialize_with = "de_count")]
    pub pcs_completed: i64,
    #[serde(default)]
    pub avg_work_time: Option<f64>,
    #[serde(default, deserialize_with = "de_count")]
    pub session_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeItemRow {
    #[serde(default)]
    pub item_display: String,
    #[serde(default, deserialize_with = "de_count")]
    pub pcs_completed: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub pallet_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlyProduction {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub today: Vec<f64>,
    #[serde(default)]
    pub average: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyAverages {
    #[serde(default)]
    pub daily_total_pcs: f64,
    #[serde(default)]
    pub daily_total_pallets: f64,
    #[serde(default)]
    pub daily_worker_count: f64,
    #[serde(default)]
    pub daily_avg_work_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeSnapshot {
    #[serde(default)]
    pub worker_status: Vec<RealtimeWorkerRow>,
    #[serde(default)]
    pub item_status: Vec<RealtimeItemRow>,
    #[serde(default)]
    pub hourly_production: HourlyProduction,
    #[serde(default, deserialize_with = "de_or_default")]
    pub monthly_averages: Option<MonthlyAverages>,
}

// =============================================================================
// Tolerant deserializers
// =============================================================================

fn de_flag<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    })
}

fn de_count<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(v.as_f64().map(|f| f as i64).unwrap_or(0))
}

fn de_int_map<'de, D>(d: D) -> Result<BTreeMap<u32, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    let mut out = BTreeMap::new();
    match v {
        Value::Object(map) => {
            for (k, val) in map {
                if let (Ok(key), Some(num)) = (k.parse::<u32>(), val.as_f64()) {
                    out.insert(key, num);
                }
            }
        }
        // Empty-data fallback: the server sends a positional array.
        Value::Array(arr) => {
            for (i, val) in arr.iter().enumerate() {
                if let Some(num) = val.as_f64() {
                    out.insert(i as u32, num);
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

fn de_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let v = Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_mode_labels_round_trip() {
        for mode in ProcessMode::all() {
            assert_eq!(ProcessMode::from_label(mode.label()), Some(mode));
        }
        assert_eq!(ProcessMode::from_label("포장소"), None);
    }

    #[test]
    fn test_process_mode_wire_format() {
        let s = serde_json::to_string(&ProcessMode::Packaging).unwrap();
        assert_eq!(s, "\"포장실\"");
        let back: ProcessMode = serde_json::from_str("\"전체 비교\"").unwrap();
        assert_eq!(back, ProcessMode::AllCompare);
    }

    #[test]
    fn test_session_record_flag_variants() {
        let as_int: SessionRecord = serde_json::from_value(json!({
            "date": "2026-08-03", "worker": "김철수", "had_error": 1, "pcs_completed": 60
        }))
        .unwrap();
        assert!(as_int.had_error);
        assert_eq!(as_int.pcs_completed, 60);

        let as_bool: SessionRecord = serde_json::from_value(json!({
            "date": "2026-08-03", "worker": "김철수", "had_error": false, "pcs_completed": 60.0
        }))
        .unwrap();
        assert!(!as_bool.had_error);
        assert_eq!(as_bool.pcs_completed, 60);
    }

    #[test]
    fn test_historical_averages_string_keys() {
        let h: HistoricalAverages = serde_json::from_value(json!({
            "hourly_pcs": {"7": 120.5, "8": 240.0},
            "weekday_pcs": {"0": 900.0, "6": 100.0},
            "week_of_month_pcs": {"1": 5000.0},
            "monthly_pcs": {"12": 90000.0}
        }))
        .unwrap();
        assert_eq!(h.hourly_pcs.get(&7), Some(&120.5));
        assert_eq!(h.weekday_pcs.get(&6), Some(&100.0));
        assert_eq!(h.week_of_month_pcs.get(&1), Some(&5000.0));
        assert_eq!(h.monthly_pcs.get(&12), Some(&90000.0));
    }

    #[test]
    fn test_historical_averages_array_fallback() {
        let h: HistoricalAverages = serde_json::from_value(json!({
            "hourly_pcs": [0.0, 0.0, 3.5]
        }))
        .unwrap();
        assert_eq!(h.hourly_pcs.get(&2), Some(&3.5));
    }

    #[test]
    fn test_worker_hourly_empty_shapes() {
        let resp: WorkerHourlyResponse = serde_json::from_value(json!({
            "worker": "박영희",
            "hourly_data": [],
            "daily_data": [],
            "summary": {}
        }))
        .unwrap();
        assert_eq!(resp.worker, "박영희");
        assert!(resp.hourly_data.labels.is_empty());
        assert_eq!(resp.summary.total_pcs, 0);
    }

    #[test]
    fn test_normalized_norm_lookup_defaults() {
        let row: NormalizedWorkerPerformance = serde_json::from_value(json!({
            "worker": "김철수",
            "avg_work_time_norm": 0.8,
            "first_pass_yield_norm": 1.0
        }))
        .unwrap();
        assert_eq!(row.norm("avg_work_time"), 0.8);
        assert_eq!(row.norm("first_pass_yield"), 1.0);
        assert_eq!(row.norm("defect_rate"), 0.0);
    }

    #[test]
    fn test_full_data_minimal_payload() {
        let data: FullData = serde_json::from_value(json!({
            "workers": ["김철수"],
            "date_range": {"min": "2026-01-01", "max": "2026-08-01"},
            "kpis": {},
            "filtered_sessions_data": [],
            "worker_data": [],
            "normalized_performance": [],
            "filtered_raw_events": []
        }))
        .unwrap();
        assert_eq!(data.workers.len(), 1);
        assert!(data.comparison_data.is_none());
    }

    #[test]
    fn test_data_request_from_filters() {
        let f = FilterState::for_today("2026-08-07");
        let req = DataRequest::from(&f);
        assert_eq!(req.start_date, "2026-08-07");
        assert_eq!(req.process_mode, ProcessMode::Transfer);
        let s = serde_json::to_value(&req).unwrap();
        assert_eq!(s["process_mode"], "이적실");
        assert!(s.get("shipping_start_date").is_none());
    }
}

//! End-to-end controller flow against a scripted backend: fetch and
//! render, stale-response ordering, mode-switch reseeding, staggered
//! expand-all routing and live-push handling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use lineboard::api::Backend;
use lineboard::charts::{ChartHandle, ChartSpec, ChartSurface, PanelState};
use lineboard::config::Config;
use lineboard::controller::{Controller, DetailOutcome, FetchOutcome};
use lineboard::live::LiveEvent;
use lineboard::model::{
    DataRequest, FilterState, FullData, ProcessMode, RealtimeSnapshot, SessionBarcodes,
    SessionRecord, TraceRequest, TraceResponse, WorkerHourlyRequest, WorkerHourlyResponse,
};
use lineboard::ranking::SortKey;
use lineboard::storage::FilterStore;
use lineboard::view::UiEvent;

// =============================================================================
// Scripted backend
// =============================================================================

enum DataStep {
    Ok(u64, FullData),
    Err(u64, String),
}

#[derive(Default)]
struct FakeBackend {
    data_script: Mutex<VecDeque<DataStep>>,
    /// Per-worker delay for worker_hourly responses.
    hourly_delays: Mutex<HashMap<String, u64>>,
}

impl FakeBackend {
    fn push_data(&self, delay_ms: u64, data: FullData) {
        self.data_script
            .lock()
            .unwrap()
            .push_back(DataStep::Ok(delay_ms, data));
    }

    fn push_error(&self, delay_ms: u64, message: &str) {
        self.data_script
            .lock()
            .unwrap()
            .push_back(DataStep::Err(delay_ms, message.to_string()));
    }

    fn set_hourly_delay(&self, worker: &str, delay_ms: u64) {
        self.hourly_delays
            .lock()
            .unwrap()
            .insert(worker.to_string(), delay_ms);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_data(&self, _request: &DataRequest) -> Result<FullData> {
        let step = self.data_script.lock().unwrap().pop_front();
        match step {
            Some(DataStep::Ok(delay, data)) => {
                sleep(Duration::from_millis(delay)).await;
                Ok(data)
            }
            Some(DataStep::Err(delay, message)) => {
                sleep(Duration::from_millis(delay)).await;
                Err(anyhow!(message))
            }
            None => Err(anyhow!("unscripted fetch_data call")),
        }
    }

    async fn fetch_realtime(&self, _mode: ProcessMode) -> Result<RealtimeSnapshot> {
        Ok(RealtimeSnapshot::default())
    }

    async fn trace(&self, _request: &TraceRequest) -> Result<TraceResponse> {
        Ok(TraceResponse {
            kind: "session_trace".to_string(),
            data: vec![json!({"process": "이적실", "worker": "김철수"})],
        })
    }

    async fn session_barcodes(&self, _session: &SessionRecord) -> Result<SessionBarcodes> {
        Ok(SessionBarcodes::default())
    }

    async fn worker_hourly(&self, request: &WorkerHourlyRequest) -> Result<WorkerHourlyResponse> {
        let delay = self
            .hourly_delays
            .lock()
            .unwrap()
            .get(&request.worker)
            .copied()
            .unwrap_or(0);
        sleep(Duration::from_millis(delay)).await;
        Ok(serde_json::from_value(json!({
            "worker": request.worker,
            "hourly_data": {"labels": [format!("{}-09시", request.worker)], "values": [60.0]},
            "daily_data": [],
            "summary": {"total_pcs": 60}
        }))
        .unwrap())
    }

    async fn barcode_search(&self, _barcode: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn export_excel(&self, _sessions: &[SessionRecord]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

struct NullSurface {
    next: u64,
}

impl ChartSurface for NullSurface {
    fn create(&mut self, _canvas: &str, _spec: &ChartSpec) -> ChartHandle {
        self.next += 1;
        ChartHandle(self.next)
    }

    fn destroy(&mut self, _canvas: &str, _handle: ChartHandle) {}
}

// =============================================================================
// Fixtures
// =============================================================================

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
}

fn data_with_workers(names: &[&str]) -> FullData {
    let worker_data: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "worker": name,
                // Earlier names rank higher under the default sort.
                "overall_score": 100.0 - i as f64,
                "avg_work_time": 100.0,
                "avg_latency": 10.0,
                "first_pass_yield": 0.99,
                "session_count": 10,
                "total_pcs_completed": 600
            })
        })
        .collect();
    serde_json::from_value(json!({
        "workers": names,
        "date_range": {"min": "2026-01-01", "max": "2026-08-07"},
        "kpis": {},
        "filtered_sessions_data": [],
        "worker_data": worker_data,
        "normalized_performance": [],
        "filtered_raw_events": []
    }))
    .unwrap()
}

struct Harness {
    controller: Controller,
    backend: Arc<FakeBackend>,
    fetch_rx: mpsc::Receiver<FetchOutcome>,
    detail_rx: mpsc::Receiver<DetailOutcome>,
    _dir: TempDir,
}

fn harness(filters: FilterState) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut cfg = Config::from_env();
    cfg.sqlite_path = dir
        .path()
        .join("filters.sqlite")
        .to_string_lossy()
        .to_string();
    cfg.detail_stagger_ms = 10;

    let mut store = FilterStore::new(&cfg.sqlite_path).unwrap();
    store.init().unwrap();

    let backend = Arc::new(FakeBackend::default());
    let (fetch_tx, fetch_rx) = mpsc::channel(16);
    let (detail_tx, detail_rx) = mpsc::channel(64);

    let controller = Controller::new(
        cfg,
        backend.clone(),
        store,
        Box::new(NullSurface { next: 0 }),
        filters,
        today(),
        fetch_tx,
        detail_tx,
    );
    Harness {
        controller,
        backend,
        fetch_rx,
        detail_rx,
        _dir: dir,
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn initial_fetch_renders_the_first_tab() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["김철수"]));

    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;

    let plan = h.controller.last_plan().unwrap();
    // Today's range resolves to the realtime status tab.
    assert_eq!(plan.title, "실시간 현황");
    assert!(h.controller.chart_spec("realtime-hourly-chart").is_some());
    assert_eq!(h.controller.applied_generation(), 1);
}

#[tokio::test]
async fn stale_response_is_dropped() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    // Fetch A resolves slowly, fetch B quickly.
    h.backend.push_data(80, data_with_workers(&["A-작업자"]));
    h.backend.push_data(5, data_with_workers(&["B-작업자"]));

    // Park the view on a snapshot-backed tab so the render path does
    // not reach for the realtime endpoint.
    h.controller
        .handle_ui(UiEvent::TabClicked("상세 데이터".to_string()))
        .await;

    h.controller.request_fetch();
    h.controller
        .handle_ui(UiEvent::ApplyFilters {
            start_date: "2026-08-01".to_string(),
            end_date: "2026-08-07".to_string(),
            workers: vec![],
        })
        .await;

    // B completes first, then A.
    let first = h.fetch_rx.recv().await.unwrap();
    let second = h.fetch_rx.recv().await.unwrap();
    assert_eq!(first.generation, 2);
    assert_eq!(second.generation, 1);

    h.controller.on_fetch(first).await;
    h.controller.on_fetch(second).await;

    // The slow older response lost the race and changed nothing.
    assert_eq!(h.controller.applied_generation(), 2);
    assert_eq!(h.controller.data().unwrap().workers, vec!["B-작업자"]);
}

#[tokio::test]
async fn mode_switch_reseeds_tab_and_sort() {
    let mut filters = FilterState::for_today("2026-08-07");
    filters.process_mode = ProcessMode::Inspection;
    let mut h = harness(filters);

    h.controller
        .handle_ui(UiEvent::TabClicked("작업자별 분석".to_string()))
        .await;
    h.controller
        .handle_ui(UiEvent::SortChanged("이름순".to_string()))
        .await;
    assert_eq!(h.controller.view.sort_key, SortKey::Name);

    h.backend.push_data(0, data_with_workers(&["김철수"]));
    h.controller
        .handle_ui(UiEvent::ModeChanged(ProcessMode::Packaging))
        .await;

    // Packaging has no worker-detail tab: first tab wins and the
    // per-tab sub-state is reseeded, not carried over.
    assert_eq!(h.controller.view.active_tab, "실시간 현황");
    assert_eq!(h.controller.view.sort_key, SortKey::ScoreDesc);
    assert_eq!(h.controller.view.selected_worker, None);
    assert_eq!(h.controller.filters.process_mode, ProcessMode::Packaging);

    // The mode change also issued a refetch.
    let outcome = h.fetch_rx.recv().await.unwrap();
    assert_eq!(outcome.generation, 1);
}

#[tokio::test]
async fn expand_all_routes_results_by_row_not_arrival_order() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["느린작업자", "빠른작업자"]));
    // Row 0 (top-ranked) answers late, row 1 answers early; with a
    // 10ms stagger the second row's response still arrives first.
    h.backend.set_hourly_delay("느린작업자", 80);
    h.backend.set_hourly_delay("빠른작업자", 1);

    h.controller
        .handle_ui(UiEvent::TabClicked("작업자별 분석".to_string()))
        .await;
    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;

    assert_eq!(h.controller.panel_state("worker-detail-0"), PanelState::Loading);
    assert_eq!(h.controller.panel_state("worker-detail-1"), PanelState::Loading);

    let first = h.detail_rx.recv().await.unwrap();
    let second = h.detail_rx.recv().await.unwrap();
    assert_eq!(first.worker, "빠른작업자");
    assert_eq!(second.worker, "느린작업자");

    h.controller.on_detail(first).await;
    h.controller.on_detail(second).await;

    // Each result landed on its own row.
    let row0 = h.controller.chart_spec("hourly-chart-worker-detail-0").unwrap();
    assert_eq!(row0.labels, vec!["느린작업자-09시"]);
    let row1 = h.controller.chart_spec("hourly-chart-worker-detail-1").unwrap();
    assert_eq!(row1.labels, vec!["빠른작업자-09시"]);
    assert_eq!(h.controller.panel_state("worker-detail-0"), PanelState::Expanded);
    assert_eq!(h.controller.panel_state("worker-detail-1"), PanelState::Expanded);
    // Radar chart plus one hourly chart per expanded row.
    assert_eq!(h.controller.live_chart_count(), 3);
}

#[tokio::test]
async fn collapsing_a_loading_row_refuses_its_late_result() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["느린작업자", "빠른작업자"]));
    h.backend.set_hourly_delay("느린작업자", 50);

    h.controller
        .handle_ui(UiEvent::TabClicked("작업자별 분석".to_string()))
        .await;
    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;

    // Collapse row 0 while its request is still in flight.
    h.controller
        .handle_ui(UiEvent::ToggleDetail("worker-detail-0".to_string()))
        .await;
    assert_eq!(h.controller.panel_state("worker-detail-0"), PanelState::Collapsed);

    let mut outcomes = Vec::new();
    outcomes.push(h.detail_rx.recv().await.unwrap());
    outcomes.push(h.detail_rx.recv().await.unwrap());
    for outcome in outcomes {
        h.controller.on_detail(outcome).await;
    }

    // The collapsed row stayed collapsed and got no chart.
    assert_eq!(h.controller.panel_state("worker-detail-0"), PanelState::Collapsed);
    assert!(h.controller.chart_spec("hourly-chart-worker-detail-0").is_none());
    assert_eq!(h.controller.panel_state("worker-detail-1"), PanelState::Expanded);
}

#[tokio::test]
async fn fetch_failure_keeps_previous_snapshot() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["김철수"]));
    // One scripted error per retry attempt.
    for _ in 0..4 {
        h.backend.push_error(0, "backend down");
    }

    h.controller
        .handle_ui(UiEvent::TabClicked("상세 데이터".to_string()))
        .await;
    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;
    assert_eq!(h.controller.applied_generation(), 1);

    h.controller
        .handle_ui(UiEvent::ApplyFilters {
            start_date: "2026-07-01".to_string(),
            end_date: "2026-08-07".to_string(),
            workers: vec![],
        })
        .await;
    let outcome = h.fetch_rx.recv().await.unwrap();
    assert!(outcome.result.is_err());
    h.controller.on_fetch(outcome).await;

    // The pane-level failure left the previous snapshot untouched.
    assert_eq!(h.controller.applied_generation(), 1);
    assert_eq!(h.controller.data().unwrap().workers, vec!["김철수"]);
    assert!(h
        .controller
        .last_notice
        .as_ref()
        .unwrap()
        .contains("데이터를 불러오는 데 실패했습니다"));
}

#[tokio::test]
async fn invalid_date_range_issues_no_request() {
    let mut h = harness(FilterState::for_today("2026-08-07"));

    h.controller
        .handle_ui(UiEvent::ApplyFilters {
            start_date: "2026-08-07".to_string(),
            end_date: "2026-08-01".to_string(),
            workers: vec![],
        })
        .await;

    assert!(h.fetch_rx.try_recv().is_err());
    assert_eq!(
        h.controller.last_notice.as_deref(),
        Some("시작일은 종료일보다 이전이어야 합니다.")
    );
}

#[tokio::test]
async fn live_event_only_notifies_outside_the_realtime_tab() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["김철수"]));

    h.controller
        .handle_ui(UiEvent::TabClicked("상세 데이터".to_string()))
        .await;
    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;

    h.controller
        .on_live(LiveEvent {
            message: "갱신".to_string(),
        })
        .await;
    assert!(h
        .controller
        .last_notice
        .as_ref()
        .unwrap()
        .contains("실시간 현황 탭에서 확인할 수 있습니다"));

    // On the realtime tab the same event refreshes immediately.
    h.controller
        .handle_ui(UiEvent::TabClicked("실시간 현황".to_string()))
        .await;
    h.controller
        .on_live(LiveEvent {
            message: "갱신".to_string(),
        })
        .await;
    assert!(h
        .controller
        .last_notice
        .as_ref()
        .unwrap()
        .contains("갱신합니다"));
    assert_eq!(h.controller.last_plan().unwrap().title, "실시간 현황");
}

#[tokio::test]
async fn trace_search_appends_results_to_the_active_plan() {
    let mut h = harness(FilterState::for_today("2026-08-07"));
    h.backend.push_data(0, data_with_workers(&["김철수"]));

    h.controller
        .handle_ui(UiEvent::TabClicked("생산 이력 추적".to_string()))
        .await;
    h.controller.request_fetch();
    let outcome = h.fetch_rx.recv().await.unwrap();
    h.controller.on_fetch(outcome).await;

    h.controller
        .handle_ui(UiEvent::TraceSearch {
            wid: "WID-1".to_string(),
            fpb: String::new(),
            barcode: String::new(),
        })
        .await;

    let plan = h.controller.last_plan().unwrap();
    let results = plan.tables.iter().find(|t| t.title == "검색 결과").unwrap();
    assert_eq!(results.rows.len(), 1);
    assert_eq!(results.rows[0][1], "김철수");
}

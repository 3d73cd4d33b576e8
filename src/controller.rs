//! Top-level controller: owns the application state, executes the
//! UI-event action table, guards against stale fetch responses and
//! drives tab rendering through the chart registry.
//!
//! Everything runs on one logical thread; fetches are spawned tasks
//! whose outcomes come back over channels, so state only ever changes
//! between awaits, never concurrently.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::api::retry::{retry_async, RetryConfig};
use crate::api::Backend;
use crate::charts::{
    daily_canvas, hourly_canvas, ChartKind, ChartRegistry, ChartSpec, ChartSurface, Dataset,
    DetailPanels, PanelState,
};
use crate::config::Config;
use crate::live::LiveEvent;
use crate::logging::{self, obj, v_num, v_str, Domain, Level};
use crate::model::{
    DataRequest, FilterState, FullData, TraceRequest, WorkerHourlyRequest, WorkerHourlyResponse,
};
use crate::render::{self, DetailRow, RenderPlan};
use crate::storage::FilterStore;
use crate::trend;
use crate::view::{
    actions_for, period_label, retain_or_first, tabs_for_mode, Action, TabKind, UiEvent, ViewState,
};

// =============================================================================
// Channel payloads
// =============================================================================

#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub result: Result<FullData>,
}

#[derive(Debug)]
pub struct DetailOutcome {
    pub detail_id: String,
    pub worker: String,
    pub result: Result<WorkerHourlyResponse>,
}

// =============================================================================
// Controller
// =============================================================================

pub struct Controller {
    cfg: Config,
    backend: Arc<dyn Backend>,
    store: FilterStore,
    registry: ChartRegistry,
    panels: DetailPanels,
    retry: RetryConfig,

    pub filters: FilterState,
    pub view: ViewState,
    data: Option<FullData>,
    today: NaiveDate,

    /// Generation of the newest issued fetch; responses carry theirs
    /// back and anything at or below `applied_generation` is dropped.
    issued_generation: u64,
    applied_generation: u64,

    fetch_tx: mpsc::Sender<FetchOutcome>,
    detail_tx: mpsc::Sender<DetailOutcome>,

    pending_toggle: Option<String>,
    pending_trace: Option<TraceRequest>,
    pending_barcode: Option<String>,
    pending_session_row: Option<usize>,

    /// Raw rows of the last session-trace result, for barcode lookups.
    last_trace_sessions: Vec<serde_json::Value>,

    last_plan: Option<RenderPlan>,
    pub last_notice: Option<String>,
}

impl Controller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Config,
        backend: Arc<dyn Backend>,
        store: FilterStore,
        surface: Box<dyn ChartSurface>,
        filters: FilterState,
        today: NaiveDate,
        fetch_tx: mpsc::Sender<FetchOutcome>,
        detail_tx: mpsc::Sender<DetailOutcome>,
    ) -> Self {
        let period = period_for(&filters, today);
        let tabs = tabs_for_mode(filters.process_mode, period);
        let view = ViewState::reseed(tabs.first().cloned().unwrap_or_default(), cfg.rows_per_page);
        Self {
            cfg,
            backend,
            store,
            registry: ChartRegistry::new(surface),
            panels: DetailPanels::default(),
            retry: RetryConfig::default(),
            filters,
            view,
            data: None,
            today,
            issued_generation: 0,
            applied_generation: 0,
            fetch_tx,
            detail_tx,
            pending_toggle: None,
            pending_trace: None,
            pending_barcode: None,
            pending_session_row: None,
            last_trace_sessions: Vec::new(),
            last_plan: None,
            last_notice: None,
        }
    }

    pub fn last_plan(&self) -> Option<&RenderPlan> {
        self.last_plan.as_ref()
    }

    pub fn data(&self) -> Option<&FullData> {
        self.data.as_ref()
    }

    pub fn applied_generation(&self) -> u64 {
        self.applied_generation
    }

    pub fn panel_state(&self, detail_id: &str) -> PanelState {
        self.panels.state(detail_id)
    }

    pub fn live_chart_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn chart_spec(&self, canvas: &str) -> Option<&ChartSpec> {
        self.registry.spec_for(canvas)
    }

    // =========================================================================
    // UI events
    // =========================================================================

    pub async fn handle_ui(&mut self, event: UiEvent) {
        logging::log(
            Level::Debug,
            Domain::Ui,
            "event",
            obj(&[("event", v_str(&format!("{:?}", event)))]),
        );
        let actions = actions_for(&event);
        self.apply_event(event);
        for action in actions {
            match action {
                Action::Refetch => self.request_fetch(),
                Action::RerenderActive => self.render_active().await,
                Action::ToggleDetailRow => self.toggle_detail_row(),
                Action::RunTraceSearch => self.run_trace_search().await,
                Action::RunBarcodeSearch => self.run_barcode_search().await,
                Action::RunSessionBarcodes => self.run_session_barcodes().await,
                Action::RunExport => self.run_export().await,
            }
        }
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::TabClicked(name) => {
                self.view.active_tab = name;
            }
            UiEvent::ModeChanged(mode) => {
                if self.filters.process_mode != mode {
                    self.filters.process_mode = mode;
                    // Per-tab sub-state never survives a mode switch.
                    let tabs = tabs_for_mode(mode, period_for(&self.filters, self.today));
                    let active = retain_or_first(&tabs, &self.view.active_tab);
                    self.view = ViewState::reseed(active, self.cfg.rows_per_page);
                }
            }
            UiEvent::ApplyFilters {
                start_date,
                end_date,
                workers,
            } => {
                self.filters.start_date = start_date;
                self.filters.end_date = end_date;
                self.filters.selected_workers = workers;
            }
            UiEvent::ApplyShippingRange {
                start_date,
                end_date,
            } => {
                self.filters.shipping_start_date = start_date;
                self.filters.shipping_end_date = end_date;
            }
            UiEvent::Reset => {
                if let Some(data) = &self.data {
                    if let Some(min) = &data.date_range.min {
                        self.filters.start_date = min.clone();
                    }
                    if let Some(max) = &data.date_range.max {
                        self.filters.end_date = max.clone();
                    }
                    self.filters.selected_workers = data.workers.clone();
                }
            }
            UiEvent::SortChanged(label) => {
                self.view.sort_key = crate::ranking::SortKey::from_label(&label);
            }
            UiEvent::WorkerSelected(worker) => {
                self.view.selected_worker = Some(worker);
            }
            UiEvent::ToggleDetail(detail_id) => {
                self.pending_toggle = Some(detail_id);
            }
            UiEvent::PageChanged(page) => {
                self.view.current_page = page.max(1);
            }
            UiEvent::ComparisonPeriodChanged(period) => {
                self.view.comparison_period = period;
            }
            UiEvent::TraceSearch { wid, fpb, barcode } => {
                self.pending_trace = Some(TraceRequest { wid, fpb, barcode });
            }
            UiEvent::BarcodeSearch(barcode) => {
                self.pending_barcode = Some(barcode);
            }
            UiEvent::SessionBarcodes(row) => {
                self.pending_session_row = Some(row);
            }
            UiEvent::ExportExcel => {}
        }
    }

    // =========================================================================
    // Fetch lifecycle with the generation guard
    // =========================================================================

    /// Validate the filter range and issue a fetch. Invalid input is
    /// rejected inline; no request leaves the client.
    pub fn request_fetch(&mut self) {
        let start = trend::parse_date(&self.filters.start_date);
        let end = trend::parse_date(&self.filters.end_date);
        match (start, end) {
            (Some(s), Some(e)) if s > e => {
                self.notice("시작일은 종료일보다 이전이어야 합니다.");
                return;
            }
            (None, _) | (_, None) => {
                self.notice("날짜 형식이 올바르지 않습니다.");
                return;
            }
            _ => {}
        }

        self.issued_generation += 1;
        let generation = self.issued_generation;
        let request = DataRequest::from(&self.filters);
        let backend = self.backend.clone();
        let tx = self.fetch_tx.clone();
        let retry = self.retry.clone();

        logging::log(
            Level::Info,
            Domain::Fetch,
            "issued",
            obj(&[
                ("generation", v_num(generation as f64)),
                ("process_mode", v_str(self.filters.process_mode.label())),
                ("start_date", v_str(&self.filters.start_date)),
                ("end_date", v_str(&self.filters.end_date)),
            ]),
        );

        tokio::spawn(async move {
            let result = retry_async(&retry, "fetch_data", || backend.fetch_data(&request)).await;
            let _ = tx.send(FetchOutcome { generation, result }).await;
        });
    }

    /// Apply a resolved fetch. Responses older than the newest applied
    /// one lost the race and are dropped without touching state.
    pub async fn on_fetch(&mut self, outcome: FetchOutcome) {
        if outcome.generation <= self.applied_generation {
            logging::log(
                Level::Debug,
                Domain::Fetch,
                "stale_dropped",
                obj(&[
                    ("generation", v_num(outcome.generation as f64)),
                    ("applied", v_num(self.applied_generation as f64)),
                ]),
            );
            return;
        }

        let data = match outcome.result {
            Ok(data) => data,
            Err(e) => {
                self.notice(&format!("데이터를 불러오는 데 실패했습니다: {}", e));
                return;
            }
        };

        self.applied_generation = outcome.generation;
        self.data = Some(data);

        // Filter selections persist once a fetch for them succeeds.
        if let Err(e) = self.store.save(&self.filters) {
            logging::log(
                Level::Warn,
                Domain::Store,
                "save_failed",
                obj(&[("error", v_str(&e.to_string()))]),
            );
        }

        let tabs = tabs_for_mode(
            self.filters.process_mode,
            period_for(&self.filters, self.today),
        );
        self.view.active_tab = retain_or_first(&tabs, &self.view.active_tab);
        self.render_active().await;
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Re-render the active tab: every tracked chart handle dies first,
    /// then the tab's plan is built against the current snapshot.
    pub async fn render_active(&mut self) {
        self.registry.destroy_all();
        self.panels.clear();

        if self.data.is_none() {
            return;
        }

        let kind = TabKind::resolve(&self.view.active_tab);
        let plan = if kind == TabKind::Status {
            self.status_plan().await
        } else if let Some(data) = &self.data {
            render::plan_for(kind, &self.view.active_tab, &self.filters, &self.view, data)
        } else {
            return;
        };

        for build in &plan.charts {
            self.registry.ensure(&build.canvas, build.spec.clone());
        }

        logging::log(
            Level::Info,
            Domain::Render,
            "tab",
            obj(&[
                ("tab", v_str(&self.view.active_tab)),
                ("charts", v_num(plan.charts.len() as f64)),
                ("tables", v_num(plan.tables.len() as f64)),
            ]),
        );

        if kind == TabKind::WorkerDetail && plan.detail_rows.len() > 1 {
            self.expand_all(&plan.detail_rows);
        }
        self.last_plan = Some(plan);
    }

    async fn status_plan(&mut self) -> RenderPlan {
        let backend = self.backend.clone();
        let mode = self.filters.process_mode;
        let result = retry_async(&self.retry, "fetch_realtime", || {
            backend.fetch_realtime(mode)
        })
        .await;

        match result {
            Ok(snapshot) => render::plan_status(&self.view.active_tab, &snapshot),
            Err(e) => RenderPlan {
                title: self.view.active_tab.clone(),
                notices: vec![format!("실시간 데이터를 불러오는 데 실패했습니다: {}", e)],
                ..RenderPlan::default()
            },
        }
    }

    // =========================================================================
    // Detail panels
    // =========================================================================

    /// Auto-expand every worker row, staggering request emission by a
    /// fixed delay per row. Completions arrive in any order and are
    /// routed by the detail id captured here.
    fn expand_all(&mut self, rows: &[DetailRow]) {
        let stagger = self.cfg.detail_stagger();
        for (index, row) in rows.iter().enumerate() {
            self.panels.begin_loading(&row.detail_id);
            self.spawn_detail_fetch(row.clone(), stagger * index as u32);
        }
        logging::log(
            Level::Info,
            Domain::Fetch,
            "expand_all",
            obj(&[
                ("rows", v_num(rows.len() as f64)),
                ("stagger_ms", v_num(stagger.as_millis() as f64)),
            ]),
        );
    }

    fn spawn_detail_fetch(&self, row: DetailRow, delay: std::time::Duration) {
        let request = WorkerHourlyRequest {
            worker: row.worker.clone(),
            start_date: self.filters.start_date.clone(),
            end_date: self.filters.end_date.clone(),
            process_mode: self.filters.process_mode,
        };
        let backend = self.backend.clone();
        let tx = self.detail_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let result = backend.worker_hourly(&request).await;
            let _ = tx
                .send(DetailOutcome {
                    detail_id: row.detail_id,
                    worker: row.worker,
                    result,
                })
                .await;
        });
    }

    fn toggle_detail_row(&mut self) {
        let detail_id = match self.pending_toggle.take() {
            Some(id) => id,
            None => return,
        };
        match self.panels.state(&detail_id) {
            PanelState::Collapsed => {
                let worker = self
                    .last_plan
                    .as_ref()
                    .and_then(|p| p.detail_rows.iter().find(|r| r.detail_id == detail_id))
                    .map(|r| r.worker.clone());
                match worker {
                    Some(worker) => {
                        self.panels.begin_loading(&detail_id);
                        self.spawn_detail_fetch(
                            DetailRow { detail_id, worker },
                            std::time::Duration::ZERO,
                        );
                    }
                    None => logging::log(
                        Level::Debug,
                        Domain::Ui,
                        "toggle_unknown_row",
                        obj(&[("detail_id", v_str(&detail_id))]),
                    ),
                }
            }
            PanelState::Loading | PanelState::Expanded => {
                self.panels.collapse(&detail_id, &mut self.registry);
            }
        }
    }

    /// Route a detail response to its row. A row collapsed while the
    /// request was in flight refuses the result.
    pub async fn on_detail(&mut self, outcome: DetailOutcome) {
        let detail_id = outcome.detail_id;

        let response = match outcome.result {
            Ok(response) => response,
            Err(e) => {
                if self.panels.state(&detail_id) == PanelState::Loading {
                    self.panels.collapse(&detail_id, &mut self.registry);
                }
                self.notice(&format!("{} 상세 데이터 로딩 실패: {}", outcome.worker, e));
                return;
            }
        };

        if !self.panels.complete(&detail_id) {
            logging::log(
                Level::Debug,
                Domain::Fetch,
                "detail_dropped",
                obj(&[
                    ("detail_id", v_str(&detail_id)),
                    ("worker", v_str(&outcome.worker)),
                ]),
            );
            return;
        }

        if let Some(error) = response.error {
            self.panels.collapse(&detail_id, &mut self.registry);
            self.notice(&error);
            return;
        }

        logging::log(
            Level::Debug,
            Domain::Render,
            "detail_expanded",
            obj(&[
                ("detail_id", v_str(&detail_id)),
                ("worker", v_str(&response.worker)),
                ("total_pcs", v_num(response.summary.total_pcs as f64)),
                ("num_days", v_num(response.summary.num_days as f64)),
            ]),
        );

        if !response.hourly_data.values.is_empty() {
            self.registry.ensure(
                &hourly_canvas(&detail_id),
                ChartSpec {
                    kind: ChartKind::Bar,
                    labels: response.hourly_data.labels.clone(),
                    datasets: vec![Dataset::solid(
                        "시간대별 생산량",
                        response.hourly_data.values.clone(),
                    )],
                },
            );
        }
        if !response.daily_data.is_empty() {
            self.registry.ensure(
                &daily_canvas(&detail_id),
                ChartSpec {
                    kind: ChartKind::Line,
                    labels: response
                        .daily_data
                        .iter()
                        .map(|d| d.date.chars().skip(5).collect::<String>())
                        .collect(),
                    datasets: vec![Dataset::solid(
                        "일별 생산량",
                        response.daily_data.iter().map(|d| d.pcs).collect(),
                    )],
                },
            );
        }
    }

    // =========================================================================
    // Live channel and trace search
    // =========================================================================

    /// A push notification carries no data; the realtime tab refreshes
    /// immediately, every other tab only gets a notice.
    pub async fn on_live(&mut self, event: LiveEvent) {
        logging::log(
            Level::Info,
            Domain::Live,
            "data_updated",
            obj(&[("message", v_str(&event.message))]),
        );
        if TabKind::resolve(&self.view.active_tab) == TabKind::Status {
            self.notice("실시간 데이터가 업데이트되었습니다. 갱신합니다...");
            self.render_active().await;
        } else {
            self.notice("새로운 데이터가 감지되었습니다. 실시간 현황 탭에서 확인할 수 있습니다.");
        }
    }

    async fn run_trace_search(&mut self) {
        let request = match self.pending_trace.take() {
            Some(r) => r,
            None => return,
        };
        match self.backend.trace(&request).await {
            Ok(response) => {
                let table = render::trace_results_table(&response);
                logging::log(
                    Level::Info,
                    Domain::Render,
                    "trace_results",
                    obj(&[
                        ("kind", v_str(&response.kind)),
                        ("rows", v_num(table.rows.len() as f64)),
                    ]),
                );
                self.last_trace_sessions = if response.kind == crate::model::TRACE_KIND_SESSION {
                    response.data.clone()
                } else {
                    Vec::new()
                };
                if let Some(plan) = &mut self.last_plan {
                    plan.tables.retain(|t| t.title != "검색 결과");
                    plan.tables.push(table);
                }
            }
            Err(e) => self.notice(&format!("이력 검색 실패: {}", e)),
        }
    }

    async fn run_barcode_search(&mut self) {
        let barcode = match self.pending_barcode.take() {
            Some(b) if !b.trim().is_empty() => b,
            _ => {
                self.notice("바코드를 입력해주세요.");
                return;
            }
        };
        match self.backend.barcode_search(&barcode).await {
            Ok(result) => {
                let found = result
                    .get("found")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(!result.is_null());
                logging::log(
                    Level::Info,
                    Domain::Fetch,
                    "barcode_search",
                    obj(&[
                        ("barcode", v_str(&barcode)),
                        ("found", serde_json::Value::Bool(found)),
                    ]),
                );
                if !found {
                    self.notice("바코드를 찾을 수 없습니다.");
                }
            }
            Err(e) => self.notice(&format!("바코드 검색 실패: {}", e)),
        }
    }

    /// Barcode list popup for one row of the last session-trace result.
    async fn run_session_barcodes(&mut self) {
        let row = match self.pending_session_row.take() {
            Some(r) => r,
            None => return,
        };
        let session = self
            .last_trace_sessions
            .get(row)
            .cloned()
            .and_then(|v| serde_json::from_value::<crate::model::SessionRecord>(v).ok());
        let session = match session {
            Some(s) => s,
            None => {
                self.notice("선택한 세션을 찾을 수 없습니다.");
                return;
            }
        };
        match self.backend.session_barcodes(&session).await {
            Ok(result) => {
                if result.barcodes.is_empty() {
                    self.notice("스캔된 바코드 정보가 없습니다.");
                    return;
                }
                let table = crate::render::TableModel {
                    title: format!("제품 바코드 목록 ({})", session.item_display),
                    headers: vec!["#".to_string(), "바코드".to_string()],
                    rows: result
                        .barcodes
                        .iter()
                        .enumerate()
                        .map(|(i, bc)| vec![(i + 1).to_string(), bc.clone()])
                        .collect(),
                };
                if let Some(plan) = &mut self.last_plan {
                    plan.tables.retain(|t| !t.title.starts_with("제품 바코드 목록"));
                    plan.tables.push(table);
                }
            }
            Err(e) => self.notice(&format!("바코드 정보를 가져오는 데 실패했습니다: {}", e)),
        }
    }

    /// Excel export of the current session slice; the workbook bytes
    /// are opaque to the engine.
    async fn run_export(&mut self) {
        let sessions = match &self.data {
            Some(data) => data.filtered_sessions_data.clone(),
            None => {
                self.notice("내보낼 데이터가 없습니다.");
                return;
            }
        };
        if sessions.is_empty() {
            self.notice("내보낼 데이터가 없습니다.");
            return;
        }
        match self.backend.export_excel(&sessions).await {
            Ok(bytes) => logging::log(
                Level::Info,
                Domain::Fetch,
                "export_excel",
                obj(&[
                    ("sessions", v_num(sessions.len() as f64)),
                    ("bytes", v_num(bytes.len() as f64)),
                ]),
            ),
            Err(e) => self.notice(&format!("Excel 내보내기 실패: {}", e)),
        }
    }

    fn notice(&mut self, message: &str) {
        logging::log(
            Level::Warn,
            Domain::Ui,
            "notice",
            obj(&[("message", v_str(message))]),
        );
        self.last_notice = Some(message.to_string());
    }
}

fn period_for(filters: &FilterState, today: NaiveDate) -> &'static str {
    match (
        trend::parse_date(&filters.start_date),
        trend::parse_date(&filters.end_date),
    ) {
        (Some(start), Some(end)) => period_label(start, end, today),
        _ => "실시간",
    }
}

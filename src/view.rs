//! View and tab state: process-mode tab lists, tab-kind resolution,
//! per-tab sub-state, and the UI-event -> action table.

use chrono::NaiveDate;

use crate::model::ProcessMode;
use crate::ranking::SortKey;
use crate::trend::ComparisonPeriod;

// =============================================================================
// Period labels
// =============================================================================

pub const PERIOD_PREFIXES: [&str; 6] = ["실시간", "일간", "주간", "월간", "분기", "기간"];

/// Today or yesterday-to-today ranges are treated as the realtime view.
pub fn is_realtime_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> bool {
    let yesterday = today.pred_opt().unwrap_or(today);
    (start == today && end == today) || (start == yesterday && end == today)
}

/// Human period label for tab titles, by filter span.
pub fn period_label(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> &'static str {
    if is_realtime_range(start, end, today) {
        return "실시간";
    }
    let diff_days = (end - start).num_days();
    if diff_days <= 1 {
        "일간"
    } else if diff_days <= 7 {
        "주간"
    } else if diff_days <= 31 {
        "월간"
    } else if diff_days <= 93 {
        "분기"
    } else {
        "기간"
    }
}

// =============================================================================
// Tab lists
// =============================================================================

/// Display names of the tabs available in a mode, with the period label
/// folded into the dynamic titles.
pub fn tabs_for_mode(mode: ProcessMode, period: &str) -> Vec<String> {
    let realtime = period == "실시간";
    let status_tab = if realtime {
        "실시간 현황".to_string()
    } else {
        format!("{} 현황", period)
    };

    match mode {
        ProcessMode::Transfer => vec![
            status_tab,
            format!("{} 생산량 분석", period),
            "작업자별 분석".to_string(),
            "오류 로그".to_string(),
            "생산 이력 추적".to_string(),
            "상세 데이터".to_string(),
        ],
        ProcessMode::Inspection => vec![
            status_tab,
            format!("{} 검사량 분석", period),
            "작업자별 분석".to_string(),
            "오류 로그".to_string(),
            "생산 이력 추적".to_string(),
            "상세 데이터".to_string(),
        ],
        ProcessMode::Packaging => vec![
            status_tab,
            format!("{} 생산량 추이 분석", period),
            "출고일자별 분석".to_string(),
            "오류 로그".to_string(),
            "생산 이력 추적".to_string(),
            "상세 데이터".to_string(),
        ],
        ProcessMode::AllCompare => vec![
            format!("{} 공정 비교 분석", period),
            "생산 이력 추적".to_string(),
            "상세 데이터".to_string(),
        ],
    }
}

/// Keep the active tab if the new list still carries its kind,
/// otherwise fall back to the list's first tab.
pub fn retain_or_first(tabs: &[String], active: &str) -> String {
    let active_kind = TabKind::resolve(active);
    tabs.iter()
        .find(|t| active_kind != TabKind::Unknown && TabKind::resolve(t) == active_kind)
        .or_else(|| tabs.first())
        .cloned()
        .unwrap_or_default()
}

// =============================================================================
// Tab kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    /// Realtime (or period) status with worker/item tables.
    Status,
    /// Production/inspection volume trend with historical overlay.
    ProductionTrend,
    /// Per-worker leaderboard, radar and drill-down details.
    WorkerDetail,
    ErrorLog,
    Traceability,
    DetailTable,
    /// Cross-stage comparison (inspection -> transfer -> packaging).
    Comparison,
    ShippingDate,
    /// Anything unrecognized renders a placeholder, never an error.
    Unknown,
}

impl TabKind {
    /// Resolve a display name to its kind: strip the period prefix,
    /// drop whitespace, then match the core keyword.
    pub fn resolve(name: &str) -> TabKind {
        let mut core = name.trim();
        for prefix in PERIOD_PREFIXES {
            if let Some(rest) = core.strip_prefix(prefix) {
                core = rest.trim_start();
                break;
            }
        }
        let compact: String = core.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "현황" => TabKind::Status,
            "생산량분석" | "검사량분석" | "생산량추이분석" => TabKind::ProductionTrend,
            "작업자별분석" => TabKind::WorkerDetail,
            "오류로그" => TabKind::ErrorLog,
            "생산이력추적" => TabKind::Traceability,
            "상세데이터" => TabKind::DetailTable,
            "공정비교분석" => TabKind::Comparison,
            "출고일자별분석" => TabKind::ShippingDate,
            _ => TabKind::Unknown,
        }
    }
}

// =============================================================================
// Per-tab view state
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub active_tab: String,
    pub sort_key: SortKey,
    pub selected_worker: Option<String>,
    pub comparison_period: ComparisonPeriod,
    pub current_page: usize,
    pub rows_per_page: usize,
}

impl ViewState {
    /// Fresh sub-state, as seeded at launch and after every process-mode
    /// change: nothing carries over from the previous mode.
    pub fn reseed(active_tab: String, rows_per_page: usize) -> Self {
        Self {
            active_tab,
            sort_key: SortKey::default(),
            selected_worker: None,
            comparison_period: ComparisonPeriod::default(),
            current_page: 1,
            rows_per_page,
        }
    }
}

// =============================================================================
// UI events and the event -> action table
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    TabClicked(String),
    ModeChanged(ProcessMode),
    ApplyFilters {
        start_date: String,
        end_date: String,
        workers: Vec<String>,
    },
    /// Packaging-mode shipping window filter.
    ApplyShippingRange {
        start_date: Option<String>,
        end_date: Option<String>,
    },
    Reset,
    SortChanged(String),
    WorkerSelected(String),
    /// Toggle one worker row's detail panel by its detail id.
    ToggleDetail(String),
    PageChanged(usize),
    ComparisonPeriodChanged(ComparisonPeriod),
    TraceSearch {
        wid: String,
        fpb: String,
        barcode: String,
    },
    /// Quick single-barcode lookup.
    BarcodeSearch(String),
    /// Barcode list for the n-th row of the last trace result.
    SessionBarcodes(usize),
    /// Export the current session slice as an Excel workbook.
    ExportExcel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Issue a new `/api/data` fetch (re-render follows on arrival).
    Refetch,
    /// Re-render the active tab against the current snapshot.
    RerenderActive,
    /// Expand or collapse the toggled detail row.
    ToggleDetailRow,
    /// Run the traceability search and render its results.
    RunTraceSearch,
    /// Opaque backend round-trips (barcode lookup, session barcodes,
    /// Excel export); results surface as tables or notices.
    RunBarcodeSearch,
    RunSessionBarcodes,
    RunExport,
}

/// Declarative mapping from user events to controller follow-ups.
/// State mutation happens first; these actions run after.
pub fn actions_for(event: &UiEvent) -> &'static [Action] {
    match event {
        UiEvent::TabClicked(_) => &[Action::RerenderActive],
        UiEvent::ModeChanged(_) => &[Action::Refetch],
        UiEvent::ApplyFilters { .. } => &[Action::Refetch],
        UiEvent::ApplyShippingRange { .. } => &[Action::Refetch],
        UiEvent::Reset => &[Action::Refetch],
        UiEvent::SortChanged(_) => &[Action::RerenderActive],
        UiEvent::WorkerSelected(_) => &[Action::RerenderActive],
        UiEvent::ToggleDetail(_) => &[Action::ToggleDetailRow],
        UiEvent::PageChanged(_) => &[Action::RerenderActive],
        UiEvent::ComparisonPeriodChanged(_) => &[Action::RerenderActive],
        UiEvent::TraceSearch { .. } => &[Action::RunTraceSearch],
        UiEvent::BarcodeSearch(_) => &[Action::RunBarcodeSearch],
        UiEvent::SessionBarcodes(_) => &[Action::RunSessionBarcodes],
        UiEvent::ExportExcel => &[Action::RunExport],
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_realtime_range_detection() {
        let today = d("2026-08-07");
        assert!(is_realtime_range(today, today, today));
        assert!(is_realtime_range(d("2026-08-06"), today, today));
        assert!(!is_realtime_range(d("2026-08-01"), today, today));
        assert!(!is_realtime_range(d("2026-08-06"), d("2026-08-06"), today));
    }

    #[test]
    fn test_period_labels_by_span() {
        let today = d("2026-08-07");
        assert_eq!(period_label(today, today, today), "실시간");
        assert_eq!(period_label(d("2026-08-01"), d("2026-08-01"), today), "일간");
        assert_eq!(period_label(d("2026-07-26"), d("2026-08-01"), today), "주간");
        assert_eq!(period_label(d("2026-07-07"), d("2026-08-06"), today), "월간");
        assert_eq!(period_label(d("2026-05-07"), d("2026-08-06"), today), "분기");
        assert_eq!(period_label(d("2025-08-07"), d("2026-08-06"), today), "기간");
    }

    #[test]
    fn test_tab_lists_per_mode() {
        let transfer = tabs_for_mode(ProcessMode::Transfer, "실시간");
        assert_eq!(transfer[0], "실시간 현황");
        assert_eq!(transfer[1], "실시간 생산량 분석");
        assert!(transfer.contains(&"작업자별 분석".to_string()));

        let inspection = tabs_for_mode(ProcessMode::Inspection, "주간");
        assert_eq!(inspection[0], "주간 현황");
        assert_eq!(inspection[1], "주간 검사량 분석");

        let packaging = tabs_for_mode(ProcessMode::Packaging, "월간");
        assert!(packaging.contains(&"출고일자별 분석".to_string()));
        assert!(!packaging.contains(&"작업자별 분석".to_string()));

        let compare = tabs_for_mode(ProcessMode::AllCompare, "분기");
        assert_eq!(compare[0], "분기 공정 비교 분석");
        assert_eq!(compare.len(), 3);
    }

    #[test]
    fn test_tab_kind_resolution_strips_period_prefix() {
        assert_eq!(TabKind::resolve("실시간 현황"), TabKind::Status);
        assert_eq!(TabKind::resolve("주간 현황"), TabKind::Status);
        assert_eq!(TabKind::resolve("월간 생산량 분석"), TabKind::ProductionTrend);
        assert_eq!(TabKind::resolve("일간 검사량 분석"), TabKind::ProductionTrend);
        assert_eq!(
            TabKind::resolve("분기 생산량 추이 분석"),
            TabKind::ProductionTrend
        );
        assert_eq!(TabKind::resolve("작업자별 분석"), TabKind::WorkerDetail);
        assert_eq!(TabKind::resolve("기간 공정 비교 분석"), TabKind::Comparison);
        assert_eq!(TabKind::resolve("출고일자별 분석"), TabKind::ShippingDate);
        assert_eq!(TabKind::resolve("오류 로그"), TabKind::ErrorLog);
        assert_eq!(TabKind::resolve("생산 이력 추적"), TabKind::Traceability);
        assert_eq!(TabKind::resolve("상세 데이터"), TabKind::DetailTable);
    }

    #[test]
    fn test_unknown_tab_resolves_to_placeholder() {
        assert_eq!(TabKind::resolve("HR"), TabKind::Unknown);
        assert_eq!(TabKind::resolve(""), TabKind::Unknown);
    }

    #[test]
    fn test_retain_or_first_keeps_valid_tab_across_period_change() {
        // The same kind under a different period title is still "the
        // same tab" after a refetch changes the span.
        let tabs = tabs_for_mode(ProcessMode::Transfer, "월간");
        assert_eq!(retain_or_first(&tabs, "주간 생산량 분석"), "월간 생산량 분석");
    }

    #[test]
    fn test_retain_or_first_falls_back_on_mode_switch() {
        // Worker-detail exists in the inspection room but not in
        // packaging; switching must land on packaging's first tab.
        let tabs = tabs_for_mode(ProcessMode::Packaging, "실시간");
        assert_eq!(retain_or_first(&tabs, "작업자별 분석"), "실시간 현황");
    }

    #[test]
    fn test_reseed_resets_per_tab_state() {
        let view = ViewState::reseed("실시간 현황".to_string(), 50);
        assert_eq!(view.sort_key, SortKey::ScoreDesc);
        assert_eq!(view.selected_worker, None);
        assert_eq!(view.comparison_period, ComparisonPeriod::Daily);
        assert_eq!(view.current_page, 1);
    }

    #[test]
    fn test_action_table() {
        assert_eq!(
            actions_for(&UiEvent::ApplyFilters {
                start_date: "2026-08-01".into(),
                end_date: "2026-08-07".into(),
                workers: vec![],
            }),
            &[Action::Refetch]
        );
        assert_eq!(
            actions_for(&UiEvent::TabClicked("상세 데이터".into())),
            &[Action::RerenderActive]
        );
        assert_eq!(
            actions_for(&UiEvent::ToggleDetail("worker-detail-0".into())),
            &[Action::ToggleDetailRow]
        );
    }
}

//! Per-tab render planning: pure functions from the current snapshot to
//! typed view models (tables, chart builds, notices). Planners never
//! fetch; the controller hands them everything they read.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::charts::{ChartKind, ChartSpec, Dataset};
use crate::model::{
    ComparisonSummary, FilterState, FullData, ProcessMode, RealtimeSnapshot, SessionRecord,
    TraceResponse, TRACE_KIND_BARCODE,
};
use crate::ranking::{radar_metrics, radar_scores, rank};
use crate::trend::{
    self, bucket_series, comparison_series, derive_kpis, overlay_series, shipping_pivot,
    Granularity,
};
use crate::view::{TabKind, ViewState};

/// Item rows need this many sessions before an average is shown.
const ITEM_PERF_MIN_SESSIONS: usize = 30;

// =============================================================================
// View models
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBuild {
    pub canvas: String,
    pub spec: ChartSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableModel {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub detail_id: String,
    pub worker: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    pub title: String,
    pub charts: Vec<ChartBuild>,
    pub tables: Vec<TableModel>,
    pub notices: Vec<String>,
    /// Worker rows whose detail panels auto-expand (worker-detail tab).
    pub detail_rows: Vec<DetailRow>,
}

impl RenderPlan {
    fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Formatting helpers
// =============================================================================

pub fn format_seconds(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() => {
            if s >= 60.0 {
                let minutes = (s / 60.0).floor() as i64;
                let rest = (s % 60.0).round() as i64;
                format!("{}분 {}초", minutes, rest)
            } else {
                format!("{:.1}초", s)
            }
        }
        _ => "N/A".to_string(),
    }
}

fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Today-vs-average efficiency with the traffic-light grade used on the
/// realtime tab: above 110% 우수, above 90% 보통, otherwise 개선필요.
pub fn efficiency_status(today_total: f64, avg_total: f64) -> (f64, &'static str) {
    let efficiency = if avg_total > 0.0 {
        today_total / avg_total * 100.0
    } else {
        0.0
    };
    let grade = if efficiency > 110.0 {
        "우수"
    } else if efficiency > 90.0 {
        "보통"
    } else {
        "개선필요"
    };
    (efficiency, grade)
}

fn val_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Build the render plan for a snapshot-backed tab. The realtime status
/// tab fetches its own data and goes through `plan_status` instead.
pub fn plan_for(
    kind: TabKind,
    tab_name: &str,
    filters: &FilterState,
    view: &ViewState,
    data: &FullData,
) -> RenderPlan {
    match kind {
        TabKind::ProductionTrend => plan_production(tab_name, filters, data),
        TabKind::WorkerDetail => plan_worker_detail(tab_name, filters, view, data),
        TabKind::ErrorLog => plan_error_log(tab_name, data),
        TabKind::DetailTable => plan_detail_table(tab_name, view, data),
        TabKind::Comparison => plan_comparison(tab_name, view, data),
        TabKind::ShippingDate => plan_shipping(tab_name, data),
        TabKind::Traceability => plan_traceability(tab_name),
        // The status tab is realtime-backed and planned by plan_status.
        TabKind::Status => RenderPlan::titled(tab_name),
        TabKind::Unknown => {
            let mut plan = RenderPlan::titled(tab_name);
            plan.notices
                .push(format!("{} 탭을 찾을 수 없습니다.", tab_name));
            plan
        }
    }
}

// =============================================================================
// Production trend
// =============================================================================

fn overlay_label(granularity: Granularity, overlay: &[f64]) -> String {
    let mean = if overlay.is_empty() {
        0.0
    } else {
        overlay.iter().sum::<f64>() / overlay.len() as f64
    };
    let scope = match granularity {
        Granularity::Hourly => "시간대별",
        Granularity::Daily => "요일별",
        Granularity::WeekOfMonth => "주차별",
        Granularity::Monthly => "월별",
    };
    format!("과거 {} 평균 ({:.0} PCS)", scope, mean)
}

fn plan_production(tab_name: &str, filters: &FilterState, data: &FullData) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    let sessions = &data.filtered_sessions_data;

    let kpis = derive_kpis(sessions);
    plan.tables.push(TableModel {
        title: "핵심 지표".to_string(),
        headers: vec!["지표".to_string(), "값".to_string()],
        rows: vec![
            vec![
                "평균 트레이 작업시간".to_string(),
                format_seconds(Some(kpis.avg_tray_time)),
            ],
            vec!["초도 수율 (FPY)".to_string(), format_percent(kpis.avg_fpy)],
            vec![
                "총 생산량".to_string(),
                format!("{} PCS", kpis.total_production),
            ],
        ],
    });

    let granularity = match (
        trend::parse_date(&filters.start_date),
        trend::parse_date(&filters.end_date),
    ) {
        (Some(start), Some(end)) => Granularity::for_span_days(trend::span_days(start, end)),
        _ => Granularity::Daily,
    };

    let series = bucket_series(sessions, granularity);
    let overlay = overlay_series(&series, &data.historical_summary.averages);

    let primary_label = if filters.process_mode == ProcessMode::Packaging {
        "생산량 (PCS) - 추정치".to_string()
    } else {
        "생산량 (PCS)".to_string()
    };
    let mut datasets = vec![Dataset::solid(
        primary_label,
        series.iter().map(|p| p.value).collect(),
    )];
    if overlay.iter().any(|v| *v > 0.0) {
        datasets.push(Dataset::dashed(overlay_label(granularity, &overlay), overlay));
    }

    plan.charts.push(ChartBuild {
        canvas: "production-trend-chart".to_string(),
        spec: ChartSpec {
            kind: ChartKind::Bar,
            labels: series.iter().map(|p| p.label.clone()).collect(),
            datasets,
        },
    });
    plan
}

// =============================================================================
// Worker detail
// =============================================================================

fn plan_worker_detail(
    tab_name: &str,
    filters: &FilterState,
    view: &ViewState,
    data: &FullData,
) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    if data.worker_data.is_empty() {
        plan.notices
            .push("분석할 작업자 데이터가 없습니다.".to_string());
        return plan;
    }

    let ranked = rank(&data.worker_data, view.sort_key);
    let total_pcs: i64 = ranked.iter().map(|w| w.total_pcs_completed).sum();
    let avg_pcs = total_pcs as f64 / ranked.len() as f64;

    let mut leaderboard = Vec::new();
    for (i, w) in ranked.iter().enumerate() {
        let diff = w.total_pcs_completed as f64 - avg_pcs;
        leaderboard.push(vec![
            format!("{}", i + 1),
            w.worker.clone(),
            format!("{} PCS", w.total_pcs_completed),
            format!("{}{:.0}", if diff >= 0.0 { "+" } else { "" }, diff),
            format!("{:.1}", w.overall_score),
        ]);
    }
    plan.tables.push(TableModel {
        title: "작업자별 생산량".to_string(),
        headers: vec![
            "순위".to_string(),
            "작업자".to_string(),
            "생산량".to_string(),
            "평균대비".to_string(),
            "종합 점수".to_string(),
        ],
        rows: leaderboard,
    });

    // Selected worker falls back to the top of the current ordering.
    let selected = view
        .selected_worker
        .as_ref()
        .filter(|name| ranked.iter().any(|w| &w.worker == *name))
        .cloned()
        .unwrap_or_else(|| ranked[0].worker.clone());

    if let Some(perf) = ranked.iter().find(|w| w.worker == selected) {
        let best = match (&perf.best_work_time, &perf.best_work_time_date) {
            (Some(t), Some(d)) => format!("(금주 최고: {} / {})", format_seconds(Some(*t)), d),
            _ => String::new(),
        };
        plan.tables.push(TableModel {
            title: format!("{} 상세", selected),
            headers: vec!["지표".to_string(), "값".to_string()],
            rows: vec![
                vec![
                    "종합 성과 점수".to_string(),
                    format!("{:.1} 점", perf.overall_score),
                ],
                vec![
                    "평균 작업 시간".to_string(),
                    format!("{} {}", format_seconds(Some(perf.avg_work_time)), best)
                        .trim_end()
                        .to_string(),
                ],
                vec![
                    "평균 준비 시간".to_string(),
                    format_seconds(Some(perf.avg_latency)),
                ],
                vec![
                    "초도 수율".to_string(),
                    format_percent(perf.first_pass_yield),
                ],
            ],
        });

        let metrics = radar_metrics(filters.process_mode);
        plan.charts.push(ChartBuild {
            canvas: "worker-radar-chart".to_string(),
            spec: ChartSpec {
                kind: ChartKind::Radar,
                labels: metrics.iter().map(|m| m.label.to_string()).collect(),
                datasets: vec![Dataset::solid(
                    selected.clone(),
                    radar_scores(&selected, metrics, &data.normalized_performance),
                )],
            },
        });

        plan.tables
            .push(item_performance_table(&data.filtered_sessions_data, &selected));
    }

    plan.detail_rows = ranked
        .iter()
        .enumerate()
        .map(|(i, w)| DetailRow {
            detail_id: format!("worker-detail-{}", i),
            worker: w.worker.clone(),
        })
        .collect();
    plan
}

fn item_performance_table(sessions: &[SessionRecord], worker: &str) -> TableModel {
    struct ItemStats {
        times: Vec<f64>,
        count: usize,
    }

    let mut per_item: BTreeMap<String, ItemStats> = BTreeMap::new();
    for s in sessions.iter().filter(|s| s.worker == worker) {
        let phase = s
            .phase
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let key = format!("{} / {}차", s.item_display, phase);
        let entry = per_item.entry(key).or_insert(ItemStats {
            times: Vec::new(),
            count: 0,
        });
        if let Some(t) = s.work_time {
            entry.times.push(t);
        }
        entry.count += 1;
    }

    let rows = per_item
        .into_iter()
        .map(|(item, stats)| {
            let avg = if stats.count < ITEM_PERF_MIN_SESSIONS || stats.times.is_empty() {
                "데이터 부족".to_string()
            } else {
                format_seconds(Some(
                    stats.times.iter().sum::<f64>() / stats.times.len() as f64,
                ))
            };
            vec![item, avg, stats.count.to_string()]
        })
        .collect();

    TableModel {
        title: "품목별 성과".to_string(),
        headers: vec![
            "품목/차수".to_string(),
            "평균시간".to_string(),
            "처리 세트 수".to_string(),
        ],
        rows,
    }
}

// =============================================================================
// Error log
// =============================================================================

fn plan_error_log(tab_name: &str, data: &FullData) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);

    let mut events: Vec<_> = data
        .filtered_raw_events
        .iter()
        .filter(|e| {
            let lowered = e.event.to_lowercase();
            lowered.contains("error") || lowered.contains("fail") || lowered.contains("cancel")
        })
        .collect();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if events.is_empty() {
        plan.notices
            .push("선택된 기간/작업자에 해당하는 오류 기록이 없습니다.".to_string());
        return plan;
    }

    plan.tables.push(TableModel {
        title: "오류 로그".to_string(),
        headers: vec![
            "시간".to_string(),
            "작업자".to_string(),
            "오류 유형".to_string(),
            "상세 정보".to_string(),
        ],
        rows: events
            .iter()
            .map(|e| {
                vec![
                    e.timestamp.clone(),
                    e.worker.clone(),
                    e.event.clone(),
                    match &e.details {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    },
                ]
            })
            .collect(),
    });
    plan
}

// =============================================================================
// Detail table (paginated sessions)
// =============================================================================

fn plan_detail_table(tab_name: &str, view: &ViewState, data: &FullData) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    let sessions = &data.filtered_sessions_data;

    let rows_per_page = view.rows_per_page.max(1);
    let total_pages = sessions.len().div_ceil(rows_per_page).max(1);
    let page = view.current_page.clamp(1, total_pages);
    let start = (page - 1) * rows_per_page;
    let slice = &sessions[start.min(sessions.len())..(start + rows_per_page).min(sessions.len())];

    plan.tables.push(TableModel {
        title: "상세 데이터".to_string(),
        headers: vec![
            "날짜".to_string(),
            "작업자".to_string(),
            "공정".to_string(),
            "품목".to_string(),
            "작업시간".to_string(),
            "완료수량".to_string(),
            "오류".to_string(),
        ],
        rows: slice
            .iter()
            .map(|s| {
                vec![
                    s.date.clone(),
                    s.worker.clone(),
                    s.process.clone(),
                    s.item_display.clone(),
                    format_seconds(s.work_time),
                    s.pcs_completed.to_string(),
                    if s.had_error { "예" } else { "아니오" }.to_string(),
                ]
            })
            .collect(),
    });
    plan.notices.push(format!("페이지 {} / {}", page, total_pages));
    plan
}

// =============================================================================
// Cross-stage comparison
// =============================================================================

fn summary_rows(summary: &ComparisonSummary) -> Vec<Vec<String>> {
    vec![
        vec![
            "총 처리 세트 (Tray)".to_string(),
            summary.inspection.total_trays.to_string(),
            summary.transfer_standby_trays.to_string(),
            summary.transfer.total_trays.to_string(),
            summary.packaging_standby_trays.to_string(),
            summary.packaging.total_trays.to_string(),
        ],
        vec![
            "총 처리 수량 (PCS)".to_string(),
            summary.inspection.total_pcs_completed.to_string(),
            summary.transfer_standby_pcs.to_string(),
            summary.transfer.total_pcs_completed.to_string(),
            summary.packaging_standby_pcs.to_string(),
            summary.packaging.total_pcs_completed.to_string(),
        ],
        vec![
            "평균 작업 시간".to_string(),
            format_seconds(Some(summary.inspection.avg_tray_time)),
            "—".to_string(),
            format_seconds(Some(summary.transfer.avg_tray_time)),
            "—".to_string(),
            format_seconds(Some(summary.packaging.avg_tray_time)),
        ],
        vec![
            "초도 수율 (FPY)".to_string(),
            format_percent(summary.inspection.avg_fpy),
            "—".to_string(),
            format_percent(summary.transfer.avg_fpy),
            "—".to_string(),
            format_percent(summary.packaging.avg_fpy),
        ],
    ]
}

fn plan_comparison(tab_name: &str, view: &ViewState, data: &FullData) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    let comparison = match &data.comparison_data {
        Some(c) => c,
        None => {
            plan.notices
                .push("비교 데이터를 불러올 수 없습니다. 필터 조건을 확인해주세요.".to_string());
            return plan;
        }
    };

    if let Some(summary) = comparison
        .summary_today
        .as_ref()
        .or(comparison.summary_period.as_ref())
    {
        plan.tables.push(TableModel {
            title: "전체 공정 비교 (검사 → 이적 → 포장)".to_string(),
            headers: vec![
                "지표".to_string(),
                "검사완료".to_string(),
                "이적대기".to_string(),
                "이적완료".to_string(),
                "포장대기".to_string(),
                "포장완료".to_string(),
            ],
            rows: summary_rows(summary),
        });
    }

    let period = view.comparison_period;
    let stages = [
        ("comp-chart-inspection", "검사실", &comparison.trends.inspection),
        ("comp-chart-transfer", "이적실", &comparison.trends.transfer),
        ("comp-chart-packaging", "포장실", &comparison.trends.packaging),
    ];
    for (canvas, stage, sessions) in stages {
        let series = comparison_series(sessions, period);
        plan.charts.push(ChartBuild {
            canvas: canvas.to_string(),
            spec: ChartSpec {
                kind: ChartKind::Line,
                labels: series.iter().map(|p| p.label.clone()).collect(),
                datasets: vec![Dataset::solid(
                    format!("{} {} 생산량", stage, period.label()),
                    series.iter().map(|p| p.value).collect(),
                )],
            },
        });
    }
    plan
}

// =============================================================================
// Shipping dates
// =============================================================================

fn plan_shipping(tab_name: &str, data: &FullData) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    let pivot = match shipping_pivot(&data.filtered_sessions_data) {
        Some(p) => p,
        None => {
            plan.notices
                .push("표시할 출고일자 데이터가 없습니다.".to_string());
            return plan;
        }
    };

    let mut headers = vec!["품목".to_string()];
    headers.extend(pivot.dates.iter().cloned());
    headers.push("총 PCS".to_string());
    headers.push("총 Pallets".to_string());

    plan.tables.push(TableModel {
        title: "출고일자별 생산량".to_string(),
        headers,
        rows: pivot
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.item.clone()];
                cells.extend(row.by_date.iter().map(|v| v.to_string()));
                cells.push(row.total_pcs.to_string());
                cells.push(format!("{:.1}", row.total_pallets));
                cells
            })
            .collect(),
    });
    plan
}

// =============================================================================
// Traceability
// =============================================================================

fn plan_traceability(tab_name: &str) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);
    plan.notices.push(
        "작업지시 ID (WID), 완제품 배치 (FPB) 또는 개별 제품 바코드로 검색하세요.".to_string(),
    );
    plan
}

/// Results table for a trace search; the two response kinds carry
/// different columns.
pub fn trace_results_table(response: &TraceResponse) -> TableModel {
    if response.kind == TRACE_KIND_BARCODE {
        TableModel {
            title: "검색 결과".to_string(),
            headers: vec![
                "시간".to_string(),
                "공정".to_string(),
                "작업자".to_string(),
                "이벤트".to_string(),
                "상세정보".to_string(),
            ],
            rows: response
                .data
                .iter()
                .map(|e| {
                    vec![
                        val_str(e, "timestamp"),
                        val_str(e, "process"),
                        val_str(e, "worker"),
                        val_str(e, "event"),
                        val_str(e, "details"),
                    ]
                })
                .collect(),
        }
    } else {
        TableModel {
            title: "검색 결과".to_string(),
            headers: vec![
                "공정".to_string(),
                "작업자".to_string(),
                "작업 시작".to_string(),
                "작업 종료".to_string(),
                "품목".to_string(),
                "완료수량".to_string(),
                "WID".to_string(),
                "FPB".to_string(),
            ],
            rows: response
                .data
                .iter()
                .map(|s| {
                    vec![
                        val_str(s, "process"),
                        val_str(s, "worker"),
                        val_str(s, "start_time_dt"),
                        val_str(s, "end_time_dt"),
                        val_str(s, "item_display"),
                        val_str(s, "pcs_completed"),
                        val_str(s, "work_order_id"),
                        val_str(s, "product_batch"),
                    ]
                })
                .collect(),
        }
    }
}

// =============================================================================
// Realtime status
// =============================================================================

pub fn plan_status(tab_name: &str, realtime: &RealtimeSnapshot) -> RenderPlan {
    let mut plan = RenderPlan::titled(tab_name);

    if realtime.worker_status.is_empty() {
        plan.notices.push("작업자 현황 데이터 없음".to_string());
    } else {
        plan.tables.push(TableModel {
            title: "작업자별 현황".to_string(),
            headers: vec![
                "작업자".to_string(),
                "총 PCS".to_string(),
                "평균 시간(초)".to_string(),
                "세트 수".to_string(),
            ],
            rows: realtime
                .worker_status
                .iter()
                .map(|w| {
                    vec![
                        w.worker.clone(),
                        w.pcs_completed.to_string(),
                        w.avg_work_time
                            .map(|t| format!("{:.1}", t))
                            .unwrap_or_else(|| "N/A".to_string()),
                        w.session_count.to_string(),
                    ]
                })
                .collect(),
        });
    }

    if !realtime.item_status.is_empty() {
        plan.tables.push(TableModel {
            title: "품목별 현황".to_string(),
            headers: vec![
                "품목".to_string(),
                "생산량 (PCS)".to_string(),
                "파렛트 수량".to_string(),
            ],
            rows: realtime
                .item_status
                .iter()
                .map(|i| {
                    vec![
                        i.item_display.clone(),
                        i.pcs_completed.to_string(),
                        i.pallet_count.to_string(),
                    ]
                })
                .collect(),
        });
    }

    let today_total: f64 = realtime.hourly_production.today.iter().sum();
    let avg_total: f64 = realtime.hourly_production.average.iter().sum();
    let (efficiency, grade) = efficiency_status(today_total, avg_total);

    if let Some(monthly) = &realtime.monthly_averages {
        plan.tables.push(TableModel {
            title: "최근 30일 평균 및 오늘 효율성".to_string(),
            headers: vec!["구분".to_string(), "값".to_string()],
            rows: vec![
                vec![
                    "일평균 생산량 (PCS)".to_string(),
                    format!("{:.1}", monthly.daily_total_pcs),
                ],
                vec![
                    "일평균 파렛트 수".to_string(),
                    format!("{:.1}", monthly.daily_total_pallets),
                ],
                vec![
                    "일평균 작업자 수".to_string(),
                    format!("{:.1}", monthly.daily_worker_count),
                ],
                vec![
                    "평균 작업시간 (초)".to_string(),
                    format!("{:.1}", monthly.daily_avg_work_time),
                ],
                vec!["오늘 총 생산량".to_string(), format!("{} PCS", today_total)],
                vec![
                    "오늘 효율성".to_string(),
                    format!("{:.1}% {}", efficiency, grade),
                ],
            ],
        });
    }

    let mut datasets = Vec::new();
    if realtime.hourly_production.average.iter().any(|v| *v > 0.0) {
        datasets.push(Dataset::dashed(
            "30일 평균 (기준선)",
            realtime.hourly_production.average.clone(),
        ));
    }
    datasets.push(Dataset::solid(
        "오늘 생산량",
        realtime.hourly_production.today.clone(),
    ));

    plan.charts.push(ChartBuild {
        canvas: "realtime-hourly-chart".to_string(),
        spec: ChartSpec {
            kind: ChartKind::Bar,
            labels: realtime.hourly_production.labels.clone(),
            datasets,
        },
    });
    plan
}

// =============================================================================
// Tests
// =============================================================================

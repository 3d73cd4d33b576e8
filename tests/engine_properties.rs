//! Cross-module properties of the aggregation engine: series/overlay
//! alignment, calendar bucketing, ranking stability, normalization
//! defaults and chart-handle accounting.

use serde_json::json;

use lineboard::charts::{ChartKind, ChartRegistry, ChartSpec, ChartSurface, ChartHandle, Dataset};
use lineboard::model::{
    FilterState, FullData, HistoricalAverages, NormalizedWorkerPerformance, ProcessMode,
    SessionRecord, WorkerAggregate,
};
use lineboard::ranking::{radar_metrics, radar_scores, rank, SortKey};
use lineboard::render::{plan_for, RenderPlan};
use lineboard::trend::{bucket_series, overlay_series, Granularity};
use lineboard::view::{TabKind, ViewState};

fn session(date: &str, hour: u32, pcs: i64) -> SessionRecord {
    serde_json::from_value(json!({
        "date": date,
        "start_time_dt": format!("{}T{:02}:15:00", date, hour),
        "worker": "김철수",
        "process": "포장실",
        "item_display": "ITEM-1",
        "pcs_completed": pcs,
        "work_time": 95.0,
        "had_error": 0
    }))
    .unwrap()
}

fn spread_sessions() -> Vec<SessionRecord> {
    // Ten months of data, a few sessions per month.
    let mut out = Vec::new();
    for month in 1..=10 {
        for day in [3, 12, 25] {
            out.push(session(&format!("2026-{:02}-{:02}", month, day), 9, 60));
        }
    }
    out
}

#[test]
fn overlay_matches_series_length_for_all_granularities() {
    let sessions = spread_sessions();
    let mut averages = HistoricalAverages::default();
    for h in 0..24 {
        averages.hourly_pcs.insert(h, h as f64);
    }
    for w in 0..7 {
        averages.weekday_pcs.insert(w, 100.0 + w as f64);
    }
    for wk in 1..=5 {
        averages.week_of_month_pcs.insert(wk, 1000.0 * wk as f64);
    }
    for m in 1..=12 {
        averages.monthly_pcs.insert(m, 10_000.0 * m as f64);
    }

    for granularity in [
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::WeekOfMonth,
        Granularity::Monthly,
    ] {
        let series = bucket_series(&sessions, granularity);
        let overlay = overlay_series(&series, &averages);
        assert_eq!(series.len(), overlay.len(), "{:?}", granularity);
        assert!(overlay.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn packaging_room_empty_day_has_exact_hourly_axis() {
    // Packaging mode, single day, zero sessions outside 07-19: labels
    // are exactly 07시..19시 and every value is 0.
    let mut filters = FilterState::for_today("2026-08-07");
    filters.process_mode = ProcessMode::Packaging;
    let view = ViewState::reseed("실시간 현황".to_string(), 50);
    let data = FullData::default();

    let plan: RenderPlan = plan_for(
        TabKind::ProductionTrend,
        "실시간 생산량 추이 분석",
        &filters,
        &view,
        &data,
    );
    let spec = &plan.charts[0].spec;
    let expected: Vec<String> = (7..=19).map(|h| format!("{:02}시", h)).collect();
    assert_eq!(spec.labels, expected);
    assert!(spec.datasets[0].data.iter().all(|v| *v == 0.0));
}

#[test]
fn sunday_record_uses_monday_based_weekday_six() {
    // 2026-08-02 is a Sunday; its overlay value must come from key 6.
    let sessions = vec![session("2026-08-02", 9, 60)];
    let mut averages = HistoricalAverages::default();
    averages.weekday_pcs.insert(0, 1.0);
    averages.weekday_pcs.insert(6, 777.0);

    let series = bucket_series(&sessions, Granularity::Daily);
    let overlay = overlay_series(&series, &averages);
    assert_eq!(overlay, vec![777.0]);
}

#[test]
fn equal_scores_preserve_input_order() {
    let workers: Vec<WorkerAggregate> = ["가", "나", "다", "라"]
        .iter()
        .map(|name| {
            serde_json::from_value(json!({
                "worker": name, "overall_score": 88.0, "avg_work_time": 100.0,
                "session_count": 5, "total_pcs_completed": 300
            }))
            .unwrap()
        })
        .collect();
    let ranked = rank(&workers, SortKey::ScoreDesc);
    let names: Vec<&str> = ranked.iter().map(|w| w.worker.as_str()).collect();
    assert_eq!(names, vec!["가", "나", "다", "라"]);
}

#[test]
fn missing_normalized_row_yields_zero_axes_and_renders() {
    let mut data = FullData::default();
    data.worker_data = vec![serde_json::from_value(json!({
        "worker": "김철수", "overall_score": 90.0, "avg_work_time": 100.0,
        "avg_latency": 9.0, "first_pass_yield": 0.99,
        "session_count": 40, "total_pcs_completed": 2400
    }))
    .unwrap()];
    // No normalized_performance rows at all.
    let filters = FilterState::for_today("2026-08-07");
    let view = ViewState::reseed("작업자별 분석".to_string(), 50);

    let plan = plan_for(TabKind::WorkerDetail, "작업자별 분석", &filters, &view, &data);
    let radar = plan
        .charts
        .iter()
        .find(|c| c.canvas == "worker-radar-chart")
        .expect("radar renders even without normalized data");
    assert!(radar.spec.datasets[0].data.iter().all(|v| *v == 0.0));

    let normalized: Vec<NormalizedWorkerPerformance> = Vec::new();
    let scores = radar_scores("김철수", radar_metrics(ProcessMode::Transfer), &normalized);
    assert_eq!(scores, vec![0.0; 4]);
}

struct CountingSurface {
    live: std::rc::Rc<std::cell::RefCell<i64>>,
    next: u64,
}

impl ChartSurface for CountingSurface {
    fn create(&mut self, _canvas: &str, _spec: &ChartSpec) -> ChartHandle {
        *self.live.borrow_mut() += 1;
        self.next += 1;
        ChartHandle(self.next)
    }

    fn destroy(&mut self, _canvas: &str, _handle: ChartHandle) {
        *self.live.borrow_mut() -= 1;
    }
}

#[test]
fn ensure_chart_is_destroy_then_create() {
    let live = std::rc::Rc::new(std::cell::RefCell::new(0i64));
    let mut registry = ChartRegistry::new(Box::new(CountingSurface {
        live: live.clone(),
        next: 0,
    }));

    let spec_a = ChartSpec {
        kind: ChartKind::Bar,
        labels: vec!["07시".to_string()],
        datasets: vec![Dataset::solid("A", vec![1.0])],
    };
    let spec_b = ChartSpec {
        kind: ChartKind::Line,
        labels: vec!["07시".to_string()],
        datasets: vec![Dataset::solid("B", vec![2.0])],
    };

    registry.ensure("x", spec_a);
    registry.ensure("x", spec_b.clone());

    assert_eq!(*live.borrow(), 1, "exactly one live handle for the canvas");
    assert_eq!(registry.spec_for("x"), Some(&spec_b));

    registry.destroy_all();
    assert_eq!(*live.borrow(), 0);
}

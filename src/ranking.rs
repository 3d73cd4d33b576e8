//! Worker ranking and radar-score normalization.

use crate::model::{NormalizedWorkerPerformance, ProcessMode, WorkerAggregate};

// =============================================================================
// Sort keys
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    ScoreDesc,
    ScoreAsc,
    WorkTimeAsc,
    WorkTimeDesc,
    SessionsDesc,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Name => "이름순",
            SortKey::ScoreDesc => "종합 점수 높은 순",
            SortKey::ScoreAsc => "종합 점수 낮은 순",
            SortKey::WorkTimeAsc => "평균 작업 시간 빠른 순",
            SortKey::WorkTimeDesc => "평균 작업 시간 느린 순",
            SortKey::SessionsDesc => "처리 세트 많은 순",
        }
    }

    /// Unknown labels fall back to the default ordering.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "이름순" => SortKey::Name,
            "종합 점수 높은 순" => SortKey::ScoreDesc,
            "종합 점수 낮은 순" => SortKey::ScoreAsc,
            "평균 작업 시간 빠른 순" => SortKey::WorkTimeAsc,
            "평균 작업 시간 느린 순" => SortKey::WorkTimeDesc,
            "처리 세트 많은 순" => SortKey::SessionsDesc,
            _ => SortKey::ScoreDesc,
        }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::ScoreDesc
    }
}

/// Sorted copy of the worker table. `sort_by` is stable, so rows with
/// equal keys keep their input order; callers rely on that for
/// deterministic leaderboards.
pub fn rank(workers: &[WorkerAggregate], key: SortKey) -> Vec<WorkerAggregate> {
    let mut sorted = workers.to_vec();
    match key {
        SortKey::Name => sorted.sort_by(|a, b| a.worker.cmp(&b.worker)),
        SortKey::ScoreDesc => {
            sorted.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score))
        }
        SortKey::ScoreAsc => sorted.sort_by(|a, b| a.overall_score.total_cmp(&b.overall_score)),
        SortKey::WorkTimeAsc => {
            sorted.sort_by(|a, b| a.avg_work_time.total_cmp(&b.avg_work_time))
        }
        SortKey::WorkTimeDesc => {
            sorted.sort_by(|a, b| b.avg_work_time.total_cmp(&a.avg_work_time))
        }
        SortKey::SessionsDesc => sorted.sort_by(|a, b| b.session_count.cmp(&a.session_count)),
    }
    sorted
}

/// Top `fraction` of workers by overall score (at least one when any
/// exist), used by the filter panel's quick-select.
pub fn top_performers(workers: &[WorkerAggregate], fraction: f64) -> Vec<String> {
    let ranked = rank(workers, SortKey::ScoreDesc);
    let keep = (ranked.len() as f64 * fraction).ceil() as usize;
    ranked.into_iter().take(keep).map(|w| w.worker).collect()
}

// =============================================================================
// Radar metric configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarMetric {
    /// Axis label shown on the radar chart.
    pub label: &'static str,
    /// Aggregate field backing the axis; `<field>_norm` is read from
    /// the normalized performance row.
    pub field: &'static str,
}

const PACKAGING_METRICS: &[RadarMetric] = &[
    RadarMetric { label: "세트완료시간", field: "avg_work_time" },
    RadarMetric { label: "첫스캔준비성", field: "avg_latency" },
    RadarMetric { label: "무결점달성률", field: "first_pass_yield" },
    RadarMetric { label: "세트당PCS", field: "avg_pcs_per_tray" },
];

const TRANSFER_METRICS: &[RadarMetric] = &[
    RadarMetric { label: "신속성", field: "avg_work_time" },
    RadarMetric { label: "준속성", field: "avg_latency" },
    RadarMetric { label: "초도수율", field: "first_pass_yield" },
    RadarMetric { label: "안정성", field: "work_time_std" },
];

const INSPECTION_METRICS: &[RadarMetric] = &[
    RadarMetric { label: "신속성", field: "avg_work_time" },
    RadarMetric { label: "준속성", field: "avg_latency" },
    RadarMetric { label: "무결점달성률", field: "first_pass_yield" },
    RadarMetric { label: "안정성", field: "work_time_std" },
    RadarMetric { label: "품질 정확도", field: "defect_rate" },
];

/// Radar axes per process mode. The all-compare view reuses the
/// transfer room's axes.
pub fn radar_metrics(mode: ProcessMode) -> &'static [RadarMetric] {
    match mode {
        ProcessMode::Packaging => PACKAGING_METRICS,
        ProcessMode::Inspection => INSPECTION_METRICS,
        ProcessMode::Transfer | ProcessMode::AllCompare => TRANSFER_METRICS,
    }
}

/// Per-axis scores in [0, 100] for one worker. A missing normalized row
/// or metric contributes 0 so the rest of the radar still renders.
pub fn radar_scores(
    worker: &str,
    metrics: &[RadarMetric],
    normalized: &[NormalizedWorkerPerformance],
) -> Vec<f64> {
    let row = normalized.iter().find(|n| n.worker == worker);
    metrics
        .iter()
        .map(|m| row.map(|r| r.norm(m.field) * 100.0).unwrap_or(0.0))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

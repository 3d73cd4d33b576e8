//! Period bucketing and trend derivation over session records.
//!
//! Pure functions: the same sessions, granularity and historical
//! averages always produce the same series. Buckets carry an explicit
//! sort key next to the display label because week/month labels are
//! locale text and do not sort chronologically.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::{HistoricalAverages, SessionRecord};

/// First and last hour that are always present on the hourly axis,
/// even when no session touched them.
pub const MANDATORY_HOUR_START: u32 = 7;
pub const MANDATORY_HOUR_END: u32 = 19;

/// Pallets are counted at 60 pcs each on the shipping pivot.
pub const PCS_PER_PALLET: f64 = 60.0;

// =============================================================================
// Granularity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    WeekOfMonth,
    Monthly,
}

impl Granularity {
    /// Span thresholds: <=1 day hourly, 2-31 daily, 32-91 weekly-of-month,
    /// longer monthly.
    pub fn for_span_days(days: i64) -> Self {
        if days <= 1 {
            Granularity::Hourly
        } else if days <= 31 {
            Granularity::Daily
        } else if days <= 91 {
            Granularity::WeekOfMonth
        } else {
            Granularity::Monthly
        }
    }
}

/// Inclusive day count of a filter range.
pub fn span_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

// =============================================================================
// Buckets
// =============================================================================

/// Chronological sort key for a trend bucket. Variants never mix within
/// one series; ordering within a variant is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BucketKey {
    Hour(u32),
    Day(NaiveDate),
    /// Calendar week inside a month: days 1-7 are week 1, 8-14 week 2.
    /// Resets at each month boundary; this is not an ISO week.
    Week { year: i32, month: u32, week: u32 },
    Month { year: i32, month: u32 },
    Year(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub key: BucketKey,
    pub label: String,
    pub value: f64,
}

/// Parse the date part of an ISO date or datetime string.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.split('T').next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Hour of day from a `start_time_dt` value, ISO datetime or bare HH:MM.
fn parse_hour(s: &str) -> Option<u32> {
    let time = match s.split_once('T') {
        Some((_, t)) => t,
        None => s,
    };
    let hour: u32 = time.split(':').next()?.trim().parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Monday-based weekday index for historical lookups. The historical
/// source indexes Monday=0..Sunday=6 while the native calendar indexes
/// Sunday=0..Saturday=6, hence the +6 rotation.
pub fn monday_indexed_weekday(date: NaiveDate) -> u32 {
    (date.weekday().num_days_from_sunday() + 6) % 7
}

pub fn week_of_month(day: u32) -> u32 {
    (day + 6) / 7
}

fn session_start_hour(session: &SessionRecord) -> Option<u32> {
    session
        .start_time_dt
        .as_deref()
        .and_then(parse_hour)
        .or_else(|| parse_hour(&session.date))
}

/// Sum `pcs_completed` per bucket at the given granularity.
///
/// Hourly series always cover hours 07-19 so the axis stays stable on
/// empty days; other hours appear only when they hold data.
pub fn bucket_series(sessions: &[SessionRecord], granularity: Granularity) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<BucketKey, f64> = BTreeMap::new();

    if granularity == Granularity::Hourly {
        for h in MANDATORY_HOUR_START..=MANDATORY_HOUR_END {
            buckets.insert(BucketKey::Hour(h), 0.0);
        }
    }

    for session in sessions {
        let key = match granularity {
            Granularity::Hourly => match session_start_hour(session) {
                Some(h) => BucketKey::Hour(h),
                None => continue,
            },
            Granularity::Daily => match parse_date(&session.date) {
                Some(d) => BucketKey::Day(d),
                None => continue,
            },
            Granularity::WeekOfMonth => match parse_date(&session.date) {
                Some(d) => BucketKey::Week {
                    year: d.year(),
                    month: d.month(),
                    week: week_of_month(d.day()),
                },
                None => continue,
            },
            Granularity::Monthly => match parse_date(&session.date) {
                Some(d) => BucketKey::Month {
                    year: d.year(),
                    month: d.month(),
                },
                None => continue,
            },
        };
        *buckets.entry(key).or_insert(0.0) += session.pcs_completed as f64;
    }

    buckets
        .into_iter()
        .map(|(key, value)| TrendPoint {
            key,
            label: label_for(&key),
            value,
        })
        .collect()
}

fn label_for(key: &BucketKey) -> String {
    match key {
        BucketKey::Hour(h) => format!("{:02}시", h),
        BucketKey::Day(d) => d.format("%m-%d").to_string(),
        BucketKey::Week { month, week, .. } => format!("{}월 {}주", month, week),
        BucketKey::Month { year, month } => format!("{}-{:02}", year, month),
        BucketKey::Year(y) => y.to_string(),
    }
}

/// Historical-average overlay aligned bucket-for-bucket with `series`.
/// Buckets with no historical figure contribute 0.0, never a hole.
pub fn overlay_series(series: &[TrendPoint], averages: &HistoricalAverages) -> Vec<f64> {
    series
        .iter()
        .map(|point| match point.key {
            BucketKey::Hour(h) => averages.hourly_pcs.get(&h).copied().unwrap_or(0.0),
            BucketKey::Day(d) => averages
                .weekday_pcs
                .get(&monday_indexed_weekday(d))
                .copied()
                .unwrap_or(0.0),
            BucketKey::Week { week, .. } => averages
                .week_of_month_pcs
                .get(&week)
                .copied()
                .unwrap_or(0.0),
            BucketKey::Month { month, .. } => {
                averages.monthly_pcs.get(&month).copied().unwrap_or(0.0)
            }
            BucketKey::Year(_) => 0.0,
        })
        .collect()
}

// =============================================================================
// KPI derivation
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedKpis {
    pub avg_tray_time: f64,
    pub avg_fpy: f64,
    pub total_production: i64,
}

/// Recompute the headline KPIs from a session slice. Sessions without a
/// work time are excluded from the average but still count for yield.
pub fn derive_kpis(sessions: &[SessionRecord]) -> DerivedKpis {
    let work_times: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.work_time)
        .filter(|t| t.is_finite())
        .collect();
    let errored = sessions.iter().filter(|s| s.had_error).count();

    DerivedKpis {
        avg_tray_time: if work_times.is_empty() {
            0.0
        } else {
            work_times.iter().sum::<f64>() / work_times.len() as f64
        },
        avg_fpy: if sessions.is_empty() {
            0.0
        } else {
            1.0 - errored as f64 / sessions.len() as f64
        },
        total_production: sessions.iter().map(|s| s.pcs_completed).sum(),
    }
}

// =============================================================================
// Cross-stage comparison series
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ComparisonPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonPeriod::Daily => "일간",
            ComparisonPeriod::Weekly => "주간",
            ComparisonPeriod::Monthly => "월간",
            ComparisonPeriod::Yearly => "연간",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "일간" => Some(ComparisonPeriod::Daily),
            "주간" => Some(ComparisonPeriod::Weekly),
            "월간" => Some(ComparisonPeriod::Monthly),
            "연간" => Some(ComparisonPeriod::Yearly),
            _ => None,
        }
    }
}

impl Default for ComparisonPeriod {
    fn default() -> Self {
        ComparisonPeriod::Daily
    }
}

/// Bucket one process's sessions for the comparison tab. Weekly buckets
/// key on the Monday of the calendar week (unlike the week-of-month
/// buckets used for single-process trends).
pub fn comparison_series(sessions: &[SessionRecord], period: ComparisonPeriod) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<BucketKey, f64> = BTreeMap::new();

    for session in sessions {
        let date = match parse_date(&session.date) {
            Some(d) => d,
            None => continue,
        };
        let key = match period {
            ComparisonPeriod::Daily => BucketKey::Day(date),
            ComparisonPeriod::Weekly => {
                BucketKey::Day(date - Duration::days(monday_indexed_weekday(date) as i64))
            }
            ComparisonPeriod::Monthly => BucketKey::Month {
                year: date.year(),
                month: date.month(),
            },
            ComparisonPeriod::Yearly => BucketKey::Year(date.year()),
        };
        *buckets.entry(key).or_insert(0.0) += session.pcs_completed as f64;
    }

    buckets
        .into_iter()
        .map(|(key, value)| {
            let label = match key {
                BucketKey::Day(d) => d.format("%Y-%m-%d").to_string(),
                other => label_for(&other),
            };
            TrendPoint { key, label, value }
        })
        .collect()
}

// =============================================================================
// Standby (work completed upstream, not yet consumed downstream)
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StandbyItem {
    pub item: String,
    pub standby_pcs: i64,
}

/// Per-item pcs completed by `source` minus pcs completed by `target`;
/// only positive remainders are reported.
pub fn standby_items(sessions: &[SessionRecord], source: &str, target: &str) -> Vec<StandbyItem> {
    let mut source_pcs: BTreeMap<String, i64> = BTreeMap::new();
    let mut target_pcs: BTreeMap<String, i64> = BTreeMap::new();

    for session in sessions {
        if session.process == source {
            *source_pcs.entry(session.item_display.clone()).or_insert(0) +=
                session.pcs_completed;
        } else if session.process == target {
            *target_pcs.entry(session.item_display.clone()).or_insert(0) +=
                session.pcs_completed;
        }
    }

    source_pcs
        .into_iter()
        .filter_map(|(item, pcs)| {
            let standby = pcs - target_pcs.get(&item).copied().unwrap_or(0);
            (standby > 0).then_some(StandbyItem {
                item,
                standby_pcs: standby,
            })
        })
        .collect()
}

// =============================================================================
// Shipping-date pivot
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRow {
    pub item: String,
    pub by_date: Vec<i64>,
    pub total_pcs: i64,
    pub total_pallets: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingPivot {
    /// Most recent shipping dates, newest first, at most seven.
    pub dates: Vec<String>,
    pub rows: Vec<ShippingRow>,
}

pub fn shipping_pivot(sessions: &[SessionRecord]) -> Option<ShippingPivot> {
    let shipped: Vec<(&SessionRecord, String)> = sessions
        .iter()
        .filter_map(|s| {
            s.shipping_date
                .as_deref()
                .map(|d| (s, d.split('T').next().unwrap_or(d).to_string()))
        })
        .collect();
    if shipped.is_empty() {
        return None;
    }

    let mut dates: Vec<String> = shipped.iter().map(|(_, d)| d.clone()).collect();
    dates.sort();
    dates.dedup();
    dates.reverse();
    dates.truncate(7);

    let mut per_item: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for (session, date) in &shipped {
        if !dates.contains(date) {
            continue;
        }
        *per_item
            .entry(session.item_display.clone())
            .or_default()
            .entry(date.clone())
            .or_insert(0) += session.pcs_completed;
    }

    let rows = per_item
        .into_iter()
        .map(|(item, by_date_map)| {
            let by_date: Vec<i64> = dates
                .iter()
                .map(|d| by_date_map.get(d).copied().unwrap_or(0))
                .collect();
            let total_pcs: i64 = by_date.iter().sum();
            ShippingRow {
                item,
                by_date,
                total_pcs,
                total_pallets: total_pcs as f64 / PCS_PER_PALLET,
            }
        })
        .collect();

    Some(ShippingPivot { dates, rows })
}

// =============================================================================
// Tests
// =============================================================================

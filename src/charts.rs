//! Chart handle registry and per-row detail panel lifecycle.
//!
//! The registry is the only place chart handles are created or
//! destroyed. `ensure` always releases the previous handle bound to a
//! canvas before creating the next one, so a canvas can never
//! accumulate ghost charts across re-renders.

use std::collections::HashMap;

use crate::logging::{self, obj, v_num, v_str, Domain, Level};

// =============================================================================
// Chart specs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Radar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    /// Dashed overlay line (historical averages).
    pub dashed: bool,
}

impl Dataset {
    pub fn solid(label: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            data,
            dashed: false,
        }
    }

    pub fn dashed(label: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            data,
            dashed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

// =============================================================================
// Drawing surface
// =============================================================================

/// Live chart resource issued by a surface. Opaque to everything but
/// the surface that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartHandle(pub u64);

/// The external drawing capability: create a chart from a typed spec,
/// destroy it on request. The registry owns when; the surface owns how.
pub trait ChartSurface {
    fn create(&mut self, canvas: &str, spec: &ChartSpec) -> ChartHandle;
    fn destroy(&mut self, canvas: &str, handle: ChartHandle);
}

/// Production surface for the headless engine: draws nothing, but
/// keeps handle accounting honest and logs every transition.
#[derive(Default)]
pub struct LoggingSurface {
    next_id: u64,
}

impl ChartSurface for LoggingSurface {
    fn create(&mut self, canvas: &str, spec: &ChartSpec) -> ChartHandle {
        self.next_id += 1;
        logging::log(
            Level::Debug,
            Domain::Chart,
            "create",
            obj(&[
                ("canvas", v_str(canvas)),
                ("points", v_num(spec.labels.len() as f64)),
                ("datasets", v_num(spec.datasets.len() as f64)),
                ("handle", v_num(self.next_id as f64)),
            ]),
        );
        ChartHandle(self.next_id)
    }

    fn destroy(&mut self, canvas: &str, handle: ChartHandle) {
        logging::log(
            Level::Debug,
            Domain::Chart,
            "destroy",
            obj(&[("canvas", v_str(canvas)), ("handle", v_num(handle.0 as f64))]),
        );
    }
}

// =============================================================================
// Registry
// =============================================================================

pub struct ChartRegistry {
    surface: Box<dyn ChartSurface>,
    live: HashMap<String, (ChartHandle, ChartSpec)>,
}

impl ChartRegistry {
    pub fn new(surface: Box<dyn ChartSurface>) -> Self {
        Self {
            surface,
            live: HashMap::new(),
        }
    }

    /// Bind `spec` to `canvas`, destroying whatever handle the canvas
    /// held before. At most one live handle per canvas, always.
    pub fn ensure(&mut self, canvas: &str, spec: ChartSpec) {
        if let Some((old, _)) = self.live.remove(canvas) {
            self.surface.destroy(canvas, old);
        }
        let handle = self.surface.create(canvas, &spec);
        self.live.insert(canvas.to_string(), (handle, spec));
    }

    /// Reclaim every tracked handle; run before a full tab re-render so
    /// the previous tab's charts don't outlive their canvases.
    pub fn destroy_all(&mut self) {
        for (canvas, (handle, _)) in self.live.drain() {
            self.surface.destroy(&canvas, handle);
        }
    }

    /// Reclaim the handles whose canvas id starts with `prefix`
    /// (one detail row's charts).
    pub fn destroy_prefixed(&mut self, prefix: &str) {
        let doomed: Vec<String> = self
            .live
            .keys()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect();
        for canvas in doomed {
            if let Some((handle, _)) = self.live.remove(&canvas) {
                self.surface.destroy(&canvas, handle);
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn spec_for(&self, canvas: &str) -> Option<&ChartSpec> {
        self.live.get(canvas).map(|(_, spec)| spec)
    }
}

// =============================================================================
// Detail panels (worker drill-down rows)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Collapsed,
    Loading,
    Expanded,
}

/// Canvas id of a detail row's hourly chart.
pub fn hourly_canvas(detail_id: &str) -> String {
    format!("hourly-chart-{}", detail_id)
}

/// Canvas id of a detail row's daily chart.
pub fn daily_canvas(detail_id: &str) -> String {
    format!("daily-chart-{}", detail_id)
}

/// Prefix shared by every canvas belonging to one detail row; used to
/// reclaim that row's charts on collapse.
fn row_prefixes(detail_id: &str) -> [String; 2] {
    [hourly_canvas(detail_id), daily_canvas(detail_id)]
}

/// Per-row expandable panels: collapsed -> loading -> expanded.
/// Collapsing releases the row's charts synchronously; a result that
/// arrives for a collapsed row is refused.
#[derive(Default)]
pub struct DetailPanels {
    rows: HashMap<String, PanelState>,
}

impl DetailPanels {
    pub fn state(&self, detail_id: &str) -> PanelState {
        self.rows
            .get(detail_id)
            .copied()
            .unwrap_or(PanelState::Collapsed)
    }

    pub fn begin_loading(&mut self, detail_id: &str) {
        self.rows.insert(detail_id.to_string(), PanelState::Loading);
    }

    /// A detail response arrived. Returns true when the row is still
    /// waiting for it (loading -> expanded); false means the row was
    /// collapsed in the meantime and the result must be dropped.
    pub fn complete(&mut self, detail_id: &str) -> bool {
        match self.state(detail_id) {
            PanelState::Loading => {
                self.rows
                    .insert(detail_id.to_string(), PanelState::Expanded);
                true
            }
            _ => false,
        }
    }

    /// Collapse a row and synchronously release its chart handles.
    pub fn collapse(&mut self, detail_id: &str, registry: &mut ChartRegistry) {
        self.rows
            .insert(detail_id.to_string(), PanelState::Collapsed);
        for canvas in row_prefixes(detail_id) {
            registry.destroy_prefixed(&canvas);
        }
    }

    /// Drop all rows (full tab re-render; the registry is cleared
    /// separately by `destroy_all`).
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn expanded_count(&self) -> usize {
        self.rows
            .values()
            .filter(|s| **s == PanelState::Expanded)
            .count()
    }
}

// =============================================================================
// Tests
// =============================================================================

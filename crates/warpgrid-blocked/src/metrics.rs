//! Gauge sink for tracker stats, with Prometheus text exposition.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Receives gauge samples keyed by a metric path.
pub trait MetricsSink: Send + Sync {
    fn set_gauge(&self, key: &[&str], value: f32);
}

/// In-memory last-value gauge store.
///
/// Path segments are joined with `_` to form the metric name, so
/// `["warpgrid", "blocked_evals", "total_blocked"]` is exposed as
/// `warpgrid_blocked_evals_total_blocked`.
#[derive(Debug, Default)]
pub struct GaugeRegistry {
    gauges: Mutex<BTreeMap<String, f32>>,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value recorded for `key`.
    pub fn get(&self, key: &[&str]) -> Option<f32> {
        let gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges.get(&metric_name(key)).copied()
    }

    /// Render all gauges in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = String::new();
        for (name, value) in gauges.iter() {
            out.push_str(&format!("# HELP {name} Blocked evaluation tracker gauge.\n"));
            out.push_str(&format!("# TYPE {name} gauge\n"));
            out.push_str(&format!("{name} {value}\n"));
        }
        out
    }
}

impl MetricsSink for GaugeRegistry {
    fn set_gauge(&self, key: &[&str], value: f32) {
        let mut gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges.insert(metric_name(key), value);
    }
}

fn metric_name(key: &[&str]) -> String {
    key.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let registry = GaugeRegistry::new();
        assert_eq!(registry.get(&["warpgrid", "blocked_evals", "total_blocked"]), None);

        registry.set_gauge(&["warpgrid", "blocked_evals", "total_blocked"], 3.0);
        registry.set_gauge(&["warpgrid", "blocked_evals", "total_blocked"], 5.0);
        assert_eq!(
            registry.get(&["warpgrid", "blocked_evals", "total_blocked"]),
            Some(5.0)
        );
    }

    #[test]
    fn render_empty() {
        assert!(GaugeRegistry::new().render_prometheus().is_empty());
    }

    #[test]
    fn render_gauges() {
        let registry = GaugeRegistry::new();
        registry.set_gauge(&["warpgrid", "blocked_evals", "total_blocked"], 4.0);
        registry.set_gauge(&["warpgrid", "blocked_evals", "total_escaped"], 1.0);

        let output = registry.render_prometheus();
        assert!(output.contains("# TYPE warpgrid_blocked_evals_total_blocked gauge"));
        assert!(output.contains("warpgrid_blocked_evals_total_blocked 4\n"));
        assert!(output.contains("warpgrid_blocked_evals_total_escaped 1\n"));

        for line in output.lines() {
            if line.starts_with('#') {
                continue;
            }
            assert_eq!(line.split(' ').count(), 2, "malformed sample line: {line}");
        }
    }
}

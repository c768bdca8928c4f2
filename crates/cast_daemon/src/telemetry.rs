//! Sink-agnostic telemetry publisher.
//!
//! Once per tick every registered provider is evaluated against an
//! overview snapshot; values are grouped by area and fanned out to all
//! sinks. A failing provider leaves its metric absent for the tick; a
//! failing sink is logged and the other sinks are unaffected.

use std::collections::BTreeMap;

use cast_core::{compute_overview, CastState, OverviewSnapshot};
use serde::Serialize;

use crate::state::{TelemetryHistory, MAX_TELEMETRY_HISTORY};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Int(i64),
    Text(String),
    Bool(bool),
}

pub type Provider = Box<dyn Fn(&OverviewSnapshot) -> Option<MetricValue> + Send>;

/// One published group: all metrics of an area at a tick.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryFrame {
    pub tick: u64,
    pub area: String,
    pub metrics: BTreeMap<String, MetricValue>,
}

pub trait TelemetrySink: Send {
    fn name(&self) -> &'static str;
    fn publish(&mut self, frame: &TelemetryFrame) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct Publisher {
    providers: Vec<(String, String, Provider)>,
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl Publisher {
    pub fn new() -> Self {
        Publisher::default()
    }

    pub fn register(&mut self, name: impl Into<String>, area: impl Into<String>, provider: Provider) {
        self.providers.push((name.into(), area.into(), provider));
    }

    pub fn add_sink(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }

    /// Evaluate all providers against the current state and fan out the
    /// per-area frames.
    pub fn publish_tick(&mut self, state: &CastState) {
        let snapshot = compute_overview(state);
        let mut areas: BTreeMap<String, BTreeMap<String, MetricValue>> = BTreeMap::new();
        for (name, area, provider) in &self.providers {
            if let Some(value) = provider(&snapshot) {
                areas
                    .entry(area.clone())
                    .or_default()
                    .insert(name.clone(), value);
            }
        }
        for (area, metrics) in areas {
            let frame = TelemetryFrame {
                tick: snapshot.tick,
                area,
                metrics,
            };
            for sink in &mut self.sinks {
                if let Err(err) = sink.publish(&frame) {
                    tracing::warn!(
                        sink = sink.name(),
                        area = frame.area,
                        "telemetry sink failed: {err}"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Overview providers
// ---------------------------------------------------------------------------

fn float(read: impl Fn(&OverviewSnapshot) -> f64 + Send + 'static) -> Provider {
    Box::new(move |s| Some(MetricValue::Float(read(s))))
}

fn opt_float(read: impl Fn(&OverviewSnapshot) -> Option<f64> + Send + 'static) -> Provider {
    Box::new(move |s| read(s).map(MetricValue::Float))
}

/// Register the full overview metric set. `section_ids` names one
/// `cooling_section_{id}` metric per configured cooling section.
pub fn register_overview_metrics(publisher: &mut Publisher, section_ids: &[u32]) {
    const AREA: &str = "overview";

    publisher.register("ladle_weight", AREA, float(|s| s.ladle_weight_kg));
    publisher.register("ladle_flow", AREA, float(|s| s.ladle_flow_kg_s));

    publisher.register("tundish_weight", AREA, float(|s| s.tundish_weight_kg));
    publisher.register("tundish_level", AREA, float(|s| s.tundish_level_mm));
    publisher.register(
        "tundish_temperature",
        AREA,
        opt_float(|s| s.tundish_temperature_c),
    );
    publisher.register(
        "tundish_superheat",
        AREA,
        opt_float(|s| s.tundish_superheat_c),
    );
    publisher.register(
        "tundish_superheat_target",
        AREA,
        opt_float(|s| s.tundish_superheat_target_c),
    );
    publisher.register("tundish_flow", AREA, float(|s| s.tundish_flow_kg_s));
    publisher.register(
        "tundish_mixed_steel_percent",
        AREA,
        float(|s| s.tundish_mixed_steel_pct),
    );
    publisher.register(
        "tundish_mixed_steel",
        AREA,
        Box::new(|s| Some(MetricValue::Bool(s.tundish_mixed_steel))),
    );
    publisher.register("tundish_rod_position", AREA, float(|s| s.stopper_rod_pct));

    publisher.register("mold_level", AREA, float(|s| s.mold_level_mm));
    publisher.register("mold_flow", AREA, float(|s| s.mold_flow_kg_s));

    publisher.register("total_cast_length", AREA, float(|s| s.total_cast_length_m));
    publisher.register("cast_speed", AREA, float(|s| s.cast_speed_m_min));
    publisher.register("head_position", AREA, float(|s| s.head_position_m));
    publisher.register("tail_position", AREA, float(|s| s.tail_position_m));
    publisher.register(
        "measured_cut_length",
        AREA,
        float(|s| s.measured_cut_length_m),
    );

    publisher.register(
        "current_heat_id",
        AREA,
        Box::new(|s| s.current_heat_id.map(|id| MetricValue::Int(id as i64))),
    );
    publisher.register(
        "steel_grade",
        AREA,
        Box::new(|s| s.steel_grade.clone().map(MetricValue::Text)),
    );
    publisher.register(
        "next_cut_id",
        AREA,
        Box::new(|s| s.next_cut_id.clone().map(MetricValue::Text)),
    );
    publisher.register(
        "next_cut_length_aim",
        AREA,
        opt_float(|s| s.next_cut_length_aim_m),
    );

    for slot in 0..2_usize {
        publisher.register(
            format!("heat_{}_id", slot + 1),
            AREA,
            Box::new(move |s| {
                s.tundish_heats
                    .get(slot)
                    .map(|&(id, _)| MetricValue::Int(id as i64))
            }),
        );
        publisher.register(
            format!("heat_{}_weight", slot + 1),
            AREA,
            Box::new(move |s| {
                s.tundish_heats
                    .get(slot)
                    .map(|&(_, kg)| MetricValue::Float(kg))
            }),
        );
    }

    for &id in section_ids {
        publisher.register(
            format!("cooling_section_{id}"),
            AREA,
            Box::new(move |s| {
                s.cooling_section_flows
                    .iter()
                    .find(|&&(sid, _)| sid == id)
                    .map(|&(_, flow)| MetricValue::Float(flow))
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Logs a one-line digest of each frame.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn publish(&mut self, frame: &TelemetryFrame) -> anyhow::Result<()> {
        tracing::debug!(
            tick = frame.tick,
            area = frame.area,
            metrics = frame.metrics.len(),
            "telemetry frame"
        );
        Ok(())
    }
}

/// Keeps a bounded in-memory history, served over REST.
pub struct HistorySink {
    history: TelemetryHistory,
}

impl HistorySink {
    pub fn new(history: TelemetryHistory) -> Self {
        HistorySink { history }
    }
}

impl TelemetrySink for HistorySink {
    fn name(&self) -> &'static str {
        "history"
    }

    fn publish(&mut self, frame: &TelemetryFrame) -> anyhow::Result<()> {
        let mut history = self.history.lock();
        if history.len() >= MAX_TELEMETRY_HISTORY {
            history.pop_front();
        }
        history.push_back(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_core::test_fixtures::{base_content, base_state};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingSink {
        frames: Arc<Mutex<Vec<TelemetryFrame>>>,
    }

    impl TelemetrySink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn publish(&mut self, frame: &TelemetryFrame) -> anyhow::Result<()> {
            self.frames.lock().push(frame.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn publish(&mut self, _frame: &TelemetryFrame) -> anyhow::Result<()> {
            anyhow::bail!("sink is down")
        }
    }

    #[test]
    fn overview_frame_contains_the_required_metrics() {
        let content = base_content();
        let state = base_state(&content);
        let mut publisher = Publisher::new();
        register_overview_metrics(&mut publisher, &[1, 2, 3]);
        let frames = Arc::new(Mutex::new(Vec::new()));
        publisher.add_sink(Box::new(RecordingSink {
            frames: frames.clone(),
        }));

        publisher.publish_tick(&state);

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.area, "overview");
        for name in [
            "ladle_weight",
            "ladle_flow",
            "tundish_weight",
            "tundish_level",
            "tundish_flow",
            "tundish_mixed_steel_percent",
            "tundish_mixed_steel",
            "tundish_rod_position",
            "mold_level",
            "mold_flow",
            "total_cast_length",
            "cast_speed",
            "head_position",
            "tail_position",
            "measured_cut_length",
            "cooling_section_1",
            "cooling_section_2",
            "cooling_section_3",
        ] {
            assert!(frame.metrics.contains_key(name), "missing metric {name}");
        }
    }

    #[test]
    fn failed_providers_leave_their_metric_absent() {
        let content = base_content();
        let state = base_state(&content);
        let mut publisher = Publisher::new();
        register_overview_metrics(&mut publisher, &[]);
        let frames = Arc::new(Mutex::new(Vec::new()));
        publisher.add_sink(Box::new(RecordingSink {
            frames: frames.clone(),
        }));

        publisher.publish_tick(&state);

        // An empty machine has no temperature, no current heat, no armed
        // cut and no tundish fragments.
        let frames = frames.lock();
        let frame = &frames[0];
        for name in [
            "tundish_temperature",
            "tundish_superheat",
            "current_heat_id",
            "steel_grade",
            "next_cut_id",
            "heat_1_id",
            "heat_2_weight",
        ] {
            assert!(
                !frame.metrics.contains_key(name),
                "metric {name} should be absent on an empty machine"
            );
        }
    }

    #[test]
    fn a_failing_sink_does_not_starve_the_others() {
        let content = base_content();
        let state = base_state(&content);
        let mut publisher = Publisher::new();
        register_overview_metrics(&mut publisher, &[]);
        let frames = Arc::new(Mutex::new(Vec::new()));
        publisher.add_sink(Box::new(FailingSink));
        publisher.add_sink(Box::new(RecordingSink {
            frames: frames.clone(),
        }));

        publisher.publish_tick(&state);
        publisher.publish_tick(&state);

        assert_eq!(frames.lock().len(), 2, "recording sink keeps receiving");
    }

    #[test]
    fn history_sink_is_bounded() {
        let content = base_content();
        let state = base_state(&content);
        let history: TelemetryHistory = Arc::new(Mutex::new(std::collections::VecDeque::new()));
        let mut publisher = Publisher::new();
        register_overview_metrics(&mut publisher, &[]);
        publisher.add_sink(Box::new(HistorySink::new(history.clone())));

        for _ in 0..3 {
            publisher.publish_tick(&state);
        }
        assert_eq!(history.lock().len(), 3);
    }
}

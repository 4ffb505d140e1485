//! Lifecycle gauges and their Prometheus text exposition.
//!
//! Pure observation: reading a gauge never feeds back into the lifecycle.

use serde::Serialize;

use crate::state::{LifecycleState, ALL_STATES};

/// A single boolean-as-integer gauge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gauge {
    pub name: String,
    pub help: String,
    pub value: i64,
}

/// Point-in-time view of the lifecycle for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleGauges {
    pub state: LifecycleState,
    pub framework_registered: bool,
}

impl LifecycleGauges {
    /// `framework_registered` plus one `scheduler_lifecycle_<STATE>` gauge
    /// per state, exactly one of which reads 1.
    pub fn gauges(&self) -> Vec<Gauge> {
        let mut gauges = Vec::with_capacity(ALL_STATES.len() + 1);
        gauges.push(Gauge {
            name: "framework_registered".to_string(),
            help: "Whether the resource manager acknowledged registration.".to_string(),
            value: i64::from(self.framework_registered),
        });
        for state in ALL_STATES {
            gauges.push(Gauge {
                name: format!("scheduler_lifecycle_{}", state.label()),
                help: format!("Whether the scheduler lifecycle is in {}.", state.label()),
                value: i64::from(state == self.state),
            });
        }
        gauges
    }
}

/// Render gauges into the Prometheus text exposition format.
pub fn render_prometheus(gauges: &[Gauge]) -> String {
    let mut out = String::new();
    for g in gauges {
        out.push_str(&format!("# HELP warpgrid_{} {}\n", g.name, g.help));
        out.push_str(&format!("# TYPE warpgrid_{} gauge\n", g.name));
        out.push_str(&format!("warpgrid_{} {}\n", g.name, g.value));
    }
    out
}

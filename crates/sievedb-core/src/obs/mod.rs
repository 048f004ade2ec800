//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not touch the store or the schema. Engine code
//! reports what it did through `MetricsEvent`; nothing here changes
//! behaviour.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, ModelCounters, ModelSummary};
pub use sink::{
    ExecKind, MetricsEvent, MetricsSink, QueryPhase, metrics_report, metrics_reset_all,
    with_metrics_sink,
};

//! Metrics sink boundary.
//!
//! Engine code MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.

use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug)]
pub enum ExecKind {
    Load,
    Save,
    Delete,
    Query,
}

///
/// QueryPhase
/// One stage of a composed query pipeline.
///

#[derive(Clone, Copy, Debug)]
pub enum QueryPhase {
    Intersect,
    Subtract,
    Range,
    Sort,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        model: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        model: &'a str,
        rows_touched: u64,
    },
    IndexDelta {
        model: &'a str,
        inserts: u64,
        removes: u64,
    },
    Phase {
        kind: QueryPhase,
        model: &'a str,
        output_size: u64,
    },
    EphemeralArmed {
        model: &'a str,
        ttl_secs: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, model } => {
                metrics::with_state_mut(|m| {
                    match kind {
                        ExecKind::Load => m.ops.load_calls = m.ops.load_calls.saturating_add(1),
                        ExecKind::Save => m.ops.save_calls = m.ops.save_calls.saturating_add(1),
                        ExecKind::Delete => {
                            m.ops.delete_calls = m.ops.delete_calls.saturating_add(1);
                        }
                        ExecKind::Query => m.ops.query_calls = m.ops.query_calls.saturating_add(1),
                    }

                    let entry = m.models.entry(model.to_string()).or_default();
                    match kind {
                        ExecKind::Load => entry.load_calls = entry.load_calls.saturating_add(1),
                        ExecKind::Save => entry.save_calls = entry.save_calls.saturating_add(1),
                        ExecKind::Delete => {
                            entry.delete_calls = entry.delete_calls.saturating_add(1);
                        }
                        ExecKind::Query => entry.query_calls = entry.query_calls.saturating_add(1),
                    }
                });
            }

            MetricsEvent::ExecFinish {
                kind,
                model,
                rows_touched,
            } => {
                metrics::with_state_mut(|m| {
                    match kind {
                        ExecKind::Load | ExecKind::Query => {
                            m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows_touched);
                        }
                        ExecKind::Delete => {
                            m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(rows_touched);
                        }
                        ExecKind::Save => {}
                    }

                    let entry = m.models.entry(model.to_string()).or_default();
                    match kind {
                        ExecKind::Load | ExecKind::Query => {
                            entry.rows_loaded = entry.rows_loaded.saturating_add(rows_touched);
                        }
                        ExecKind::Delete => {
                            entry.rows_deleted = entry.rows_deleted.saturating_add(rows_touched);
                        }
                        ExecKind::Save => {}
                    }
                });
            }

            MetricsEvent::IndexDelta {
                model,
                inserts,
                removes,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.index_inserts = m.ops.index_inserts.saturating_add(inserts);
                    m.ops.index_removes = m.ops.index_removes.saturating_add(removes);
                    let entry = m.models.entry(model.to_string()).or_default();
                    entry.index_inserts = entry.index_inserts.saturating_add(inserts);
                    entry.index_removes = entry.index_removes.saturating_add(removes);
                });
            }

            MetricsEvent::Phase { kind, .. } => {
                metrics::with_state_mut(|m| match kind {
                    QueryPhase::Intersect => {
                        m.ops.phase_intersect = m.ops.phase_intersect.saturating_add(1);
                    }
                    QueryPhase::Subtract => {
                        m.ops.phase_subtract = m.ops.phase_subtract.saturating_add(1);
                    }
                    QueryPhase::Range => m.ops.phase_range = m.ops.phase_range.saturating_add(1),
                    QueryPhase::Sort => m.ops.phase_sort = m.ops.phase_sort.saturating_add(1),
                });
            }

            MetricsEvent::EphemeralArmed { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.ephemerals_armed = m.ops.ephemerals_armed.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override. The previous
/// override is restored on all exits, including unwind.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0.take();
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one executor call.
/// Ensures finish accounting happens even on unwind.

pub(crate) struct Span {
    kind: ExecKind,
    model: String,
    rows: u64,
}

impl Span {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, model: &str) -> Self {
        record(MetricsEvent::ExecStart { kind, model });

        Self {
            kind,
            model: model.to_string(),
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            model: &self.model,
            rows_touched: self.rows,
        });
    }
}

///
/// TESTS
///

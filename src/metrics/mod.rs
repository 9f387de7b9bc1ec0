use crate::logging::{LogEvent, LogFields, LogLevel};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the scheduler and diagnostics channel.
#[derive(Debug, Default, Clone)]
pub struct RuntimeMetrics {
    renders: u64,
    rerenders_dropped: u64,
    rerenders_throttled: u64,
    unchanged_commits: u64,
    effects_run: u64,
    cleanups_run: u64,
    diagnostics_emitted: u64,
    diagnostics_suppressed: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_render(&mut self, unchanged: bool) {
        self.renders = self.renders.saturating_add(1);
        if unchanged {
            self.unchanged_commits = self.unchanged_commits.saturating_add(1);
        }
    }

    pub fn record_rerender_dropped(&mut self) {
        self.rerenders_dropped = self.rerenders_dropped.saturating_add(1);
    }

    pub fn record_rerender_throttled(&mut self) {
        self.rerenders_throttled = self.rerenders_throttled.saturating_add(1);
    }

    pub fn record_effects(&mut self, effects: usize, cleanups: usize) {
        self.effects_run = self.effects_run.saturating_add(effects as u64);
        self.cleanups_run = self.cleanups_run.saturating_add(cleanups as u64);
    }

    pub fn record_diagnostic(&mut self, emitted: bool) {
        if emitted {
            self.diagnostics_emitted = self.diagnostics_emitted.saturating_add(1);
        } else {
            self.diagnostics_suppressed = self.diagnostics_suppressed.saturating_add(1);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            renders: self.renders,
            rerenders_dropped: self.rerenders_dropped,
            rerenders_throttled: self.rerenders_throttled,
            unchanged_commits: self.unchanged_commits,
            effects_run: self.effects_run,
            cleanups_run: self.cleanups_run,
            diagnostics_emitted: self.diagnostics_emitted,
            diagnostics_suppressed: self.diagnostics_suppressed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub renders: u64,
    pub rerenders_dropped: u64,
    pub rerenders_throttled: u64,
    pub unchanged_commits: u64,
    pub effects_run: u64,
    pub cleanups_run: u64,
    pub diagnostics_emitted: u64,
    pub diagnostics_suppressed: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "runtime_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        match json!(self) {
            serde_json::Value::Object(map) => map,
            _ => LogFields::new(),
        }
    }
}

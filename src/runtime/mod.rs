use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::Node;
use crate::element::Component;
use crate::error::{EngineError, Result};
use crate::logging::{LogLevel, Logger, RUNTIME_TARGET, json_kv};
use crate::metrics::{MetricSnapshot, RuntimeMetrics};
use crate::registry::{Instance, InstanceId, InstanceStats};
use crate::window::Window;

pub mod audit;
pub mod diagnostics;
mod scheduler;

pub(crate) use scheduler::rerender;

use audit::{RuntimeAudit, RuntimeAuditEventBuilder, RuntimeAuditStage};
use diagnostics::DiagnosticsConfig;

/// Runaway-loop breaker: more than `max_rerenders` re-renders of one instance
/// inside a rolling `window_ms` window are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLimits {
    pub max_rerenders: u32,
    pub window_ms: u64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_rerenders: 50,
            window_ms: 1000,
        }
    }
}

impl RenderLimits {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// The serializable part of [`RuntimeConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub limits: RenderLimits,
    pub diagnostics: DiagnosticsConfig,
}

/// Configuration knobs for the scheduler and the diagnostics channel.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub limits: RenderLimits,
    pub diagnostics: DiagnosticsConfig,
    /// Optional structured logger used by the runtime.
    pub logger: Option<Logger>,
    /// Counters shared with whoever holds the handle.
    pub metrics: Option<Arc<Mutex<RuntimeMetrics>>>,
    pub audit: Option<Arc<dyn RuntimeAudit>>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            limits: RenderLimits::default(),
            diagnostics: DiagnosticsConfig::default(),
            logger: None,
            metrics: None,
            audit: None,
            metrics_target: "msga::runtime.metrics".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Builds a config from JSON settings; absent fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: RuntimeSettings =
            serde_json::from_str(raw).map_err(|err| EngineError::Config(err.to_string()))?;
        Ok(Self::default().with_settings(settings))
    }

    pub fn settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            limits: self.limits,
            diagnostics: self.diagnostics.clone(),
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.limits = settings.limits;
        self.diagnostics = settings.diagnostics;
        self
    }

    pub fn with_limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<RuntimeMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_metrics_enabled(mut self) -> Self {
        self.enable_metrics();
        self
    }

    pub fn with_audit<A>(mut self, audit: A) -> Self
    where
        A: RuntimeAudit + 'static,
    {
        self.audit = Some(Arc::new(audit));
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RuntimeMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RuntimeMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// What a re-render request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerenderOutcome {
    Rendered,
    /// A pass for this instance was already running.
    Dropped,
    /// Refused by the runaway-loop breaker.
    Throttled,
    Unmounted,
}

/// Mounts `component` as a root app of `window`.
///
/// The render happens as soon as the document has a `body`; until then the
/// mount retries once per animation frame. The instance stays registered
/// with the window, so the returned handle may be dropped.
pub fn create_app(window: &Window, component: impl Into<Component>) -> AppHandle {
    let component = component.into();
    let container = window.document().create_element("div");
    let instance = window.registry().create(component, container, window);

    window.log(
        LogLevel::Info,
        RUNTIME_TARGET,
        "app_created",
        [
            json_kv("component", instance.name()),
            json_kv("instance", instance.id().to_string()),
        ],
    );
    window.audit(
        RuntimeAuditEventBuilder::new(RuntimeAuditStage::AppCreated)
            .detail("component", instance.name())
            .detail("instance", instance.id().to_string())
            .finish(),
    );

    window.run_task(|| scheduler::mount(&instance, window));
    AppHandle { instance }
}

/// Logs the current metrics snapshot under the configured target.
pub fn emit_metrics_snapshot(window: &Window) -> Option<MetricSnapshot> {
    let config = window.config();
    let snapshot = config
        .metrics
        .as_ref()?
        .lock()
        .ok()
        .map(|metrics| metrics.snapshot(window.now()))?;
    if let Some(logger) = config.logger.as_ref() {
        let _ = logger.log_event(snapshot.to_log_event(&config.metrics_target));
    }
    Some(snapshot)
}

/// Handle to a mounted root.
#[derive(Debug, Clone)]
pub struct AppHandle {
    instance: Rc<Instance>,
}

impl AppHandle {
    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    pub fn name(&self) -> &str {
        self.instance.name()
    }

    /// The `div` the app renders into.
    pub fn container(&self) -> &Node {
        self.instance.container()
    }

    pub fn is_mounted(&self) -> bool {
        self.instance.is_mounted()
    }

    pub fn stats(&self) -> InstanceStats {
        self.instance.stats()
    }

    /// Requests a re-render exactly as a state setter would.
    pub fn rerender(&self) -> RerenderOutcome {
        rerender(&self.instance)
    }

    /// Runs every stored cleanup in slot order, removes the rendered subtree
    /// and retires the instance. Returns false if it was already unmounted.
    pub fn unmount(&self) -> bool {
        scheduler::unmount(&self.instance)
    }
}

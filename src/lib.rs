//! A small client-side UI runtime: hook-based components re-rendered into an
//! in-memory DOM, a path router and a development diagnostics overlay.
//!
//! Components are plain `Fn(Props) -> Child` functions. `use_state` and
//! `use_effect` give them per-instance storage addressed by call order, and
//! every state write re-renders the owning root from scratch.

pub mod dom;
pub mod element;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod window;

pub use dom::{Document, DomEvent, Listener, Node, listener};
pub use element::{Child, Component, PropValue, Props, Tag, create_element, fragment, shared, style};
pub use error::{EngineError, Result};
pub use hooks::{Cleanup, Dep, Setter, cleanup, use_effect, use_state, use_window};
pub use logging::{
    ConsoleSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, RuntimeMetrics};
pub use registry::{InstanceId, InstanceStats};
pub use router::{Route, RouteParams, Routes, match_route, navigate, router};
pub use runtime::audit::{
    BufferedAudit, NullRuntimeAudit, RuntimeAudit, RuntimeAuditEvent, RuntimeAuditEventBuilder,
    RuntimeAuditStage,
};
pub use runtime::diagnostics::DiagnosticsConfig;
pub use runtime::{
    AppHandle, RenderLimits, RerenderOutcome, RuntimeConfig, RuntimeSettings, create_app,
    emit_metrics_snapshot,
};
pub use window::{Clock, SharedState, SharedStateError, Window, WindowEventKind, WindowOptions};

/// Everything a component module usually needs, plus the `element!` and
/// `deps!` macros.
pub mod prelude {
    pub use crate::element::{Child, Component, Props, Tag, create_element, fragment, shared, style};
    pub use crate::hooks::{Dep, Setter, cleanup, use_effect, use_state, use_window};
    pub use crate::router::{Routes, navigate, router};
    pub use crate::runtime::create_app;
    pub use crate::window::Window;
    pub use crate::{deps, element};
}

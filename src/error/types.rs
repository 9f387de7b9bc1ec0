use thiserror::Error;

use crate::window::SharedStateError;

/// Unified result type for the msga runtime.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Contract violations and runtime failures surfaced by the engine.
///
/// Hook misuse (`NoActiveComponent`, `SetStateDuringRender`) and the runaway
/// loop breaker (`TooManyRerenders`) are reported through the diagnostics
/// channel rather than returned from the hook APIs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{hook} must be called inside a component")]
    NoActiveComponent { hook: &'static str },
    #[error("Can't setState during render. Move call to useEffect, event handler or async callback.")]
    SetStateDuringRender { component: String },
    #[error("Too many rerenders / setState called during render in \"{component}\"")]
    TooManyRerenders { component: String, count: u32 },
    #[error("Runtime error: {message}")]
    Runtime { message: String },
    #[error("Unhandled promise rejection: {reason}")]
    UnhandledRejection { reason: String },
    #[error("dom error: {0}")]
    Dom(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("shared state error: {0}")]
    SharedState(#[from] SharedStateError),
}

impl EngineError {
    /// Stable identifier used in log fields and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NoActiveComponent { .. } => "no_active_component",
            EngineError::SetStateDuringRender { .. } => "set_state_during_render",
            EngineError::TooManyRerenders { .. } => "too_many_rerenders",
            EngineError::Runtime { .. } => "runtime_error",
            EngineError::UnhandledRejection { .. } => "unhandled_rejection",
            EngineError::Dom(_) => "dom",
            EngineError::Config(_) => "config",
            EngineError::SharedState(_) => "shared_state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_overlay_text() {
        let err = EngineError::NoActiveComponent { hook: "use_state" };
        assert_eq!(err.to_string(), "use_state must be called inside a component");

        let err = EngineError::TooManyRerenders {
            component: "Counter".into(),
            count: 51,
        };
        assert_eq!(
            err.to_string(),
            "Too many rerenders / setState called during render in \"Counter\""
        );
        assert_eq!(err.kind(), "too_many_rerenders");
    }
}

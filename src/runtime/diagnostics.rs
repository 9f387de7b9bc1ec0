//! The single diagnostics channel: every engine error ends up here.
//!
//! In a development context a report is logged at `Error` level, written into
//! the overlay node and kept on the window. Anywhere else it is dropped and
//! only counted.

use serde::{Deserialize, Serialize};

use crate::dom::Node;
use crate::error::EngineError;
use crate::logging::{DIAGNOSTICS_TARGET, LogLevel, json_kv};
use crate::window::Window;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Hostnames treated as local development.
    pub dev_hosts: Vec<String>,
    pub overlay_id: String,
    /// Below this window width the overlay covers the whole screen.
    pub small_screen_width: u32,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dev_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            overlay_id: "error-overlay".to_string(),
            small_screen_width: 640,
        }
    }
}

impl DiagnosticsConfig {
    pub fn is_development(&self, hostname: &str) -> bool {
        self.dev_hosts.iter().any(|host| host == hostname)
    }
}

const OVERLAY_STYLE: [(&str, &str); 16] = [
    ("position", "fixed"),
    ("top", "50%"),
    ("left", "50%"),
    ("transform", "translate(-50%, -50%)"),
    ("background-color", "rgba(210,0,0,0.9)"),
    ("color", "white"),
    ("padding", "12px 20px"),
    ("border-radius", "6px"),
    ("z-index", "9999"),
    ("box-shadow", "0 0 10px rgba(0,0,0,0.5)"),
    ("display", "flex"),
    ("align-items", "center"),
    ("justify-content", "center"),
    ("text-align", "center"),
    ("width", "auto"),
    ("height", "auto"),
];

const SMALL_SCREEN_STYLE: [(&str, &str); 3] = [
    ("width", "100vw"),
    ("height", "100vh"),
    ("border-radius", "0"),
];

pub(crate) fn report(window: &Window, error: EngineError) {
    let config = &window.config().diagnostics;
    let emitted = config.is_development(&window.location().hostname);
    window.with_metrics(|metrics| metrics.record_diagnostic(emitted));
    if !emitted {
        return;
    }

    let message = error.to_string();
    window.log(
        LogLevel::Error,
        DIAGNOSTICS_TARGET,
        &message,
        [json_kv("kind", error.kind())],
    );
    show_overlay(window, &message);
    window.push_report(error);
}

/// Creates the overlay on first use and replaces its text. Returns `None`
/// when there is no body to attach it to.
fn show_overlay(window: &Window, message: &str) -> Option<Node> {
    let config = &window.config().diagnostics;
    let document = window.document();
    let overlay = match document.get_element_by_id(&config.overlay_id) {
        Some(existing) => existing,
        None => {
            let body = document.body()?;
            let overlay = document.create_element("div");
            overlay.set_attribute("id", config.overlay_id.as_str());
            for (property, value) in OVERLAY_STYLE {
                overlay.set_style(property, value);
            }
            if window.inner_width() < config.small_screen_width {
                for (property, value) in SMALL_SCREEN_STYLE {
                    overlay.set_style(property, value);
                }
            }
            body.append_child(&overlay).ok()?;
            overlay
        }
    };
    overlay.set_text_content(message);
    Some(overlay)
}

//! Writer options.

use serde::{Deserialize, Serialize};

/// Options controlling Lua emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Spaces per indentation level.
    pub indent_width: usize,
    pub heuristics: Heuristics,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            indent_width: 4,
            heuristics: Heuristics::default(),
        }
    }
}

/// Switches for the best-effort call-pattern rewrites in
/// [`crate::output::heuristics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// `requests.get(url)` and friends become `http.request(...)`.
    pub http_calls: bool,
    /// `@app.route(...)` style decorators become a comment marker.
    pub route_decorators: bool,
    /// `obj.method(x)` becomes `obj:method(x)` for likely instances.
    pub method_calls: bool,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::enabled()
    }
}

impl Heuristics {
    pub fn enabled() -> Self {
        Self {
            http_calls: true,
            route_decorators: true,
            method_calls: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            http_calls: false,
            route_decorators: false,
            method_calls: false,
        }
    }
}

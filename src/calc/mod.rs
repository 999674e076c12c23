pub mod category;
pub mod course;
pub mod goal;
pub mod program;
pub mod scale;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for CalcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

/// Half-away-from-zero rounding to `places` decimals. Non-finite input
/// collapses to 0 so nothing downstream ever sees NaN.
pub fn round_to(x: f64, places: u32) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    let factor = 10_f64.powi(places as i32);
    (x * factor).round() / factor
}

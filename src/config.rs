use serde::{Deserialize, Serialize};

use crate::calc::goal::FeasibilityThresholds;
use crate::calc::program::DEFAULT_CREDIT_HOURS;
use crate::calc::CalcError;

pub const SETTINGS_KEY: &str = "calc.settings";

fn default_credit_hours() -> f64 {
    DEFAULT_CREDIT_HOURS
}

/// Per-workspace calculation settings, stored as one JSON blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcSettings {
    #[serde(default = "default_credit_hours")]
    pub default_credit_hours: f64,
    #[serde(default)]
    pub thresholds: FeasibilityThresholds,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            default_credit_hours: DEFAULT_CREDIT_HOURS,
            thresholds: FeasibilityThresholds::default(),
        }
    }
}

impl CalcSettings {
    pub fn validate(&self) -> Result<(), CalcError> {
        if !self.default_credit_hours.is_finite() || self.default_credit_hours <= 0.0 {
            return Err(CalcError::new(
                "bad_params",
                "defaultCreditHours must be a positive number",
            ));
        }
        let t = &self.thresholds;
        if !t.achievable.is_finite() || !t.moderate.is_finite() {
            return Err(CalcError::new("bad_params", "thresholds must be numbers"));
        }
        if t.achievable < 0.0 || t.achievable > t.moderate {
            return Err(CalcError::new(
                "bad_params",
                "thresholds must satisfy 0 <= achievable <= moderate",
            ));
        }
        Ok(())
    }

    /// Overlay a partial JSON patch onto these settings. Unknown keys are
    /// rejected so typos surface instead of being silently ignored.
    pub fn merged(&self, patch: &serde_json::Value) -> Result<CalcSettings, CalcError> {
        let Some(obj) = patch.as_object() else {
            return Err(CalcError::new("bad_params", "settings patch must be an object"));
        };
        let mut next = *self;
        for (k, v) in obj {
            match k.as_str() {
                "defaultCreditHours" => {
                    let Some(n) = v.as_f64() else {
                        return Err(CalcError::new(
                            "bad_params",
                            "defaultCreditHours must be a number",
                        ));
                    };
                    next.default_credit_hours = n;
                }
                "thresholds" => {
                    let Some(t) = v.as_object() else {
                        return Err(CalcError::new("bad_params", "thresholds must be an object"));
                    };
                    if let Some(a) = t.get("achievable") {
                        next.thresholds.achievable = a.as_f64().ok_or_else(|| {
                            CalcError::new("bad_params", "thresholds.achievable must be a number")
                        })?;
                    }
                    if let Some(m) = t.get("moderate") {
                        next.thresholds.moderate = m.as_f64().ok_or_else(|| {
                            CalcError::new("bad_params", "thresholds.moderate must be a number")
                        })?;
                    }
                }
                other => {
                    return Err(CalcError::new(
                        "bad_params",
                        format!("unknown setting: {other}"),
                    ));
                }
            }
        }
        next.validate()?;
        Ok(next)
    }
}

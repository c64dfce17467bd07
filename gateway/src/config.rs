//! Gateway configuration, loaded from TOML
//!
//! Every field has a default, so an empty or missing file yields the standard
//! municipal thresholds and a 13-week quarter.
//!
//! ```toml
//! [escalation]
//! cost_threshold = 10000000
//! confidence_threshold = 65
//!
//! [governance]
//! max_attempts = 2
//!
//! [calendar]
//! weeks = 13
//! [calendar.crew_capacity]
//! road_crew = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::escalation::EscalationThresholds;
use crate::governance::GovernanceConfig;
use crate::scheduling::CalendarConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub escalation: EscalationThresholds,
    pub governance: GovernanceConfig,
    pub calendar: CalendarConfig,
}

impl GatewayConfig {
    pub fn from_toml_str(text: &str) -> GatewayResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| GatewayError::config(format!("invalid gateway config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No gateway config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.escalation.confidence_threshold > 100 {
            return Err(GatewayError::config(
                "escalation.confidence_threshold must be within 0-100",
            ));
        }
        if !self.escalation.high_risk_threshold.is_finite() {
            return Err(GatewayError::config(
                "escalation.high_risk_threshold must be a finite number",
            ));
        }
        if self.governance.max_attempts == 0 {
            return Err(GatewayError::config("governance.max_attempts must be at least 1"));
        }
        if self.calendar.weeks == 0 {
            return Err(GatewayError::config("calendar.weeks must be at least 1"));
        }
        Ok(())
    }
}

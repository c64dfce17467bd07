use anyhow::{Context, Result};
use hitl_gateway::GatewayConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Remote reasoning service endpoint.
#[derive(Debug, Clone)]
pub struct ReasonerEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// CLI configuration, read from `HITL_*` environment variables.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Gateway TOML config; a missing file means defaults.
    pub config_path: PathBuf,
    /// Directory holding run snapshots and project records.
    pub state_dir: PathBuf,
    /// Remote reasoner (None = built-in heuristic reasoner).
    pub reasoner: Option<ReasonerEndpoint>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            config_path: std::env::var("HITL_CONFIG")
                .unwrap_or_else(|_| "hitl-gateway.toml".into())
                .into(),
            state_dir: std::env::var("HITL_STATE_DIR")
                .unwrap_or_else(|_| ".hitl-state".into())
                .into(),
            reasoner: Self::reasoner_from_env(),
        }
    }
}

impl PlannerConfig {
    fn reasoner_from_env() -> Option<ReasonerEndpoint> {
        let url = std::env::var("HITL_REASONER_URL").ok()?;
        let model =
            std::env::var("HITL_REASONER_MODEL").unwrap_or_else(|_| "policy-reasoner".into());
        let api_key = std::env::var("HITL_REASONER_API_KEY").ok();
        let timeout_secs = std::env::var("HITL_REASONER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        Some(ReasonerEndpoint {
            url,
            model,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Point the reasoner at `url`, keeping any other settings from the environment.
    pub fn with_reasoner_url(mut self, url: String) -> Self {
        match self.reasoner.as_mut() {
            Some(endpoint) => endpoint.url = url,
            None => {
                self.reasoner = Some(ReasonerEndpoint {
                    url,
                    model: "policy-reasoner".into(),
                    api_key: None,
                    timeout: Duration::from_secs(60),
                })
            }
        }
        self
    }

    pub fn load_gateway_config(&self) -> Result<GatewayConfig> {
        GatewayConfig::load(&self.config_path).with_context(|| {
            format!(
                "Failed to load gateway config from {}",
                self.config_path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_reasoner_url_creates_endpoint() {
        let config = PlannerConfig {
            config_path: "x.toml".into(),
            state_dir: "state".into(),
            reasoner: None,
        }
        .with_reasoner_url("http://localhost:9000/decide".into());

        let endpoint = config.reasoner.unwrap();
        assert_eq!(endpoint.url, "http://localhost:9000/decide");
        assert_eq!(endpoint.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_gateway_config_is_default() {
        let config = PlannerConfig {
            config_path: "/nonexistent/hitl-gateway.toml".into(),
            state_dir: "state".into(),
            reasoner: None,
        };
        let gateway = config.load_gateway_config().unwrap();
        assert_eq!(gateway, GatewayConfig::default());
    }
}

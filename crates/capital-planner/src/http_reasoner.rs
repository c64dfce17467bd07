//! Reasoning collaborator served over HTTP.
//!
//! POSTs `{"model": ..., "project": {...}}` and expects a `PolicyDecision`
//! JSON body back.

use async_trait::async_trait;
use hitl_gateway::{PolicyDecision, PolicyReasoner, Project, ReasonerError};
use serde::Serialize;

use crate::config::ReasonerEndpoint;

#[derive(Debug, Serialize)]
struct ProposeRequest<'a> {
    model: &'a str,
    project: &'a Project,
}

pub struct HttpReasoner {
    client: reqwest::Client,
    endpoint: ReasonerEndpoint,
}

impl HttpReasoner {
    pub fn new(endpoint: ReasonerEndpoint) -> Result<Self, ReasonerError> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| ReasonerError::Unavailable(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

fn parse_response(body: &str) -> Result<PolicyDecision, ReasonerError> {
    serde_json::from_str(body).map_err(|e| ReasonerError::ParseError(e.to_string()))
}

#[async_trait]
impl PolicyReasoner for HttpReasoner {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn propose(&self, project: &Project) -> Result<PolicyDecision, ReasonerError> {
        let mut request = self.client.post(&self.endpoint.url).json(&ProposeRequest {
            model: &self.endpoint.model,
            project,
        });
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ReasonerError::Timeout(self.endpoint.timeout)
            } else {
                ReasonerError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReasonerError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(ReasonerError::RequestFailed(format!("HTTP {status}: {body}")));
        }
        parse_response(&body)
    }
}

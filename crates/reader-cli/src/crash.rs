use crate::logging::{CrashTrail, TrailEntry};
use anyhow::{Context, bail};
use reader_net::transport::{ApiRequest, Transport};
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Serialize)]
pub struct CrashReport {
    pub command: String,
    pub error: String,
    pub trail: Vec<TrailEntry>,
}

impl CrashReport {
    /// Keeps the trail entries recorded under `command`, plus those recorded
    /// outside any command span (startup and wiring).
    pub fn new(command: &str, error: &anyhow::Error, trail: &CrashTrail) -> Self {
        Self {
            command: command.to_string(),
            error: format!("{error:#}"),
            trail: trail
                .entries()
                .into_iter()
                .filter(|entry| entry.command().is_none_or(|label| label == command))
                .collect(),
        }
    }
}

/// Posts `report` straight to the transport; crash uploads never carry
/// session headers and never trigger a session refresh.
pub async fn upload(
    transport: &dyn Transport,
    endpoint: &Url,
    report: &CrashReport,
) -> anyhow::Result<()> {
    let body = serde_json::to_value(report).context("serialize crash report")?;
    let request = ApiRequest::post_json(endpoint.clone(), body);
    let response = transport
        .execute(&request)
        .await
        .context("send crash report")?;
    if !response.status.is_success() {
        bail!("crash report rejected with status {}", response.status);
    }
    Ok(())
}

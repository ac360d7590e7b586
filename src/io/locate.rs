//! Geometry-to-measure locate client
//!
//! Sends every probe of a run in one batched request and maps the response
//! back to the probes by index. A failed request fails the whole batch;
//! individual non-OK statuses are returned as misses.

use crate::domain::location::{LocateStatus, Probe};
use crate::error::LocateError;
use crate::io::http::HttpTransport;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait LocateService: Send + Sync {
    /// One status per probe, in probe order
    async fn locate(&self, probes: &[Probe]) -> Result<Vec<LocateStatus>, LocateError>;
}

#[derive(Debug, Deserialize)]
struct LocateResponse {
    #[serde(default)]
    locations: Vec<LocatedProbe>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct LocatedProbe {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<MeasureResult>,
}

#[derive(Debug, Deserialize)]
struct MeasureResult {
    #[serde(default)]
    measure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Form fields for a geometryToMeasure request
pub fn locate_form(
    probes: &[Probe],
    tolerance: f64,
) -> Result<Vec<(&'static str, String)>, LocateError> {
    let locations = serde_json::to_string(probes).map_err(LocateError::Encode)?;
    Ok(vec![("f", "json".to_string()), ("locations", locations), ("tolerance", tolerance.to_string())])
}

/// Map a geometryToMeasure response body to per-probe statuses
pub fn parse_locate_response(body: &str, expected: usize) -> Result<Vec<LocateStatus>, LocateError> {
    let response: LocateResponse = serde_json::from_str(body)
        .map_err(|source| LocateError::Decode { source, body: body.to_string() })?;

    if let Some(error) = response.error {
        return Err(LocateError::Service { code: error.code, message: error.message });
    }

    if response.locations.len() != expected {
        return Err(LocateError::Misaligned { expected, actual: response.locations.len() });
    }

    Ok(response
        .locations
        .into_iter()
        .map(|location| {
            let measure = location.results.first().and_then(|result| result.measure);
            LocateStatus::from_service(&location.status, measure)
        })
        .collect())
}

pub struct LocateClient {
    transport: Arc<HttpTransport>,
    url: String,
    tolerance: f64,
}

impl LocateClient {
    pub fn new(transport: Arc<HttpTransport>, url: &str, tolerance: f64) -> Self {
        Self { transport, url: url.to_string(), tolerance }
    }
}

#[async_trait]
impl LocateService for LocateClient {
    async fn locate(&self, probes: &[Probe]) -> Result<Vec<LocateStatus>, LocateError> {
        let form = locate_form(probes, self.tolerance)?;
        debug!(locations = %form[1].1, "locate_request");

        let body = self.transport.post_form(&self.url, &form).await?;
        let statuses = parse_locate_response(&body, probes.len())?;

        let located = statuses.iter().filter(|s| matches!(s, LocateStatus::Located { .. })).count();
        info!(
            probes = %probes.len(),
            located = %located,
            missed = %(probes.len() - located),
            "locate_batch_complete"
        );
        Ok(statuses)
    }
}

//! Apply-edits submitter for the LRS event layer
//!
//! All paired events of a run go out as "adds" in a single request. The
//! batch passes only when the response carries `"success": true`.

use crate::domain::event::{EventFields, EventGroup};
use crate::error::SubmitError;
use crate::io::http::HttpTransport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

#[async_trait]
pub trait EditService: Send + Sync {
    /// Create one event per group. All or nothing.
    async fn submit(&self, groups: &[EventGroup]) -> Result<(), SubmitError>;
}

#[derive(Debug, Serialize)]
pub struct LayerEdits {
    pub id: u32,
    pub adds: Vec<AddFeature>,
}

#[derive(Debug, Serialize)]
pub struct AddFeature {
    pub attributes: Map<String, Value>,
}

/// Build the `edits` payload: one layer entry holding one add per group
pub fn build_edits(
    layer_id: u32,
    groups: &[EventGroup],
    fields: &EventFields,
    passthrough: &[String],
) -> Vec<LayerEdits> {
    let adds = groups
        .iter()
        .map(|group| AddFeature { attributes: group.attributes(fields, passthrough) })
        .collect();
    vec![LayerEdits { id: layer_id, adds }]
}

/// True only for an explicit boolean `success: true`
pub fn is_success(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("success").and_then(Value::as_bool))
        .unwrap_or(false)
}

pub struct EditSubmitter {
    transport: Arc<HttpTransport>,
    url: String,
    layer_id: u32,
    fields: EventFields,
    passthrough: Vec<String>,
}

impl EditSubmitter {
    pub fn new(
        transport: Arc<HttpTransport>,
        url: &str,
        layer_id: u32,
        fields: EventFields,
        passthrough: Vec<String>,
    ) -> Self {
        Self { transport, url: url.to_string(), layer_id, fields, passthrough }
    }
}

#[async_trait]
impl EditService for EditSubmitter {
    async fn submit(&self, groups: &[EventGroup]) -> Result<(), SubmitError> {
        if groups.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let edits = build_edits(self.layer_id, groups, &self.fields, &self.passthrough);
        let edits = serde_json::to_string(&edits).map_err(SubmitError::Encode)?;
        let form = [("f", "json".to_string()), ("edits", edits)];

        let body = self.transport.post_form(&self.url, &form).await?;
        if !is_success(&body) {
            error!(layer_id = %self.layer_id, response = %body, "apply_edits_rejected");
            return Err(SubmitError::Rejected { body });
        }

        info!(layer_id = %self.layer_id, events = %groups.len(), "edits_submitted");
        Ok(())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::api::{SlackApiError, SlackWebClient};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionRef {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Api(#[from] SlackApiError),
    #[error("canvas `{canvas_id}` listed no sections after append")]
    EmptySectionList { canvas_id: String },
}

/// The exact document-API surface the annotator needs; nothing is dispatched
/// by method-name strings.
#[async_trait]
pub trait CanvasGateway: Send + Sync {
    async fn append_section(&self, canvas_id: &str, markdown: &str) -> Result<(), CanvasError>;
    async fn list_sections(&self, canvas_id: &str) -> Result<Vec<SectionRef>, CanvasError>;
    async fn delete_section(&self, canvas_id: &str, section_id: &str) -> Result<(), CanvasError>;
}

#[async_trait]
impl CanvasGateway for SlackWebClient {
    async fn append_section(&self, canvas_id: &str, markdown: &str) -> Result<(), CanvasError> {
        self.call_post(
            "canvases.edit",
            json!({
                "canvas_id": canvas_id,
                "changes": [{
                    "operation": "insert_at_end",
                    "document_content": { "type": "markdown", "markdown": markdown },
                }],
            }),
        )
        .await?;
        Ok(())
    }

    async fn list_sections(&self, canvas_id: &str) -> Result<Vec<SectionRef>, CanvasError> {
        let payload = self
            .call_post(
                "canvases.sections.lookup",
                json!({
                    "canvas_id": canvas_id,
                    "criteria": { "section_types": ["any_header"] },
                }),
            )
            .await?;

        let sections = payload["sections"].as_array().ok_or_else(|| {
            SlackApiError::MalformedResponse {
                method: "canvases.sections.lookup",
                detail: "missing `sections` array".to_string(),
            }
        })?;

        Ok(sections
            .iter()
            .filter_map(|section| section.get("id").and_then(Value::as_str))
            .map(|id| SectionRef { id: id.to_owned() })
            .collect())
    }

    async fn delete_section(&self, canvas_id: &str, section_id: &str) -> Result<(), CanvasError> {
        self.call_post(
            "canvases.edit",
            json!({
                "canvas_id": canvas_id,
                "changes": [{ "operation": "delete", "section_id": section_id }],
            }),
        )
        .await?;
        Ok(())
    }
}

/// Append-only annotator over one statically configured canvas.
#[derive(Clone)]
pub struct CanvasAnnotator {
    gateway: Arc<dyn CanvasGateway>,
    canvas_id: String,
}

impl CanvasAnnotator {
    pub fn new(gateway: Arc<dyn CanvasGateway>, canvas_id: impl Into<String>) -> Self {
        Self { gateway, canvas_id: canvas_id.into() }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Append a markdown section, then resolve its identifier as the last
    /// entry of the section list. The append call does not return the created
    /// id, so this is a two-step protocol with a race window: two inserts
    /// completing before either lookup runs can cross identifiers.
    pub async fn insert(&self, markdown: &str) -> Result<String, CanvasError> {
        self.gateway.append_section(&self.canvas_id, markdown).await?;
        let sections = self.gateway.list_sections(&self.canvas_id).await?;

        let section_id = sections
            .last()
            .map(|section| section.id.clone())
            .ok_or_else(|| CanvasError::EmptySectionList { canvas_id: self.canvas_id.clone() })?;
        debug!(canvas_id = %self.canvas_id, section_id = %section_id, "canvas section appended");
        Ok(section_id)
    }

    /// Remove exactly the named section.
    pub async fn delete(&self, section_id: &str) -> Result<(), CanvasError> {
        self.gateway.delete_section(&self.canvas_id, section_id).await
    }
}

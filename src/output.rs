//! Output types for the map page.
//!
//! These structs are serialized to JSON and handed to the page, which draws
//! markers, clusters and filter controls from them.

use serde::Serialize;

use crate::error::MapError;
use crate::layout::RenderNode;
use crate::record::SpecimenRecord;

/// Filtered records plus the size of the snapshot they came from
#[derive(Debug, Clone, Serialize)]
pub struct FilterOutput<'a> {
    pub records: Vec<&'a SpecimenRecord>,
    pub total: usize,
}

/// Render nodes for one viewport
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput<'a> {
    pub nodes: &'a [RenderNode<SpecimenRecord>],
    /// Number of filtered records the nodes stand for
    pub point_count: usize,
}

impl<'a> RenderOutput<'a> {
    pub fn new(nodes: &'a [RenderNode<SpecimenRecord>]) -> Self {
        let point_count = nodes.iter().map(RenderNode::point_count).sum();
        Self { nodes, point_count }
    }
}

/// Error information shown by the page
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
    pub error: ErrorInfo,
}

impl From<&MapError> for ErrorOutput {
    fn from(e: &MapError) -> Self {
        ErrorOutput {
            error: ErrorInfo {
                message: e.to_string(),
            },
        }
    }
}

/// Encode a value for the page.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, MapError> {
    Ok(serde_json::to_string(value)?)
}

/// Encode an error for the page. Falls back to a fixed body if even that fails.
pub fn error_json(e: &MapError) -> String {
    serde_json::to_string(&ErrorOutput::from(e))
        .unwrap_or_else(|_| "{\"error\": {\"message\": \"internal error\"}}".to_string())
}

//! crates/review_core/src/highlight.rs
//!
//! Converts highlights between their persisted form (a `details` string holding
//! `{content, position}`) and the renderable form consumed by a PDF viewer
//! (scaled geometry plus either extracted text or a captured image).
//!
//! Geometry is stored in a "scaled" space: each rectangle carries the page
//! width/height it was measured against, so it can be re-projected onto any
//! viewport size.

use crate::domain::{Highlight, HighlightKind, HighlightStatus};
use crate::ports::{PageSnapshotService, PortError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const IMAGE_DATA_URI_PREFIX: &str = "data:image/";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("highlight details are not valid: {0}")]
    InvalidDetails(String),
    #[error("highlight position is not valid: {0}")]
    InvalidPosition(String),
    #[error("{kind} highlight content does not match its type: {reason}")]
    KindMismatch {
        kind: HighlightKind,
        reason: &'static str,
    },
    #[error("only AREA highlights can be resized")]
    NotAnArea,
    #[error("cannot project a rectangle measured against a zero-sized page")]
    DegenerateReference,
    #[error("page snapshot failed: {0}")]
    Snapshot(#[from] PortError),
}

//=========================================================================================
// Geometry
//=========================================================================================

/// A rectangle in the scaled coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaled {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Width of the page the coordinates were measured against.
    pub width: f64,
    /// Height of the page the coordinates were measured against.
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// Where a highlight sits in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledPosition {
    pub bounding_rect: Scaled,
    #[serde(default)]
    pub rects: Vec<Scaled>,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pdf_coordinates: Option<bool>,
}

/// The size of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// A rectangle in rendered page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// Projects a scaled rectangle onto a viewport of the given size.
pub fn scaled_to_viewport(scaled: &Scaled, viewport: &Viewport) -> Result<ViewportRect, TransformError> {
    if scaled.width == 0.0 || scaled.height == 0.0 {
        return Err(TransformError::DegenerateReference);
    }
    let x1 = viewport.width * scaled.x1 / scaled.width;
    let y1 = viewport.height * scaled.y1 / scaled.height;
    let x2 = viewport.width * scaled.x2 / scaled.width;
    let y2 = viewport.height * scaled.y2 / scaled.height;

    Ok(ViewportRect {
        left: x1,
        top: y1,
        width: x2 - x1,
        height: y2 - y1,
        page_number: scaled.page_number,
    })
}

/// Re-expresses a viewport rectangle in the scaled space of that viewport.
pub fn viewport_to_scaled(rect: &ViewportRect, viewport: &Viewport) -> Scaled {
    Scaled {
        x1: rect.left,
        y1: rect.top,
        x2: rect.left + rect.width,
        y2: rect.top + rect.height,
        width: viewport.width,
        height: viewport.height,
        page_number: rect.page_number,
    }
}

pub fn parse_position(raw: &str) -> Result<ScaledPosition, TransformError> {
    serde_json::from_str(raw).map_err(|e| TransformError::InvalidPosition(e.to_string()))
}

//=========================================================================================
// Content
//=========================================================================================

/// Renderable content. Serializes as `{"text": ..}` or `{"image": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HighlightContent {
    Text { text: String },
    Area { image: String },
}

impl HighlightContent {
    pub fn kind(&self) -> HighlightKind {
        match self {
            HighlightContent::Text { .. } => HighlightKind::Text,
            HighlightContent::Area { .. } => HighlightKind::Area,
        }
    }

    pub fn as_raw(&self) -> &str {
        match self {
            HighlightContent::Text { text } => text,
            HighlightContent::Area { image } => image,
        }
    }

    /// Builds content for `kind`. An AREA tag must carry an image data URI;
    /// TEXT content is taken verbatim, whatever it starts with.
    pub fn for_kind(kind: HighlightKind, raw: String) -> Result<Self, TransformError> {
        match kind {
            HighlightKind::Area if !is_image_data_uri(&raw) => Err(TransformError::KindMismatch {
                kind,
                reason: "expected an image data URI",
            }),
            HighlightKind::Area => Ok(HighlightContent::Area { image: raw }),
            HighlightKind::Text => Ok(HighlightContent::Text { text: raw }),
        }
    }
}

pub fn is_image_data_uri(raw: &str) -> bool {
    raw.starts_with(IMAGE_DATA_URI_PREFIX) && raw.contains(',')
}

/// Decodes the payload of a base64 `data:image/...` URI.
pub fn decode_image_data_uri(raw: &str) -> Option<Vec<u8>> {
    let rest = raw.strip_prefix(IMAGE_DATA_URI_PREFIX)?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload).ok()
}

//=========================================================================================
// Persisted <-> Renderable
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct StoredDetails {
    content: String,
    /// The position is kept as its own JSON document inside `details`.
    position: String,
}

/// A highlight ready to be drawn by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedHighlight {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    pub content: HighlightContent,
    pub position: ScaledPosition,
    pub status: Option<HighlightStatus>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Produces the persisted `(kind, details)` pair. The kind is taken from the
/// content variant, so tag and content always agree.
pub fn serialize(
    content: &HighlightContent,
    position: &ScaledPosition,
) -> Result<(HighlightKind, String), TransformError> {
    let kind = content.kind();
    HighlightContent::for_kind(kind, content.as_raw().to_string())?;
    let position =
        serde_json::to_string(position).map_err(|e| TransformError::InvalidPosition(e.to_string()))?;
    let details = serde_json::to_string(&StoredDetails {
        content: content.as_raw().to_string(),
        position,
    })
    .map_err(|e| TransformError::InvalidDetails(e.to_string()))?;
    Ok((kind, details))
}

/// Rebuilds the renderable form of a stored highlight. The stored type tag
/// decides how the content is read.
pub fn deserialize(highlight: &Highlight) -> Result<RenderedHighlight, TransformError> {
    let stored: StoredDetails = serde_json::from_str(&highlight.details)
        .map_err(|e| TransformError::InvalidDetails(e.to_string()))?;
    let position = parse_position(&stored.position)?;
    let content = HighlightContent::for_kind(highlight.kind, stored.content)?;

    Ok(RenderedHighlight {
        id: highlight.id,
        kind: highlight.kind,
        content,
        position,
        status: highlight.status,
        reviewed_at: highlight.reviewed_at,
    })
}

/// Recomputes an AREA highlight after its rectangle was dragged or resized on a
/// rendered page: a fresh snapshot of `rect` replaces the image and the
/// bounding rectangle is re-expressed in scaled space. Identity, decision and
/// page placement are preserved.
pub fn resize_area(
    highlight: &RenderedHighlight,
    rect: ViewportRect,
    viewport: &Viewport,
    snapshots: &dyn PageSnapshotService,
) -> Result<RenderedHighlight, TransformError> {
    if highlight.kind != HighlightKind::Area {
        return Err(TransformError::NotAnArea);
    }
    let image = snapshots.snapshot(&rect)?;
    let content = HighlightContent::for_kind(HighlightKind::Area, image)?;

    let mut position = highlight.position.clone();
    position.bounding_rect = viewport_to_scaled(&rect, viewport);

    Ok(RenderedHighlight {
        content,
        position,
        ..highlight.clone()
    })
}

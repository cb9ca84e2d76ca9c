//! crates/review_core/src/domain.rs
//!
//! Defines the pure, core data structures for the review workflow.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Returned when a wire string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

//=========================================================================================
// Highlight Enums
//=========================================================================================

/// The two shapes a highlight can take on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HighlightKind {
    /// A selected run of text.
    Text,
    /// A rectangular region captured as an image.
    Area,
}

impl HighlightKind {
    pub const WIRE_VALUES: &'static [&'static str] = &["TEXT", "AREA"];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightKind::Text => "TEXT",
            HighlightKind::Area => "AREA",
        }
    }
}

impl FromStr for HighlightKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(HighlightKind::Text),
            "AREA" => Ok(HighlightKind::Area),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The approver's decision on a single highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HighlightStatus {
    Approved,
    Rejected,
}

impl HighlightStatus {
    pub const WIRE_VALUES: &'static [&'static str] = &["APPROVED", "REJECTED"];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightStatus::Approved => "APPROVED",
            HighlightStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for HighlightStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(HighlightStatus::Approved),
            "REJECTED" => Ok(HighlightStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for HighlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Entities
//=========================================================================================

/// A PDF submitted for approval.
///
/// Highlights are not embedded here; they reference the request by id and are
/// loaded separately through the `DatabaseService` port.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub id: Uuid,
    pub requester_email: String,
    pub approver_email: String,
    pub subject: String,
    /// Storage name of the uploaded PDF, e.g. `pdf/3fa1...e9.pdf`.
    pub pdf_path: String,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A single passage selected by the requester.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub id: Uuid,
    pub request_id: Uuid,
    pub kind: HighlightKind,
    /// Serialized `{content, position}` produced by the highlight transform.
    pub details: String,
    pub status: Option<HighlightStatus>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// One entry of a batch review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewDecision {
    pub highlight_id: Uuid,
    pub status: HighlightStatus,
}

/// Which party of a request a verified email belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Approver,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_only_uppercase_wire_values() {
        assert_eq!("TEXT".parse::<HighlightKind>(), Ok(HighlightKind::Text));
        assert_eq!("AREA".parse::<HighlightKind>(), Ok(HighlightKind::Area));
        assert!("text".parse::<HighlightKind>().is_err());
    }

    #[test]
    fn status_serializes_as_uppercase() {
        let json = serde_json::to_string(&HighlightStatus::Rejected).unwrap();
        assert_eq!(json, "\"REJECTED\"");
        assert_eq!(
            "APPROVED".parse::<HighlightStatus>(),
            Ok(HighlightStatus::Approved)
        );
    }
}

//! crates/review_core/src/input.rs
//!
//! Untrusted input accepted by the workflow, together with the schemas that
//! validate it. Every field is a plain string so that a malformed value is
//! reported by the validator instead of failing deserialization.

use crate::domain::{HighlightKind, HighlightStatus};
use crate::highlight::{decode_image_data_uri, parse_position};
use crate::pdf::has_pdf_signature;
use crate::validation::{validate, Field, Rule, Schema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRequestInput {
    pub requester_email: String,
    pub approver_email: String,
    pub subject: String,
    /// Base64 PDF, optionally as a `data:application/pdf;base64,` URI.
    pub pdf: String,
    pub highlights: Vec<HighlightInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightInput {
    #[serde(rename = "type")]
    pub kind: String,
    /// Extracted text for TEXT, an image data URI for AREA.
    pub content: String,
    /// JSON-encoded scaled position.
    pub position: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewInput {
    pub highlights: Vec<DecisionInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionInput {
    pub id: String,
    pub status: String,
}

/// Checks a raw JSON body against `schema` before reading it into `T`, so a
/// value of the wrong JSON type is reported alongside every other violation.
pub fn from_json<T: DeserializeOwned>(schema: Schema, value: Value) -> Result<T, Vec<String>> {
    validate(schema, &value)?;
    serde_json::from_value(value).map_err(|e| vec![format!("body is malformed: {}", e)])
}

impl CreateRequestInput {
    pub fn from_json(value: Value) -> Result<Self, Vec<String>> {
        from_json(CREATE_REQUEST_SCHEMA, value)
    }
}

impl ReviewInput {
    pub fn from_json(value: Value) -> Result<Self, Vec<String>> {
        from_json(REVIEW_SCHEMA, value)
    }
}

//=========================================================================================
// Schemas
//=========================================================================================

fn differs(a: &str, b: &str) -> bool {
    a != b
}

fn is_position(raw: &str) -> bool {
    parse_position(raw).is_ok()
}

fn content_matches_type(content: &str, kind: &str) -> bool {
    match kind.parse::<HighlightKind>() {
        Ok(HighlightKind::Area) => decode_image_data_uri(content).is_some(),
        // TEXT is free text. An unknown type is already reported on `type`.
        Ok(HighlightKind::Text) | Err(_) => true,
    }
}

const HIGHLIGHT_SCHEMA: Schema = &[
    Field {
        name: "type",
        rules: &[Rule::OneOf(HighlightKind::WIRE_VALUES)],
    },
    Field {
        name: "content",
        rules: &[
            Rule::NotEmpty,
            Rule::Relation {
                other: "type",
                test: content_matches_type,
                message: "must be an image data URI for AREA highlights",
            },
        ],
    },
    Field {
        name: "position",
        rules: &[
            Rule::NotEmpty,
            Rule::Check {
                test: is_position,
                message: "must be a JSON encoded position",
            },
        ],
    },
];

pub const CREATE_REQUEST_SCHEMA: Schema = &[
    Field {
        name: "requesterEmail",
        rules: &[
            Rule::NotEmpty,
            Rule::Email,
            Rule::Relation {
                other: "approverEmail",
                test: differs,
                message: "should not be the same as approverEmail",
            },
        ],
    },
    Field {
        name: "approverEmail",
        rules: &[Rule::NotEmpty, Rule::Email],
    },
    Field {
        name: "subject",
        rules: &[Rule::NotBlank],
    },
    Field {
        name: "pdf",
        rules: &[
            Rule::NotEmpty,
            Rule::Check {
                test: has_pdf_signature,
                message: "must be a base64 encoded PDF",
            },
        ],
    },
    Field {
        name: "highlights",
        rules: &[Rule::Array(HIGHLIGHT_SCHEMA)],
    },
];

const DECISION_SCHEMA: Schema = &[
    Field {
        name: "id",
        rules: &[Rule::Uuid],
    },
    Field {
        name: "status",
        rules: &[Rule::OneOf(HighlightStatus::WIRE_VALUES)],
    },
];

pub const REVIEW_SCHEMA: Schema = &[Field {
    name: "highlights",
    rules: &[Rule::Array(DECISION_SCHEMA)],
}];

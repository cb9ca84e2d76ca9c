//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ErrorBody, RestError};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use review_core::domain::{HighlightKind, HighlightStatus, Role};
use review_core::highlight::{HighlightContent, RenderedHighlight, ScaledPosition};
use review_core::{AccessGrant, CreateRequestInput, RequestState, RequestView, ReviewInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_request_handler,
        get_request_handler,
        review_request_handler,
        delete_request_handler,
        get_pdf_handler,
        get_request_pdf_handler,
    ),
    components(
        schemas(
            CreateRequestBody,
            HighlightBody,
            ReviewBody,
            DecisionBody,
            GrantResponse,
            RequestResponse,
            HighlightResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Highlight Review API", description = "Submit PDF highlights for review and record the approver's decisions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// A new review request.
///
/// Documents the body only; handlers read the raw JSON so that every field
/// of the wrong type is reported together with the other violations.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[schema(example = "requester@example.com")]
    pub requester_email: String,
    #[schema(example = "approver@example.com")]
    pub approver_email: String,
    pub subject: String,
    /// Base64 encoded PDF, with or without a `data:application/pdf;base64,` prefix.
    pub pdf: String,
    pub highlights: Vec<HighlightBody>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HighlightBody {
    #[serde(rename = "type")]
    #[schema(example = "TEXT")]
    pub kind: String,
    /// Selected text for TEXT highlights, an image data URI for AREA highlights.
    pub content: String,
    /// JSON encoded scaled position.
    pub position: String,
}

/// The approver's decisions, one per highlight.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReviewBody {
    pub highlights: Vec<DecisionBody>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DecisionBody {
    pub id: String,
    #[schema(example = "APPROVED")]
    pub status: String,
}

/// The email a token was issued for, and the token itself.
#[derive(Deserialize, IntoParams, Default)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct Credentials {
    pub token: String,
    pub email: String,
}

//=========================================================================================
// API Response Structs
//=========================================================================================

/// A request id and the token for whoever acts on it next.
#[derive(Serialize, ToSchema)]
pub struct GrantResponse {
    pub id: Uuid,
    pub token: String,
}

impl From<AccessGrant> for GrantResponse {
    fn from(grant: AccessGrant) -> Self {
        Self {
            id: grant.id,
            token: grant.token.into_inner(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighlightResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "AREA")]
    pub kind: HighlightKind,
    /// `{"text": ...}` or `{"image": ...}`.
    #[schema(value_type = Object)]
    pub content: HighlightContent,
    #[schema(value_type = Object)]
    pub position: ScaledPosition,
    #[schema(value_type = Option<String>, example = "APPROVED")]
    pub status: Option<HighlightStatus>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<RenderedHighlight> for HighlightResponse {
    fn from(h: RenderedHighlight) -> Self {
        Self {
            id: h.id,
            kind: h.kind,
            content: h.content,
            position: h.position,
            status: h.status,
            reviewed_at: h.reviewed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: Uuid,
    pub requester_email: String,
    pub approver_email: String,
    pub subject: String,
    pub pdf_path: String,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, example = "CREATED")]
    pub state: RequestState,
    /// `requester` or `approver` when the caller is one of the parties.
    #[schema(value_type = Option<String>, example = "approver")]
    pub role: Option<Role>,
    pub highlights: Vec<HighlightResponse>,
}

impl From<RequestView> for RequestResponse {
    fn from(view: RequestView) -> Self {
        let request = view.request;
        Self {
            id: request.id,
            requester_email: request.requester_email,
            approver_email: request.approver_email,
            subject: request.subject,
            pdf_path: request.pdf_path,
            requested_at: request.requested_at,
            reviewed_at: request.reviewed_at,
            state: view.state,
            role: view.role,
            highlights: view.highlights.into_iter().map(HighlightResponse::from).collect(),
        }
    }
}

fn pdf_response(bytes: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/pdf")], Bytes::from(bytes))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a review request.
///
/// Stores the PDF and its highlights, emails the approver a review link and
/// returns the requester's token.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = CreateRequestBody,
    responses(
        (status = 201, description = "Request created", body = GrantResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 500, description = "System error", body = ErrorBody)
    )
)]
pub async fn create_request_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, RestError> {
    let Json(body) = payload?;
    let input = CreateRequestInput::from_json(body).map_err(RestError::validation)?;
    let grant = app_state.workflow.create_request(input).await?;
    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

/// Read a request with its highlights.
#[utoipa::path(
    get,
    path = "/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "The request id."),
        Credentials
    ),
    responses(
        (status = 200, description = "The request", body = RequestResponse),
        (status = 401, description = "Token does not match the email", body = ErrorBody),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
pub async fn get_request_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
    credentials: Result<Query<Credentials>, QueryRejection>,
) -> Result<Json<RequestResponse>, RestError> {
    let Query(credentials) = credentials?;
    let Path(id) = id?;
    let view = app_state
        .workflow
        .get_request(id, &credentials.email, &credentials.token)
        .await?;
    Ok(Json(view.into()))
}

/// Record the approver's decisions.
///
/// Every highlight of the request must receive exactly one decision. A request
/// can only be reviewed once.
#[utoipa::path(
    patch,
    path = "/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "The request id."),
        Credentials
    ),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Decisions recorded", body = GrantResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Caller is not the approver", body = ErrorBody),
        (status = 404, description = "Request not found", body = ErrorBody),
        (status = 409, description = "Request already reviewed", body = ErrorBody)
    )
)]
pub async fn review_request_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
    credentials: Result<Query<Credentials>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<GrantResponse>, RestError> {
    let Query(credentials) = credentials?;
    let Path(id) = id?;
    app_state
        .workflow
        .authorize_approver(id, &credentials.email, &credentials.token)
        .await?;
    let Json(body) = payload?;
    let input = ReviewInput::from_json(body).map_err(RestError::validation)?;
    let grant = app_state.workflow.apply_review(id, input).await?;
    Ok(Json(grant.into()))
}

/// Withdraw a request. Only the requester may do this.
#[utoipa::path(
    delete,
    path = "/requests/{id}",
    params(
        ("id" = Uuid, Path, description = "The request id."),
        Credentials
    ),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 401, description = "Caller is not the requester", body = ErrorBody),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
pub async fn delete_request_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
    credentials: Result<Query<Credentials>, QueryRejection>,
) -> Result<StatusCode, RestError> {
    let Query(credentials) = credentials?;
    let Path(id) = id?;
    app_state
        .workflow
        .delete_request(id, &credentials.email, &credentials.token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download a PDF by its stored file name.
#[utoipa::path(
    get,
    path = "/requests/pdf/{filename}",
    params(("filename" = String, Path, description = "File name from the request's pdfPath.")),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "PDF not found", body = ErrorBody)
    )
)]
pub async fn get_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, RestError> {
    let bytes = app_state.workflow.get_pdf(&filename).await?;
    Ok(pdf_response(bytes))
}

/// Download the PDF of a request, behind the same token check as reading it.
#[utoipa::path(
    get,
    path = "/requests/{id}/pdf",
    params(
        ("id" = Uuid, Path, description = "The request id."),
        Credentials
    ),
    responses(
        (status = 200, description = "The PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Token does not match the email", body = ErrorBody),
        (status = 404, description = "Request or PDF not found", body = ErrorBody)
    )
)]
pub async fn get_request_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
    credentials: Result<Query<Credentials>, QueryRejection>,
) -> Result<impl IntoResponse, RestError> {
    let Query(credentials) = credentials?;
    let Path(id) = id?;
    let bytes = app_state
        .workflow
        .get_request_pdf(id, &credentials.email, &credentials.token)
        .await?;
    Ok(pdf_response(bytes))
}

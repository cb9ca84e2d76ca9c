//! crates/review_core/src/service.rs
//!
//! The review workflow: creating requests, authenticated reads, the atomic
//! batch review and PDF retrieval. Everything external is reached through the
//! ports, so the workflow itself holds no I/O of its own.

use crate::domain::{Highlight, HighlightKind, HighlightStatus, ReviewDecision, ReviewRequest, Role};
use crate::highlight::{self, HighlightContent, RenderedHighlight, TransformError};
use crate::input::{CreateRequestInput, HighlightInput, ReviewInput, CREATE_REQUEST_SCHEMA, REVIEW_SCHEMA};
use crate::lifecycle::{self, LifecycleError, RequestState};
use crate::notify;
use crate::pdf;
use crate::ports::{DatabaseService, Notification, NotificationService, PdfStorageService, PortError};
use crate::token::{AccessToken, TokenCodec};
use crate::validation::{validate, Schema};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

//=========================================================================================
// Errors
//=========================================================================================

/// The fixed error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SystemError,
    ValidationError,
    RequestNotFound,
    PdfNotFound,
    InvalidToken,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SystemError => "SYSTEM_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::RequestNotFound => "REQUEST_NOT_FOUND",
            ErrorCode::PdfNotFound => "PDF_NOT_FOUND",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
        }
    }

    /// The public code carried in error envelopes.
    pub fn public_code(&self) -> &'static str {
        match self {
            ErrorCode::SystemError => "GENERAL-001",
            ErrorCode::ValidationError => "GENERAL-002",
            ErrorCode::RequestNotFound => "REQUEST-001",
            ErrorCode::PdfNotFound => "REQUEST-002",
            ErrorCode::InvalidToken => "REQUEST-003",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::SystemError => "System error",
            ErrorCode::ValidationError => "Validation error",
            ErrorCode::RequestNotFound => "Request not found",
            ErrorCode::PdfNotFound => "PDF not found",
            ErrorCode::InvalidToken => "Invalid Token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Request {0} has already been reviewed")]
    AlreadyReviewed(Uuid),
    #[error("Request not found")]
    RequestNotFound,
    #[error("PDF not found")]
    PdfNotFound,
    #[error("Invalid Token")]
    InvalidToken,
    /// Internal failure; the detail is for logs, not for callers.
    #[error("System error: {0}")]
    System(String),
}

impl WorkflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowError::Validation(_) | WorkflowError::AlreadyReviewed(_) => ErrorCode::ValidationError,
            WorkflowError::RequestNotFound => ErrorCode::RequestNotFound,
            WorkflowError::PdfNotFound => ErrorCode::PdfNotFound,
            WorkflowError::InvalidToken => ErrorCode::InvalidToken,
            WorkflowError::System(_) => ErrorCode::SystemError,
        }
    }

    /// Per-field messages for validation failures.
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            WorkflowError::Validation(messages) => Some(messages.clone()),
            WorkflowError::AlreadyReviewed(_) => Some(vec!["request has already been reviewed".to_string()]),
            _ => None,
        }
    }
}

impl From<LifecycleError> for WorkflowError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::AlreadyReviewed(id) => WorkflowError::AlreadyReviewed(id),
            LifecycleError::InvalidDecisions(problems) => WorkflowError::Validation(problems),
        }
    }
}

fn system(context: &str, e: impl std::fmt::Display) -> WorkflowError {
    error!("{}: {}", context, e);
    WorkflowError::System(format!("{}: {}", context, e))
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

//=========================================================================================
// Results
//=========================================================================================

/// A request id together with a token for the party that should use it next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub id: Uuid,
    pub token: AccessToken,
}

/// A request as seen through an authenticated read.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub request: ReviewRequest,
    pub state: RequestState,
    /// The party the verified email belongs to, if any.
    pub role: Option<Role>,
    pub highlights: Vec<RenderedHighlight>,
}

//=========================================================================================
// The Workflow
//=========================================================================================

#[derive(Clone)]
pub struct ReviewWorkflow {
    db: Arc<dyn DatabaseService>,
    pdfs: Arc<dyn PdfStorageService>,
    notifier: Arc<dyn NotificationService>,
    tokens: TokenCodec,
    link_base: String,
    /// Notifications still being delivered.
    outbox: TaskTracker,
}

impl ReviewWorkflow {
    /// `link_base` is the front-end origin that emailed links point at.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        pdfs: Arc<dyn PdfStorageService>,
        notifier: Arc<dyn NotificationService>,
        tokens: TokenCodec,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            db,
            pdfs,
            notifier,
            tokens,
            link_base: link_base.into().trim_end_matches('/').to_string(),
            outbox: TaskTracker::new(),
        }
    }

    /// Waits until every notification dispatched so far has been delivered or
    /// has failed. Call once the server has stopped accepting requests.
    pub async fn flush_notifications(&self) {
        self.outbox.close();
        self.outbox.wait().await;
    }

    /// `{base}/requests/{id}?token={token}`
    pub fn request_link(&self, id: Uuid, token: &AccessToken) -> String {
        format!("{}/requests/{}?token={}", self.link_base, id, token)
    }

    /// Validates and persists a new request, then notifies the approver.
    ///
    /// The PDF is written before the records; if the records cannot be saved
    /// the PDF is removed again, so a failed call leaves nothing behind.
    pub async fn create_request(&self, input: CreateRequestInput) -> WorkflowResult<AccessGrant> {
        check_schema(CREATE_REQUEST_SCHEMA, &input)?;
        let pdf_bytes = pdf::decode_pdf(&input.pdf)
            .ok_or_else(|| WorkflowError::Validation(vec!["pdf must be a base64 encoded PDF".to_string()]))?;

        let id = Uuid::new_v4();
        let highlights = input
            .highlights
            .iter()
            .map(|h| build_highlight(id, h))
            .collect::<Result<Vec<_>, _>>()?;

        let request = ReviewRequest {
            id,
            requester_email: input.requester_email,
            approver_email: input.approver_email,
            subject: input.subject,
            pdf_path: pdf::generate_pdf_name(),
            requested_at: Utc::now(),
            reviewed_at: None,
            deleted_at: None,
        };

        self.pdfs
            .put(&request.pdf_path, &pdf_bytes)
            .await
            .map_err(|e| system("failed to store PDF", e))?;

        if let Err(e) = self.db.insert_request(&request, &highlights).await {
            if let Err(cleanup) = self.pdfs.delete(&request.pdf_path).await {
                warn!("Failed to remove orphaned PDF {}: {}", request.pdf_path, cleanup);
            }
            return Err(system("failed to save request", e));
        }
        info!(
            "Request {} created with {} highlight(s)",
            request.id,
            highlights.len()
        );

        let approver_token = self.tokens.issue(&request.approver_email);
        let link = self.request_link(request.id, &approver_token);
        self.dispatch(notify::request_created(&request, &link));

        Ok(AccessGrant {
            id: request.id,
            token: self.tokens.issue(&request.requester_email),
        })
    }

    /// Reads a request after checking that `token` belongs to `email`.
    ///
    /// The email does not have to be one of the request's parties; the token
    /// check is the only authorization.
    pub async fn get_request(&self, id: Uuid, email: &str, token: &str) -> WorkflowResult<RequestView> {
        self.authenticate(email, token)?;
        let request = self.load_request(id).await?;
        let highlights = self
            .db
            .get_highlights_for_request(id)
            .await
            .map_err(|e| system("failed to load highlights", e))?;

        let highlights = highlights
            .iter()
            .map(highlight::deserialize)
            .collect::<Result<Vec<_>, TransformError>>()
            .map_err(|e| system(&format!("stored highlight of request {} is corrupt", id), e))?;

        Ok(RequestView {
            state: lifecycle::state_of(&request),
            role: lifecycle::acting_role(&request, email),
            request,
            highlights,
        })
    }

    /// Applies a batch of decisions as one unit and notifies the requester.
    ///
    /// No token is checked here; use [`ReviewWorkflow::apply_review_as`] when the
    /// caller has not been authenticated already.
    pub async fn apply_review(&self, id: Uuid, input: ReviewInput) -> WorkflowResult<AccessGrant> {
        check_schema(REVIEW_SCHEMA, &input)?;
        let decisions = parse_decisions(&input)?;

        let request = self.load_request(id).await?;
        let highlights = self
            .db
            .get_highlights_for_request(id)
            .await
            .map_err(|e| system("failed to load highlights", e))?;
        let plan = lifecycle::plan_review(&request, &highlights, decisions, Utc::now())?;

        match self
            .db
            .apply_review(plan.request_id, plan.reviewed_at, &plan.decisions)
            .await
        {
            Ok(()) => {}
            Err(PortError::Conflict(_)) => return Err(WorkflowError::AlreadyReviewed(id)),
            Err(PortError::NotFound(_)) => return Err(WorkflowError::RequestNotFound),
            Err(e) => return Err(system("failed to apply review", e)),
        }
        info!("Request {} reviewed", id);

        let requester_token = self.tokens.issue(&request.requester_email);
        let link = self.request_link(id, &requester_token);
        self.dispatch(notify::request_reviewed(&request, &link));

        Ok(AccessGrant {
            id,
            token: self.tokens.issue(&request.approver_email),
        })
    }

    /// [`ReviewWorkflow::apply_review`] for callers holding the approver's link.
    pub async fn apply_review_as(
        &self,
        id: Uuid,
        email: &str,
        token: &str,
        input: ReviewInput,
    ) -> WorkflowResult<AccessGrant> {
        self.authorize_approver(id, email, token).await?;
        self.apply_review(id, input).await
    }

    /// Succeeds when `token` is valid for `email` and `email` is the approver
    /// of the live request `id`.
    pub async fn authorize_approver(&self, id: Uuid, email: &str, token: &str) -> WorkflowResult<()> {
        self.authenticate(email, token)?;
        let request = self.load_request(id).await?;
        if lifecycle::acting_role(&request, email) != Some(Role::Approver) {
            return Err(WorkflowError::InvalidToken);
        }
        Ok(())
    }

    /// Loads a PDF by its public file name. Knowledge of the random name is
    /// the only protection; prefer [`ReviewWorkflow::get_request_pdf`].
    pub async fn get_pdf(&self, filename: &str) -> WorkflowResult<Vec<u8>> {
        let name = pdf::storage_name_for(filename).ok_or(WorkflowError::PdfNotFound)?;
        self.read_pdf(&name).await
    }

    /// Loads the PDF of a request behind the same token check as `get_request`.
    pub async fn get_request_pdf(&self, id: Uuid, email: &str, token: &str) -> WorkflowResult<Vec<u8>> {
        self.authenticate(email, token)?;
        let request = self.load_request(id).await?;
        self.read_pdf(&request.pdf_path).await
    }

    /// Soft-deletes a request on behalf of its requester.
    pub async fn delete_request(&self, id: Uuid, email: &str, token: &str) -> WorkflowResult<()> {
        self.authenticate(email, token)?;
        let request = self.load_request(id).await?;
        if lifecycle::acting_role(&request, email) != Some(Role::Requester) {
            return Err(WorkflowError::InvalidToken);
        }
        match self.db.soft_delete_request(id, Utc::now()).await {
            Ok(()) => {
                info!("Request {} deleted", id);
                Ok(())
            }
            Err(PortError::NotFound(_)) => Err(WorkflowError::RequestNotFound),
            Err(e) => Err(system("failed to delete request", e)),
        }
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    fn authenticate(&self, email: &str, token: &str) -> WorkflowResult<()> {
        if self.tokens.verify(email, token) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidToken)
        }
    }

    async fn load_request(&self, id: Uuid) -> WorkflowResult<ReviewRequest> {
        match self.db.get_request_by_id(id).await {
            Ok(request) if request.deleted_at.is_none() => Ok(request),
            Ok(_) | Err(PortError::NotFound(_)) => Err(WorkflowError::RequestNotFound),
            Err(e) => Err(system("failed to load request", e)),
        }
    }

    async fn read_pdf(&self, name: &str) -> WorkflowResult<Vec<u8>> {
        match self.pdfs.get(name).await {
            Ok(bytes) => Ok(bytes),
            Err(PortError::NotFound(_)) => Err(WorkflowError::PdfNotFound),
            Err(e) => Err(system("failed to read PDF", e)),
        }
    }

    /// Sends in the background; delivery problems are logged and never reach
    /// the caller.
    fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        self.outbox.spawn(async move {
            let to = notification.to.clone();
            if let Err(e) = notifier.send(notification).await {
                warn!("Failed to notify {}: {}", to, e);
            }
        });
    }
}

fn check_schema<T: Serialize>(schema: Schema, input: &T) -> WorkflowResult<()> {
    let value = serde_json::to_value(input).map_err(|e| system("failed to inspect input", e))?;
    validate(schema, &value).map_err(WorkflowError::Validation)
}

fn build_highlight(request_id: Uuid, input: &HighlightInput) -> WorkflowResult<Highlight> {
    let invalid = |e: TransformError| WorkflowError::Validation(vec![e.to_string()]);

    let kind: HighlightKind = input
        .kind
        .parse()
        .map_err(|_| WorkflowError::Validation(vec![format!("unknown highlight type {}", input.kind)]))?;
    let position = highlight::parse_position(&input.position).map_err(invalid)?;
    let content = HighlightContent::for_kind(kind, input.content.clone()).map_err(invalid)?;
    let (kind, details) = highlight::serialize(&content, &position).map_err(invalid)?;

    Ok(Highlight {
        id: Uuid::new_v4(),
        request_id,
        kind,
        details,
        status: None,
        reviewed_at: None,
    })
}

fn parse_decisions(input: &ReviewInput) -> WorkflowResult<Vec<ReviewDecision>> {
    input
        .highlights
        .iter()
        .map(|d| {
            let highlight_id = Uuid::parse_str(&d.id)
                .map_err(|_| WorkflowError::Validation(vec![format!("{} is not a highlight id", d.id)]))?;
            let status: HighlightStatus = d
                .status
                .parse()
                .map_err(|_| WorkflowError::Validation(vec![format!("unknown status {}", d.status)]))?;
            Ok(ReviewDecision { highlight_id, status })
        })
        .collect()
}

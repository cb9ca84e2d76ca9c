//! crates/review_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the review workflow.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the blob store and the mail transport.

use crate::domain::{Highlight, ReviewDecision, ReviewRequest};
use crate::highlight::ViewportRect;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A conditional write lost against the current state of the item.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    /// Persists a request and its highlights as one unit. Highlight order is
    /// the creation order and must be preserved by later reads.
    async fn insert_request(&self, request: &ReviewRequest, highlights: &[Highlight]) -> PortResult<()>;

    /// Fetches a request that has not been soft-deleted.
    async fn get_request_by_id(&self, request_id: Uuid) -> PortResult<ReviewRequest>;

    /// Returns the highlights of a request in creation order.
    async fn get_highlights_for_request(&self, request_id: Uuid) -> PortResult<Vec<Highlight>>;

    /// Atomically stamps `reviewed_at` on the request and applies every decision
    /// with the same timestamp.
    ///
    /// Returns `PortError::Conflict` without writing anything if the request is
    /// already reviewed. Any failure must leave the request unreviewed with no
    /// decisions recorded.
    async fn apply_review(
        &self,
        request_id: Uuid,
        reviewed_at: DateTime<Utc>,
        decisions: &[ReviewDecision],
    ) -> PortResult<()>;

    /// Marks the request and its highlights as deleted.
    async fn soft_delete_request(&self, request_id: Uuid, deleted_at: DateTime<Utc>) -> PortResult<()>;
}

#[async_trait]
pub trait PdfStorageService: Send + Sync {
    /// Stores PDF bytes under `name`; must be durable when it returns.
    async fn put(&self, name: &str, data: &[u8]) -> PortResult<()>;

    /// Loads PDF bytes, `PortError::NotFound` when absent.
    async fn get(&self, name: &str) -> PortResult<Vec<u8>>;

    async fn delete(&self, name: &str) -> PortResult<()>;
}

/// An outbound message addressed to one of the parties of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> PortResult<()>;
}

/// Captures what is currently drawn inside a rectangle of a rendered page.
pub trait PageSnapshotService {
    /// Returns the snapshot as an image data URI.
    fn snapshot(&self, rect: &ViewportRect) -> PortResult<String>;
}

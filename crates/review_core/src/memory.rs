//! crates/review_core/src/memory.rs
//!
//! In-process implementations of the storage ports. They back the API when no
//! database is configured and serve as the storage for workflow tests.

use crate::domain::{Highlight, ReviewDecision, ReviewRequest};
use crate::ports::{DatabaseService, PdfStorageService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

const NO_FAULT: usize = usize::MAX;

#[derive(Default)]
struct Tables {
    requests: HashMap<Uuid, ReviewRequest>,
    /// Per request, in creation order.
    highlights: HashMap<Uuid, Vec<Highlight>>,
}

/// A `DatabaseService` held entirely in memory.
///
/// A review is applied to staged copies of its own request and highlights,
/// which replace the live rows only once every write has succeeded.
/// Highlights of a soft-deleted request are no longer returned.
pub struct MemoryDb {
    tables: RwLock<Tables>,
    fail_review_after: AtomicUsize,
    fail_next_insert: AtomicBool,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            fail_review_after: AtomicUsize::new(NO_FAULT),
            fail_next_insert: AtomicBool::new(false),
        }
    }

    /// Makes the next `apply_review` fail after the request has been stamped and
    /// `applied` highlight decisions have been written.
    pub fn fail_next_review_after(&self, applied: usize) {
        self.fail_review_after.store(applied, Ordering::SeqCst);
    }

    /// Makes the next `insert_request` fail.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    /// Raw access to a stored request, including soft-deleted ones.
    pub async fn raw_request(&self, id: Uuid) -> Option<ReviewRequest> {
        self.tables.read().await.requests.get(&id).cloned()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn insert_request(&self, request: &ReviewRequest, highlights: &[Highlight]) -> PortResult<()> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(PortError::Unexpected("injected insert failure".to_string()));
        }
        let mut tables = self.tables.write().await;
        if tables.requests.contains_key(&request.id) {
            return Err(PortError::Conflict(format!("Request {} already exists", request.id)));
        }
        tables.requests.insert(request.id, request.clone());
        tables.highlights.insert(request.id, highlights.to_vec());
        Ok(())
    }

    async fn get_request_by_id(&self, request_id: Uuid) -> PortResult<ReviewRequest> {
        self.tables
            .read()
            .await
            .requests
            .get(&request_id)
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Request {} not found", request_id)))
    }

    async fn get_highlights_for_request(&self, request_id: Uuid) -> PortResult<Vec<Highlight>> {
        let tables = self.tables.read().await;
        let live = tables
            .requests
            .get(&request_id)
            .is_some_and(|r| r.deleted_at.is_none());
        if !live {
            return Ok(Vec::new());
        }
        Ok(tables.highlights.get(&request_id).cloned().unwrap_or_default())
    }

    async fn apply_review(
        &self,
        request_id: Uuid,
        reviewed_at: DateTime<Utc>,
        decisions: &[ReviewDecision],
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;

        let mut request = tables
            .requests
            .get(&request_id)
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Request {} not found", request_id)))?;
        if request.reviewed_at.is_some() {
            return Err(PortError::Conflict(format!("Request {} is already reviewed", request_id)));
        }
        request.reviewed_at = Some(reviewed_at);
        let mut highlights = tables.highlights.get(&request_id).cloned().unwrap_or_default();

        let fail_after = self.fail_review_after.swap(NO_FAULT, Ordering::SeqCst);
        for (applied, decision) in decisions.iter().enumerate() {
            if applied == fail_after {
                return Err(PortError::Unexpected(format!(
                    "injected failure after {} highlight update(s)",
                    applied
                )));
            }
            let highlight = highlights
                .iter_mut()
                .find(|h| h.id == decision.highlight_id)
                .ok_or_else(|| PortError::NotFound(format!("Highlight {} not found", decision.highlight_id)))?;
            if highlight.status.is_some() {
                return Err(PortError::Conflict(format!(
                    "Highlight {} already has a decision",
                    highlight.id
                )));
            }
            highlight.status = Some(decision.status);
            highlight.reviewed_at = Some(reviewed_at);
        }

        tables.requests.insert(request_id, request);
        tables.highlights.insert(request_id, highlights);
        Ok(())
    }

    async fn soft_delete_request(&self, request_id: Uuid, deleted_at: DateTime<Utc>) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&request_id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or_else(|| PortError::NotFound(format!("Request {} not found", request_id)))?;
        request.deleted_at = Some(deleted_at);
        // Highlights are only reachable through their request.
        Ok(())
    }
}

/// A `PdfStorageService` backed by a map.
#[derive(Default)]
pub struct MemoryPdfStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryPdfStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl PdfStorageService for MemoryPdfStorage {
    async fn put(&self, name: &str, data: &[u8]) -> PortResult<()> {
        self.blobs.write().await.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> PortResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("PDF {} not found", name)))
    }

    async fn delete(&self, name: &str) -> PortResult<()> {
        self.blobs.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HighlightKind, HighlightStatus};

    fn request() -> ReviewRequest {
        ReviewRequest {
            id: Uuid::new_v4(),
            requester_email: "requester@example.com".into(),
            approver_email: "approver@example.com".into(),
            subject: "Lease".into(),
            pdf_path: "pdf/aa.pdf".into(),
            requested_at: Utc::now(),
            reviewed_at: None,
            deleted_at: None,
        }
    }

    fn highlight(request_id: Uuid) -> Highlight {
        Highlight {
            id: Uuid::new_v4(),
            request_id,
            kind: HighlightKind::Text,
            details: "{}".into(),
            status: None,
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn injected_review_failure_leaves_no_trace() {
        let db = MemoryDb::new();
        let r = request();
        let hs = vec![highlight(r.id), highlight(r.id)];
        db.insert_request(&r, &hs).await.unwrap();

        let decisions: Vec<_> = hs
            .iter()
            .map(|h| ReviewDecision {
                highlight_id: h.id,
                status: HighlightStatus::Approved,
            })
            .collect();
        db.fail_next_review_after(1);
        let err = db.apply_review(r.id, Utc::now(), &decisions).await.unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));

        assert_eq!(db.get_request_by_id(r.id).await.unwrap().reviewed_at, None);
        let stored = db.get_highlights_for_request(r.id).await.unwrap();
        assert!(stored.iter().all(|h| h.status.is_none() && h.reviewed_at.is_none()));

        // The fault is one-shot; the retry goes through.
        db.apply_review(r.id, Utc::now(), &decisions).await.unwrap();
        let stored = db.get_highlights_for_request(r.id).await.unwrap();
        assert!(stored.iter().all(|h| h.status == Some(HighlightStatus::Approved)));
    }

    #[tokio::test]
    async fn second_review_conflicts() {
        let db = MemoryDb::new();
        let r = request();
        db.insert_request(&r, &[]).await.unwrap();
        db.apply_review(r.id, Utc::now(), &[]).await.unwrap();
        let err = db.apply_review(r.id, Utc::now(), &[]).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn highlights_keep_creation_order() {
        let db = MemoryDb::new();
        let r = request();
        let hs: Vec<_> = (0..5).map(|_| highlight(r.id)).collect();
        db.insert_request(&r, &hs).await.unwrap();
        let other = request();
        db.insert_request(&other, &[highlight(other.id)]).await.unwrap();

        let ids: Vec<_> = db
            .get_highlights_for_request(r.id)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, hs.iter().map(|h| h.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn soft_deleted_requests_are_hidden() {
        let db = MemoryDb::new();
        let r = request();
        db.insert_request(&r, &[highlight(r.id), highlight(r.id)]).await.unwrap();
        assert_eq!(db.get_highlights_for_request(r.id).await.unwrap().len(), 2);

        db.soft_delete_request(r.id, Utc::now()).await.unwrap();
        assert!(matches!(
            db.get_request_by_id(r.id).await,
            Err(PortError::NotFound(_))
        ));
        assert!(db.get_highlights_for_request(r.id).await.unwrap().is_empty());
        assert!(db.raw_request(r.id).await.unwrap().deleted_at.is_some());
    }

    #[tokio::test]
    async fn review_touches_only_its_own_request() {
        let db = MemoryDb::new();
        let r = request();
        let h = highlight(r.id);
        db.insert_request(&r, &[h.clone()]).await.unwrap();
        let other = request();
        let other_h = highlight(other.id);
        db.insert_request(&other, &[other_h.clone()]).await.unwrap();

        // A decision naming another request's highlight is not found.
        let stray = [ReviewDecision {
            highlight_id: other_h.id,
            status: HighlightStatus::Rejected,
        }];
        let err = db.apply_review(r.id, Utc::now(), &stray).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert_eq!(db.get_request_by_id(r.id).await.unwrap().reviewed_at, None);

        let decisions = [ReviewDecision {
            highlight_id: h.id,
            status: HighlightStatus::Approved,
        }];
        db.apply_review(r.id, Utc::now(), &decisions).await.unwrap();

        assert_eq!(db.get_request_by_id(other.id).await.unwrap().reviewed_at, None);
        assert_eq!(db.get_highlights_for_request(other.id).await.unwrap(), vec![other_h]);
    }
}

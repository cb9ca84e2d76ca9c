//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::domain::{Highlight, HighlightKind, HighlightStatus, ReviewDecision, ReviewRequest};
use review_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// The `ordinal` column is an INTEGER.
fn ordinal_column(index: usize) -> PortResult<i32> {
    i32::try_from(index).map_err(|_| PortError::Unexpected(format!("highlight ordinal {} is out of range", index)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct RequestRecord {
    id: Uuid,
    requester_email: String,
    approver_email: String,
    subject: String,
    pdf_path: String,
    requested_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}
impl RequestRecord {
    fn to_domain(self) -> ReviewRequest {
        ReviewRequest {
            id: self.id,
            requester_email: self.requester_email,
            approver_email: self.approver_email,
            subject: self.subject,
            pdf_path: self.pdf_path,
            requested_at: self.requested_at,
            reviewed_at: self.reviewed_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(FromRow)]
struct HighlightRecord {
    id: Uuid,
    request_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    details: String,
    status: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}
impl HighlightRecord {
    fn to_domain(self) -> PortResult<Highlight> {
        let kind: HighlightKind = self
            .kind
            .parse()
            .map_err(|e| PortError::Unexpected(format!("highlight {}: {}", self.id, e)))?;
        let status = self
            .status
            .map(|s| s.parse::<HighlightStatus>())
            .transpose()
            .map_err(|e| PortError::Unexpected(format!("highlight {}: {}", self.id, e)))?;
        Ok(Highlight {
            id: self.id,
            request_id: self.request_id,
            kind,
            details: self.details,
            status,
            reviewed_at: self.reviewed_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn insert_request(&self, request: &ReviewRequest, highlights: &[Highlight]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO requests (id, requester_email, approver_email, subject, pdf_path, requested_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(request.id)
        .bind(&request.requester_email)
        .bind(&request.approver_email)
        .bind(&request.subject)
        .bind(&request.pdf_path)
        .bind(request.requested_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Request {} already exists", request.id))
            }
            _ => unexpected(e),
        })?;

        for (index, highlight) in highlights.iter().enumerate() {
            let ordinal = ordinal_column(index)?;
            sqlx::query(
                "INSERT INTO request_highlights (id, request_id, ordinal, type, details)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(highlight.id)
            .bind(request.id)
            .bind(ordinal)
            .bind(highlight.kind.as_str())
            .bind(&highlight.details)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn get_request_by_id(&self, request_id: Uuid) -> PortResult<ReviewRequest> {
        let record = sqlx::query_as::<_, RequestRecord>(
            "SELECT id, requester_email, approver_email, subject, pdf_path, requested_at, reviewed_at, deleted_at
             FROM requests WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Request {} not found", request_id)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_highlights_for_request(&self, request_id: Uuid) -> PortResult<Vec<Highlight>> {
        let records = sqlx::query_as::<_, HighlightRecord>(
            "SELECT id, request_id, type, details, status, reviewed_at
             FROM request_highlights
             WHERE request_id = $1 AND deleted_at IS NULL
             ORDER BY ordinal ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(HighlightRecord::to_domain).collect()
    }

    async fn apply_review(
        &self,
        request_id: Uuid,
        reviewed_at: DateTime<Utc>,
        decisions: &[ReviewDecision],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The conditional update is the guard against a concurrent second review.
        let stamped = sqlx::query(
            "UPDATE requests SET reviewed_at = $2
             WHERE id = $1 AND deleted_at IS NULL AND reviewed_at IS NULL",
        )
        .bind(request_id)
        .bind(reviewed_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if stamped.rows_affected() == 0 {
            return Err(explain_unstamped(&mut tx, request_id).await);
        }

        for decision in decisions {
            let updated = sqlx::query(
                "UPDATE request_highlights SET status = $3, reviewed_at = $4
                 WHERE id = $1 AND request_id = $2 AND status IS NULL",
            )
            .bind(decision.highlight_id)
            .bind(request_id)
            .bind(decision.status.as_str())
            .bind(reviewed_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            if updated.rows_affected() != 1 {
                return Err(PortError::Conflict(format!(
                    "Highlight {} cannot take a decision",
                    decision.highlight_id
                )));
            }
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn soft_delete_request(&self, request_id: Uuid, deleted_at: DateTime<Utc>) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let deleted = sqlx::query("UPDATE requests SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(request_id)
            .bind(deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Request {} not found", request_id)));
        }

        sqlx::query("UPDATE request_highlights SET deleted_at = $2 WHERE request_id = $1 AND deleted_at IS NULL")
            .bind(request_id)
            .bind(deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }
}

/// Tells a missing request apart from one that was reviewed first. The
/// transaction is dropped by the caller, which rolls it back.
async fn explain_unstamped(tx: &mut Transaction<'_, Postgres>, request_id: Uuid) -> PortError {
    let reviewed: Result<Option<Option<DateTime<Utc>>>, sqlx::Error> =
        sqlx::query_scalar("SELECT reviewed_at FROM requests WHERE id = $1 AND deleted_at IS NULL")
            .bind(request_id)
            .fetch_optional(&mut **tx)
            .await;
    match reviewed {
        Ok(Some(Some(_))) => PortError::Conflict(format!("Request {} is already reviewed", request_id)),
        Ok(_) => PortError::NotFound(format!("Request {} not found", request_id)),
        Err(e) => unexpected(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_beyond_the_column_range_are_refused() {
        assert_eq!(ordinal_column(0).unwrap(), 0);
        assert_eq!(ordinal_column(i32::MAX as usize).unwrap(), i32::MAX);
        assert!(matches!(
            ordinal_column(i32::MAX as usize + 1),
            Err(PortError::Unexpected(_))
        ));
    }
}

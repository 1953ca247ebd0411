use crate::error::StoreError;
use crate::models::{DashboardStats, NewSubmission, Submission, SubmissionStatus};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, RwLock};

/// SubmissionRepository Trait
///
/// Defines the abstract contract for all submission persistence. Handlers interact
/// with the data layer through this trait without knowing the specific
/// implementation (Postgres in production, in-memory in tests).
///
/// Every mutation touches exactly one row, so no operation can leave a partial
/// write behind. Store failures are returned as errors: submission persistence
/// fails closed, unlike session resolution.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Persists a validated submission: assigns the id, stamps `submitted_at`,
    /// and starts the record at `status = new` with the capability ungranted.
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError>;

    /// All submissions, newest first. No pagination; volume is bounded by how
    /// many humans fill in a contact form.
    async fn list(&self) -> Result<Vec<Submission>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Submission>, StoreError>;

    /// Updates the workflow status. The first time a record becomes `read` or
    /// `replied` the matching timestamp is stamped; re-setting the same status
    /// later never re-stamps it. Returns `None` for an unknown id.
    async fn set_status(
        &self,
        id: i64,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError>;

    /// The approval transition's write: sets `nsfw_access_approved`, `approved_at`
    /// and `status = approved` together, conditioned on the record still being in
    /// the pre-transition state (compare-and-set, not a blind overwrite). Returns
    /// `None` when the condition did not hold; the caller re-reads to tell the
    /// admin *which* precondition failed.
    async fn approve_nsfw(&self, id: i64) -> Result<Option<Submission>, StoreError>;

    /// Compiles the counters for the administrative dashboard.
    async fn stats(&self) -> Result<DashboardStats, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn SubmissionRepository>;

// Shared column list so every query returns rows in the shape `Submission` expects.
const SUBMISSION_COLUMNS: &str = "id, first_name, last_name, email, mobile_number, gender, \
     birthday, city, state, message, interests, has_nsfw_interest, nsfw_access_approved, \
     status, sms_opt_in, origin_ip, user_agent, submitted_at, read_at, replied_at, approved_at";

/// PostgresRepository
///
/// The concrete implementation of [`SubmissionRepository`] backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for PostgresRepository {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let sql = format!(
            "INSERT INTO submissions (first_name, last_name, email, mobile_number, gender, \
             birthday, city, state, message, interests, has_nsfw_interest, sms_opt_in, \
             origin_ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {SUBMISSION_COLUMNS}"
        );
        sqlx::query_as::<_, Submission>(&sql)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.mobile_number)
            .bind(&new.gender)
            .bind(new.birthday)
            .bind(&new.city)
            .bind(&new.region)
            .bind(&new.message)
            .bind(&new.interests)
            .bind(new.has_nsfw_interest)
            .bind(new.sms_opt_in)
            .bind(&new.origin_ip)
            .bind(&new.user_agent)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("create submission error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn list(&self) -> Result<Vec<Submission>, StoreError> {
        let sql =
            format!("SELECT {SUBMISSION_COLUMNS} FROM submissions ORDER BY submitted_at DESC");
        sqlx::query_as::<_, Submission>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("list submissions error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn get(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1");
        sqlx::query_as::<_, Submission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("get submission error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn set_status(
        &self,
        id: i64,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError> {
        // First-transition stamping happens in the same statement as the status
        // write, so the stamp can never drift from the status it records.
        let sql = format!(
            "UPDATE submissions \
             SET status = $2, \
                 read_at = CASE WHEN $2 = 'read'::submission_status AND read_at IS NULL \
                     THEN NOW() ELSE read_at END, \
                 replied_at = CASE WHEN $2 = 'replied'::submission_status AND replied_at IS NULL \
                     THEN NOW() ELSE replied_at END \
             WHERE id = $1 \
             RETURNING {SUBMISSION_COLUMNS}"
        );
        sqlx::query_as::<_, Submission>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("set status error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn approve_nsfw(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        // The WHERE clause is the compare-and-set: of two concurrent approvals,
        // exactly one matches a row and the other observes zero rows updated.
        let sql = format!(
            "UPDATE submissions \
             SET nsfw_access_approved = TRUE, approved_at = NOW(), \
                 status = 'approved'::submission_status \
             WHERE id = $1 AND has_nsfw_interest AND NOT nsfw_access_approved \
             RETURNING {SUBMISSION_COLUMNS}"
        );
        sqlx::query_as::<_, Submission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("approve nsfw error: {:?}", e);
                StoreError::from(e)
            })
    }

    async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE has_nsfw_interest), \
                    COUNT(*) FILTER (WHERE status = 'new'), \
                    COUNT(*) FILTER (WHERE has_nsfw_interest AND NOT nsfw_access_approved) \
             FROM submissions",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("stats error: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(DashboardStats {
            total_contacts: row.0,
            nsfw_requests: row.1,
            unread: row.2,
            pending_nsfw: row.3,
        })
    }
}

/// InMemoryRepository
///
/// An in-process implementation used for unit and integration testing, mirroring
/// the Postgres semantics (id assignment, first-time stamping, compare-and-set
/// approval) without a database. All mutations happen under one write lock, which
/// gives the same single-row atomicity the SQL statements provide.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<InMemoryInner>,
}

#[derive(Default)]
struct InMemoryInner {
    next_id: i64,
    rows: Vec<Submission>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError("submission store lock poisoned".into())
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn create(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.next_id += 1;
        let submission = Submission {
            id: inner.next_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            mobile_number: new.mobile_number,
            gender: new.gender,
            birthday: new.birthday,
            city: new.city,
            region: new.region,
            message: new.message,
            interests: new.interests,
            has_nsfw_interest: new.has_nsfw_interest,
            nsfw_access_approved: false,
            status: SubmissionStatus::New,
            sms_opt_in: new.sms_opt_in,
            origin_ip: new.origin_ip,
            user_agent: new.user_agent,
            submitted_at: Utc::now(),
            read_at: None,
            replied_at: None,
            approved_at: None,
        };
        inner.rows.push(submission.clone());
        Ok(submission)
    }

    async fn list(&self) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        let mut rows = inner.rows.clone();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn set_status(
        &self,
        id: i64,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let Some(row) = inner.rows.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };
        row.status = status;
        let now = Utc::now();
        if status == SubmissionStatus::Read && row.read_at.is_none() {
            row.read_at = Some(now);
        }
        if status == SubmissionStatus::Replied && row.replied_at.is_none() {
            row.replied_at = Some(now);
        }
        Ok(Some(row.clone()))
    }

    async fn approve_nsfw(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let Some(row) = inner.rows.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };
        if !row.has_nsfw_interest || row.nsfw_access_approved {
            return Ok(None);
        }
        row.nsfw_access_approved = true;
        row.approved_at = Some(Utc::now());
        row.status = SubmissionStatus::Approved;
        Ok(Some(row.clone()))
    }

    async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(DashboardStats {
            total_contacts: inner.rows.len() as i64,
            nsfw_requests: inner.rows.iter().filter(|r| r.has_nsfw_interest).count() as i64,
            unread: inner
                .rows
                .iter()
                .filter(|r| r.status == SubmissionStatus::New)
                .count() as i64,
            pending_nsfw: inner
                .rows
                .iter()
                .filter(|r| r.has_nsfw_interest && !r.nsfw_access_approved)
                .count() as i64,
        })
    }
}

use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use parallax_core::models::{
    compute_priority, Job, JobListQuery, JobStats, JobStatus, RetryDecision,
};
use parallax_core::AppError;

const JOB_COLUMNS: &str = r#"
    id,
    media_id,
    status,
    priority,
    attempts,
    max_attempts,
    last_error,
    queued_at,
    started_at,
    completed_at,
    processing_duration_ms,
    created_at,
    updated_at
"#;

/// Priority-ordered, concurrency-safe queue of processing requests.
///
/// One jobs row per media: a fresh enqueue either inserts the row or revives
/// a failed/cancelled one in place. Claiming uses FOR UPDATE SKIP LOCKED so
/// concurrent claimants never receive the same job.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue processing for a media item.
    ///
    /// Rejects with `AlreadyQueued` while a job for the media is pending,
    /// queued or processing, and with `AlreadyProcessed` once completed.
    /// Failed and cancelled jobs are revived with attempts reset and a fresh
    /// priority. The whole check-and-write is one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn enqueue(&self, media_id: Uuid, max_attempts: i32) -> Result<Job, AppError> {
        let mut tx = self.pool.begin().await?;

        let media_row: Option<(String, i64)> =
            sqlx::query_as("SELECT kind, size_bytes FROM media WHERE id = $1")
                .bind(media_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (kind_str, size_bytes) = media_row
            .ok_or_else(|| AppError::NotFound(format!("media {} not found", media_id)))?;
        let kind = kind_str
            .parse()
            .map_err(|e| AppError::Internal(format!("corrupt media kind: {}", e)))?;
        let priority = compute_priority(kind, size_bytes);

        let existing: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE media_id = $1 FOR UPDATE"
        ))
        .bind(media_id)
        .fetch_optional(&mut *tx)
        .await?;

        let job = match existing {
            None => {
                sqlx::query_as::<Postgres, Job>(&format!(
                    r#"
                    INSERT INTO jobs (media_id, status, priority, max_attempts)
                    VALUES ($1, 'queued', $2, $3)
                    RETURNING {JOB_COLUMNS}
                    "#
                ))
                .bind(media_id)
                .bind(priority)
                .bind(max_attempts)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(job) if job.status.is_active() => {
                return Err(AppError::AlreadyQueued { media_id });
            }
            Some(job) if job.status == JobStatus::Completed => {
                return Err(AppError::AlreadyProcessed { media_id });
            }
            Some(job) if job.status.can_revive() => {
                sqlx::query_as::<Postgres, Job>(&format!(
                    r#"
                    UPDATE jobs
                    SET status = 'queued',
                        priority = $2,
                        attempts = 0,
                        max_attempts = $3,
                        last_error = NULL,
                        queued_at = NOW(),
                        started_at = NULL,
                        completed_at = NULL,
                        processing_duration_ms = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING {JOB_COLUMNS}
                    "#
                ))
                .bind(job.id)
                .bind(priority)
                .bind(max_attempts)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(job) => {
                return Err(AppError::Internal(format!(
                    "job {} in unexpected status {}",
                    job.id, job.status
                )));
            }
        };

        tx.commit().await?;

        tracing::info!(
            job_id = %job.id,
            media_id = %media_id,
            priority = priority,
            "Job enqueued"
        );

        Ok(job)
    }

    /// Atomically claim the next queued job and move it to processing.
    ///
    /// Safe under concurrent claimants: the SKIP LOCKED select guarantees no
    /// two callers ever receive the same row.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next(&self) -> Result<Option<Job>, AppError> {
        let mut tx = self.pool.begin().await?;

        let job: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = 'queued'
            ORDER BY priority ASC, queued_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(job) = job {
            let claimed: Job = sqlx::query_as::<Postgres, Job>(&format!(
                r#"
                UPDATE jobs
                SET status = 'processing',
                    started_at = NOW(),
                    attempts = attempts + 1,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(job.id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;

            tracing::debug!(
                job_id = %claimed.id,
                media_id = %claimed.media_id,
                attempt = claimed.attempts,
                "Job claimed"
            );

            Ok(Some(claimed))
        } else {
            tx.rollback().await.ok();
            Ok(None)
        }
    }

    /// Mark a processing job completed. A no-op when the job is already in a
    /// terminal state, so repeating the call after a worker restart is safe.
    #[tracing::instrument(skip(self))]
    pub async fn mark_completed(
        &self,
        job_id: Uuid,
        duration_ms: i64,
    ) -> Result<Job, AppError> {
        let mut tx = self.pool.begin().await?;

        let job: Job = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))?;

        if job.status.is_terminal() {
            tx.rollback().await.ok();
            return Ok(job);
        }

        let job: Job = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'completed',
                completed_at = NOW(),
                processing_duration_ms = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .bind(duration_ms)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            job_id = %job_id,
            media_id = %job.media_id,
            duration_ms = duration_ms,
            "Job completed"
        );

        Ok(job)
    }

    /// Record a failed attempt. Requeues while attempts remain, otherwise
    /// moves the job to failed. No-op on terminal states.
    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        error: &str,
    ) -> Result<RetryDecision, AppError> {
        let mut tx = self.pool.begin().await?;

        let job: Job = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))?;

        if job.status.is_terminal() {
            tx.rollback().await.ok();
            return Ok(RetryDecision {
                retry: false,
                attempts: job.attempts,
                max_attempts: job.max_attempts,
            });
        }

        let retry = job.can_retry();
        if retry {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'queued',
                    started_at = NULL,
                    last_error = $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    completed_at = NOW(),
                    last_error = $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::warn!(
            job_id = %job_id,
            attempts = job.attempts,
            max_attempts = job.max_attempts,
            retry = retry,
            error = %error,
            "Job attempt failed"
        );

        Ok(RetryDecision {
            retry,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
        })
    }

    /// Fail a job immediately regardless of remaining attempts. Used for
    /// errors that repeating cannot fix (collaborator 4xx, disabled features).
    #[tracing::instrument(skip(self, error))]
    pub async fn fail_permanently(&self, job_id: Uuid, error: &str) -> Result<Job, AppError> {
        let mut tx = self.pool.begin().await?;

        let job: Job = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", job_id)))?;

        if job.status.is_terminal() {
            tx.rollback().await.ok();
            return Ok(job);
        }

        let job: Job = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'failed',
                completed_at = NOW(),
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::error!(job_id = %job_id, error = %error, "Job failed permanently");

        Ok(job)
    }

    /// Cancel a job that has not started processing yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, job_id: Uuid) -> Result<Job, AppError> {
        let cancelled: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'cancelled',
                updated_at = NOW()
            WHERE id = $1
                AND status IN ('pending', 'queued')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        match cancelled {
            Some(job) => {
                tracing::info!(job_id = %job_id, "Job cancelled");
                Ok(job)
            }
            None => match self.get(job_id).await? {
                Some(job) => Err(AppError::Conflict(format!(
                    "job {} is {} and can no longer be cancelled",
                    job_id, job.status
                ))),
                None => Err(AppError::NotFound(format!("job {} not found", job_id))),
            },
        }
    }

    /// Put a failed job back in the queue with a clean slate.
    #[tracing::instrument(skip(self))]
    pub async fn retry_failed(&self, job_id: Uuid) -> Result<Job, AppError> {
        let revived: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'queued',
                attempts = 0,
                last_error = NULL,
                queued_at = NOW(),
                started_at = NULL,
                completed_at = NULL,
                processing_duration_ms = NULL,
                updated_at = NOW()
            WHERE id = $1
                AND status = 'failed'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        match revived {
            Some(job) => {
                tracing::info!(job_id = %job_id, "Job manually retried");
                Ok(job)
            }
            None => match self.get(job_id).await? {
                Some(job) => Err(AppError::Conflict(format!(
                    "job {} is {}, only failed jobs can be retried",
                    job_id, job.status
                ))),
                None => Err(AppError::NotFound(format!("job {} not found", job_id))),
            },
        }
    }

    /// The (single) job row for a media item, if one exists.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_media(&self, media_id: Uuid) -> Result<Option<Job>, AppError> {
        let job: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE media_id = $1"
        ))
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        let job: Option<Job> = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// List jobs, newest first, optionally filtered by status.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, AppError> {
        let limit = query.limit.unwrap_or(50).min(1000);
        let offset = query.offset.unwrap_or(0);

        let jobs = match query.status {
            Some(status) => {
                sqlx::query_as::<Postgres, Job>(&format!(
                    r#"
                    SELECT {JOB_COLUMNS} FROM jobs
                    WHERE status = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(status.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<Postgres, Job>(&format!(
                    r#"
                    SELECT {JOB_COLUMNS} FROM jobs
                    ORDER BY created_at DESC
                    LIMIT $1 OFFSET $2
                    "#
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(jobs)
    }

    /// Aggregated queue statistics.
    #[tracing::instrument(skip(self))]
    pub async fn stats(&self) -> Result<JobStats, AppError> {
        use sqlx::Row;
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'queued') as queued,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') as cancelled
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(JobStats {
            total: row.get::<Option<i64>, _>("total").unwrap_or(0),
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            queued: row.get::<Option<i64>, _>("queued").unwrap_or(0),
            processing: row.get::<Option<i64>, _>("processing").unwrap_or(0),
            completed: row.get::<Option<i64>, _>("completed").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
            cancelled: row.get::<Option<i64>, _>("cancelled").unwrap_or(0),
        })
    }

}

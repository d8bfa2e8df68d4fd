use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of a job row. `Processing` rows only ever move to `Complete` or
/// `Failed`; terminal rows are never mutated back, except that a `Failed` row
/// may be atomically reclaimed to `Processing` for a retry (see
/// [`JobStore::reclaim_failed`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<JobStatus> {
        match raw {
            "processing" => Some(JobStatus::Processing),
            "complete" => Some(JobStatus::Complete),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub file_hash: String,
    pub filename: String,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<FixedOffset>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// Compact row for `/jobs` listings; deliberately excludes the result payload.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub created_at: DateTime<FixedOffset>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// One classified sequence extracted from a completed result document.
/// Everything is optional because the compute worker's schema is not ours to
/// enforce.
#[derive(Debug, Clone, Default)]
pub struct SequenceRow {
    pub accession: Option<String>,
    pub taxonomy: Option<String>,
    pub length: Option<i64>,
    pub confidence: Option<f64>,
    pub overlap: Option<i64>,
    pub cluster: Option<String>,
    pub novelty_score: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row for this fingerprint already exists. Internal race signal only:
    /// callers recover by re-reading, it is never surfaced to clients.
    #[error("a job for this file hash already exists")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for the job cache. The unique `file_hash` index behind
/// `create` is the only concurrency control in the system: of two concurrent
/// identical uploads, exactly one insert wins and the loser gets `Conflict`.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Connectivity probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Cache lookup by fingerprint. No side effects on miss.
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Insert a new `processing` row. Fails with [`StoreError::Conflict`] when
    /// a row for `file_hash` already exists.
    async fn create(&self, file_hash: &str, filename: &str) -> Result<Uuid, StoreError>;

    /// Flip a `failed` row back to `processing` for a retry, clearing its
    /// result and completion stamp. Returns `false` when the row was not in
    /// `failed` state any more, i.e. another request won the retry race.
    async fn reclaim_failed(&self, job_id: Uuid) -> Result<bool, StoreError>;

    /// Mark a job `complete` and attach its result. Call at most once per job.
    async fn complete(&self, job_id: Uuid, result: &serde_json::Value) -> Result<(), StoreError>;

    /// Mark a job `failed`. Callers swallow errors from this: failure
    /// bookkeeping must never mask the original processing error.
    async fn fail(&self, job_id: Uuid) -> Result<(), StoreError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    /// Most-recently-created first.
    async fn list_recent(&self, limit: u64) -> Result<Vec<JobSummary>, StoreError>;

    /// Best-effort denormalized sequence rows for a completed job.
    async fn store_sequences(&self, job_id: Uuid, rows: &[SequenceRow]) -> Result<(), StoreError>;

    /// Best-effort per-job aggregate metadata.
    async fn store_sample(
        &self,
        job_id: Uuid,
        metadata: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Taxonomy strings of a job's sequences, input for the visualization
    /// projections.
    async fn sequence_taxonomies(&self, job_id: Uuid) -> Result<Vec<String>, StoreError>;
}

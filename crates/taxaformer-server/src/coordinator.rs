use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::compute::{ComputeError, ComputeWorker};
use crate::fingerprint::fingerprint;
use crate::store::{JobStatus, JobStore, SequenceRow, StoreError};

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["fasta", "fa", "fna", "fastq", "fq", "txt"];

#[derive(Debug)]
pub enum SubmitOutcome {
    /// A completed job for this fingerprint already existed; no compute call.
    Cached {
        job_id: Uuid,
        result: serde_json::Value,
    },
    /// Another request is already processing this fingerprint; no duplicate
    /// job, no compute call.
    InProgress { job_id: Uuid },
    /// Freshly computed. `job_id` is `None` when persistence is disabled or
    /// was unreachable for this request.
    Fresh {
        job_id: Option<Uuid>,
        result: serde_json::Value,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("unsupported file type; allowed: .fasta, .fa, .fna, .fastq, .fq, .txt")]
    UnsupportedType,
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

pub fn allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Temp file holding the upload for the duration of the compute call. The
/// `Drop` impl guarantees cleanup on every exit path, including errors.
struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    async fn stage(bytes: &[u8]) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("taxaformer-{}.upload", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

enum Claim {
    /// The store already answers this submission; no compute call needed.
    Settled(SubmitOutcome),
    /// This request owns the `processing` row and must run the compute call.
    Won(Uuid),
}

/// Composes fingerprinting, the job cache and the compute worker into the one
/// idempotent `submit` operation. Holds no locks of its own: correctness under
/// concurrent identical uploads rests entirely on the store's unique
/// constraint on `file_hash`.
pub struct AnalysisCoordinator {
    store: Option<Arc<dyn JobStore>>,
    worker: Arc<dyn ComputeWorker>,
}

impl AnalysisCoordinator {
    pub fn new(store: Option<Arc<dyn JobStore>>, worker: Arc<dyn ComputeWorker>) -> Self {
        Self { store, worker }
    }

    pub async fn submit(
        &self,
        bytes: &[u8],
        filename: &str,
        user_metadata: Option<serde_json::Value>,
    ) -> Result<SubmitOutcome, SubmitError> {
        // Reject before hashing or touching the store.
        if !allowed_extension(filename) {
            return Err(SubmitError::UnsupportedType);
        }

        let file_hash = fingerprint(bytes);

        // Storage trouble downgrades the request to uncached rather than
        // failing it; the compute result still reaches the caller.
        let job_id = match &self.store {
            None => None,
            Some(store) => match self.claim(store.as_ref(), &file_hash, filename).await {
                Ok(Claim::Settled(outcome)) => return Ok(outcome),
                Ok(Claim::Won(job_id)) => Some(job_id),
                Err(e) => {
                    tracing::warn!(%file_hash, error = %e, "job store unavailable, running uncached");
                    None
                }
            },
        };

        match self.run_compute(bytes, filename, user_metadata).await {
            Ok(result) => {
                if let (Some(store), Some(job_id)) = (&self.store, job_id) {
                    self.persist_success(store.as_ref(), job_id, &result).await;
                }
                Ok(SubmitOutcome::Fresh { job_id, result })
            }
            Err(e) => {
                if let (Some(store), Some(job_id)) = (&self.store, job_id) {
                    // Swallowed unconditionally: bookkeeping must not mask the
                    // compute error we are about to surface.
                    if let Err(store_err) = store.fail(job_id).await {
                        tracing::warn!(%job_id, error = %store_err, "failed to mark job as failed");
                    }
                }
                Err(SubmitError::Compute(e))
            }
        }
    }

    /// Read-and-branch on the existing row, or insert a fresh `processing`
    /// row. Loops only when another request mutates the row between our read
    /// and write; each retry re-reads, so compute never runs twice for one
    /// fingerprint.
    async fn claim(
        &self,
        store: &dyn JobStore,
        file_hash: &str,
        filename: &str,
    ) -> Result<Claim, StoreError> {
        for _ in 0..4 {
            match store.find_by_hash(file_hash).await? {
                Some(job) => match job.status {
                    JobStatus::Complete => {
                        let result = job.result.ok_or_else(|| {
                            StoreError::Unavailable(format!(
                                "completed job {} has no result",
                                job.job_id
                            ))
                        })?;
                        tracing::info!(job_id = %job.job_id, %file_hash, "cache hit");
                        return Ok(Claim::Settled(SubmitOutcome::Cached {
                            job_id: job.job_id,
                            result,
                        }));
                    }
                    JobStatus::Processing => {
                        return Ok(Claim::Settled(SubmitOutcome::InProgress {
                            job_id: job.job_id,
                        }));
                    }
                    JobStatus::Failed => {
                        // Retry reuses the row; the conditional update is the
                        // race arbiter, a loser re-reads.
                        if store.reclaim_failed(job.job_id).await? {
                            tracing::info!(job_id = %job.job_id, "retrying previously failed job");
                            return Ok(Claim::Won(job.job_id));
                        }
                    }
                },
                None => match store.create(file_hash, filename).await {
                    Ok(job_id) => {
                        tracing::info!(%job_id, %file_hash, "created processing job");
                        return Ok(Claim::Won(job_id));
                    }
                    // Lost the insert race; re-read and branch on the winner's row.
                    Err(StoreError::Conflict) => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Err(StoreError::Unavailable(
            "gave up claiming job after repeated races".to_string(),
        ))
    }

    async fn run_compute(
        &self,
        bytes: &[u8],
        filename: &str,
        user_metadata: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ComputeError> {
        let staged = StagedUpload::stage(bytes).await?;

        let started = Instant::now();
        let mut result = self.worker.analyze(staged.path(), filename).await?;
        stamp_metadata(&mut result, started.elapsed().as_secs_f64(), user_metadata);
        Ok(result)
    }

    /// All storage here is best-effort: the caller gets their result whether
    /// or not persistence worked.
    async fn persist_success(
        &self,
        store: &dyn JobStore,
        job_id: Uuid,
        result: &serde_json::Value,
    ) {
        if let Err(e) = store.complete(job_id, result).await {
            tracing::warn!(%job_id, error = %e, "failed to store analysis result");
            return;
        }

        let rows = sequence_rows(result);
        if !rows.is_empty() {
            if let Err(e) = store.store_sequences(job_id, &rows).await {
                tracing::warn!(%job_id, error = %e, "failed to store sequence rows");
            }
        }
        if let Some(metadata) = result.get("metadata") {
            if let Err(e) = store.store_sample(job_id, metadata).await {
                tracing::warn!(%job_id, error = %e, "failed to store sample metadata");
            }
        }
    }
}

/// Stamp processing time (and caller metadata, passed through opaquely) into
/// the document's `metadata` object, mirroring what the worker reports.
fn stamp_metadata(
    doc: &mut serde_json::Value,
    elapsed_secs: f64,
    user_metadata: Option<serde_json::Value>,
) {
    let stamp = serde_json::Value::String(format!("{elapsed_secs:.2}s"));

    if let Some(meta) = doc.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.insert("processingTime".to_string(), stamp);
        if let Some(user) = user_metadata {
            meta.insert("userMetadata".to_string(), user);
        }
        return;
    }

    // No metadata object in the document: only synthesize one when the caller
    // actually supplied metadata to carry.
    if let Some(user) = user_metadata {
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "metadata".to_string(),
                serde_json::json!({
                    "processingTime": stamp,
                    "userMetadata": user,
                }),
            );
        }
    }
}

fn sequence_rows(result: &serde_json::Value) -> Vec<SequenceRow> {
    let Some(seqs) = result.get("sequences").and_then(|s| s.as_array()) else {
        return Vec::new();
    };
    seqs.iter()
        .map(|s| SequenceRow {
            accession: s.get("accession").and_then(|v| v.as_str()).map(str::to_string),
            taxonomy: s.get("taxonomy").and_then(|v| v.as_str()).map(str::to_string),
            length: s.get("length").and_then(|v| v.as_i64()),
            confidence: s.get("confidence").and_then(|v| v.as_f64()),
            overlap: s.get("overlap").and_then(|v| v.as_i64()),
            cluster: s.get("cluster").and_then(|v| v.as_str()).map(str::to_string),
            novelty_score: s.get("novelty_score").and_then(|v| v.as_f64()),
            status: s.get("status").and_then(|v| v.as_str()).map(str::to_string),
        })
        .collect()
}

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn json_error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

fn store_error(e: StoreError) -> Response {
    json_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    limit: Option<u64>,
}

/// `GET /jobs?limit=N`: recent job summaries, most recent first.
pub async fn list_jobs(State(state): State<AppState>, Query(query): Query<JobsQuery>) -> Response {
    let Some(store) = &state.store else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "database not available");
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match store.list_recent(limit).await {
        Ok(jobs) => Json(json!({ "jobs": jobs })).into_response(),
        Err(e) => store_error(e),
    }
}

/// `GET /jobs/{job_id}`: full job record, result payload included.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    let Some(store) = &state.store else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "database not available");
    };

    match store.get(job_id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "job not found"),
        Err(e) => store_error(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compute::{ComputeWorker, FixtureWorker};
    use crate::coordinator::AnalysisCoordinator;
    use crate::store::{JobRecord, JobStatus, JobStore, JobSummary, SequenceRow, StoreError};

    /// Read-only store double seeded with a fixed set of job rows.
    struct SeededJobStore {
        rows: Vec<JobRecord>,
    }

    #[async_trait::async_trait]
    impl JobStore for SeededJobStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_by_hash(&self, file_hash: &str) -> Result<Option<JobRecord>, StoreError> {
            Ok(self.rows.iter().find(|j| j.file_hash == file_hash).cloned())
        }

        async fn create(&self, _file_hash: &str, _filename: &str) -> Result<Uuid, StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }

        async fn reclaim_failed(&self, _job_id: Uuid) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn complete(
            &self,
            _job_id: Uuid,
            _result: &serde_json::Value,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fail(&self, _job_id: Uuid) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
            Ok(self.rows.iter().find(|j| j.job_id == job_id).cloned())
        }

        async fn list_recent(&self, limit: u64) -> Result<Vec<JobSummary>, StoreError> {
            let mut rows = self.rows.clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows
                .into_iter()
                .take(limit as usize)
                .map(|j| JobSummary {
                    job_id: j.job_id,
                    filename: j.filename,
                    status: j.status,
                    created_at: j.created_at,
                    completed_at: j.completed_at,
                })
                .collect())
        }

        async fn store_sequences(
            &self,
            _job_id: Uuid,
            _rows: &[SequenceRow],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn store_sample(
            &self,
            _job_id: Uuid,
            _metadata: &serde_json::Value,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn sequence_taxonomies(&self, _job_id: Uuid) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn state_with(store: Option<Arc<dyn JobStore>>) -> AppState {
        let worker: Arc<dyn ComputeWorker> = Arc::new(FixtureWorker);
        AppState {
            coordinator: Arc::new(AnalysisCoordinator::new(store.clone(), worker.clone())),
            store,
            worker,
        }
    }

    fn record(filename: &str, age_secs: i64) -> JobRecord {
        JobRecord {
            job_id: Uuid::new_v4(),
            file_hash: format!("hash-of-{filename}"),
            filename: filename.to_string(),
            status: JobStatus::Complete,
            result: Some(serde_json::json!({"sequences": []})),
            created_at: (chrono::Utc::now() - chrono::Duration::seconds(age_secs)).into(),
            completed_at: Some(chrono::Utc::now().into()),
        }
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_jobs_without_store_is_service_unavailable() {
        let state = state_with(None);
        let resp = list_jobs(State(state), Query(JobsQuery { limit: None })).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "database not available");
    }

    #[tokio::test]
    async fn get_job_without_store_is_service_unavailable() {
        let state = state_with(None);
        let resp = get_job(State(state), Path(Uuid::new_v4())).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = Arc::new(SeededJobStore {
            rows: vec![record("reads.fasta", 0)],
        });
        let state = state_with(Some(store));
        let resp = get_job(State(state), Path(Uuid::new_v4())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "job not found");
    }

    #[tokio::test]
    async fn get_job_returns_full_record() {
        let row = record("reads.fasta", 0);
        let job_id = row.job_id;
        let state = state_with(Some(Arc::new(SeededJobStore { rows: vec![row] })));

        let resp = get_job(State(state), Path(job_id)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["job_id"], serde_json::json!(job_id));
        assert_eq!(body["status"], "complete");
        assert!(body["result"].is_object());
    }

    #[tokio::test]
    async fn list_jobs_is_most_recent_first_without_payloads() {
        let state = state_with(Some(Arc::new(SeededJobStore {
            rows: vec![record("old.fasta", 60), record("new.fasta", 0)],
        })));

        let resp = list_jobs(State(state), Query(JobsQuery { limit: None })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let jobs = body["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0]["filename"], "new.fasta");
        assert_eq!(jobs[1]["filename"], "old.fasta");
        // Summaries never carry the result document.
        assert!(jobs[0].get("result").is_none());
    }
}

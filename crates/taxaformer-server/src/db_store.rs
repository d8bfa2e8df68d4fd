use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::prelude::Expr;
use taxaformer_db::entities::{analysis_jobs, samples, sequences};
use uuid::Uuid;

use crate::store::{JobRecord, JobStatus, JobStore, JobSummary, SequenceRow, StoreError};

/// [`JobStore`] backed by Postgres through sea-orm. The unique index on
/// `analysis_jobs.file_hash` does the concurrency arbitration.
pub struct DbJobStore {
    db: Arc<DatabaseConnection>,
}

impl DbJobStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn unavailable(e: sea_orm::DbErr) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn record_from_model(m: analysis_jobs::Model) -> Result<JobRecord, StoreError> {
    let status = JobStatus::parse(&m.status).ok_or_else(|| {
        StoreError::Unavailable(format!("job {} has unexpected status {:?}", m.job_id, m.status))
    })?;
    Ok(JobRecord {
        job_id: m.job_id,
        file_hash: m.file_hash,
        filename: m.filename,
        status,
        result: m.result,
        created_at: m.created_at,
        completed_at: m.completed_at,
    })
}

#[async_trait::async_trait]
impl JobStore for DbJobStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await.map_err(unavailable)
    }

    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = analysis_jobs::Entity::find()
            .filter(analysis_jobs::Column::FileHash.eq(file_hash))
            .one(&*self.db)
            .await
            .map_err(unavailable)?;
        row.map(record_from_model).transpose()
    }

    async fn create(&self, file_hash: &str, filename: &str) -> Result<Uuid, StoreError> {
        let job_id = Uuid::new_v4();
        let model = analysis_jobs::ActiveModel {
            job_id: Set(job_id),
            file_hash: Set(file_hash.to_string()),
            filename: Set(filename.to_string()),
            status: Set(JobStatus::Processing.as_str().to_string()),
            result: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            completed_at: Set(None),
        };

        // ON CONFLICT DO NOTHING + zero rows affected doubles as conflict
        // detection without parsing driver error strings.
        let inserted = analysis_jobs::Entity::insert(model)
            .on_conflict(
                OnConflict::column(analysis_jobs::Column::FileHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await
            .map_err(unavailable)?;

        if inserted == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(job_id)
    }

    async fn reclaim_failed(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let res = analysis_jobs::Entity::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Processing.as_str()),
            )
            .col_expr(analysis_jobs::Column::Result, Expr::value(Option::<serde_json::Value>::None))
            .col_expr(
                analysis_jobs::Column::CompletedAt,
                Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
            )
            .col_expr(analysis_jobs::Column::CreatedAt, Expr::value(chrono::Utc::now()))
            .filter(analysis_jobs::Column::JobId.eq(job_id))
            .filter(analysis_jobs::Column::Status.eq(JobStatus::Failed.as_str()))
            .exec(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(res.rows_affected == 1)
    }

    async fn complete(&self, job_id: Uuid, result: &serde_json::Value) -> Result<(), StoreError> {
        analysis_jobs::Entity::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Complete.as_str()),
            )
            .col_expr(analysis_jobs::Column::Result, Expr::value(result.clone()))
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(chrono::Utc::now()))
            .filter(analysis_jobs::Column::JobId.eq(job_id))
            .exec(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid) -> Result<(), StoreError> {
        analysis_jobs::Entity::update_many()
            .col_expr(
                analysis_jobs::Column::Status,
                Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(analysis_jobs::Column::CompletedAt, Expr::value(chrono::Utc::now()))
            .filter(analysis_jobs::Column::JobId.eq(job_id))
            .exec(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let row = analysis_jobs::Entity::find_by_id(job_id)
            .one(&*self.db)
            .await
            .map_err(unavailable)?;
        row.map(record_from_model).transpose()
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<JobSummary>, StoreError> {
        type SummaryTuple = (
            Uuid,
            String,
            String,
            chrono::DateTime<chrono::FixedOffset>,
            Option<chrono::DateTime<chrono::FixedOffset>>,
        );

        // Summaries deliberately skip the result payload, so select only the
        // columns we return.
        let rows: Vec<SummaryTuple> = analysis_jobs::Entity::find()
            .select_only()
            .column(analysis_jobs::Column::JobId)
            .column(analysis_jobs::Column::Filename)
            .column(analysis_jobs::Column::Status)
            .column(analysis_jobs::Column::CreatedAt)
            .column(analysis_jobs::Column::CompletedAt)
            .order_by_desc(analysis_jobs::Column::CreatedAt)
            .limit(limit)
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(unavailable)?;

        rows.into_iter()
            .map(|(job_id, filename, status, created_at, completed_at)| {
                let status = JobStatus::parse(&status).ok_or_else(|| {
                    StoreError::Unavailable(format!(
                        "job {job_id} has unexpected status {status:?}"
                    ))
                })?;
                Ok(JobSummary {
                    job_id,
                    filename,
                    status,
                    created_at,
                    completed_at,
                })
            })
            .collect()
    }

    async fn store_sequences(&self, job_id: Uuid, rows: &[SequenceRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let models = rows.iter().map(|r| sequences::ActiveModel {
            id: Set(Uuid::new_v4()),
            job_id: Set(job_id),
            accession: Set(r.accession.clone()),
            taxonomy: Set(r.taxonomy.clone()),
            length: Set(r.length),
            confidence: Set(r.confidence),
            overlap: Set(r.overlap),
            cluster: Set(r.cluster.clone()),
            novelty_score: Set(r.novelty_score),
            status: Set(r.status.clone()),
        });

        sequences::Entity::insert_many(models)
            .exec(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn store_sample(
        &self,
        job_id: Uuid,
        metadata: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let model = samples::ActiveModel {
            id: Set(Uuid::new_v4()),
            job_id: Set(job_id),
            sample_name: Set(metadata
                .get("sampleName")
                .and_then(|v| v.as_str())
                .map(str::to_string)),
            total_sequences: Set(metadata.get("totalSequences").and_then(|v| v.as_i64())),
            processing_time: Set(metadata
                .get("processingTime")
                .and_then(|v| v.as_str())
                .map(str::to_string)),
            avg_confidence: Set(metadata.get("avgConfidence").and_then(|v| v.as_f64())),
        };

        samples::Entity::insert(model)
            .exec(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn sequence_taxonomies(&self, job_id: Uuid) -> Result<Vec<String>, StoreError> {
        let rows: Vec<Option<String>> = sequences::Entity::find()
            .select_only()
            .column(sequences::Column::Taxonomy)
            .filter(sequences::Column::JobId.eq(job_id))
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().flatten().collect())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisJobs::JobId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisJobs::FileHash).string().not_null())
                    .col(ColumnDef::new(AnalysisJobs::Filename).string().not_null())
                    .col(ColumnDef::new(AnalysisJobs::Status).string().not_null())
                    .col(ColumnDef::new(AnalysisJobs::Result).json_binary().null())
                    .col(
                        ColumnDef::new(AnalysisJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The unique index is the idempotency arbiter for concurrent uploads
        // of the same file; the insert path relies on it.
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_file_hash")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::FileHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_created_at")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_analysis_jobs_created_at")
                    .table(AnalysisJobs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_analysis_jobs_file_hash")
                    .table(AnalysisJobs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AnalysisJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AnalysisJobs {
    Table,
    JobId,
    FileHash,
    Filename,
    Status,
    Result,
    CreatedAt,
    CompletedAt,
}

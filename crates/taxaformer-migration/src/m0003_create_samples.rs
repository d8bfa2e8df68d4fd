use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Samples::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Samples::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Samples::JobId).uuid().not_null())
                    .col(ColumnDef::new(Samples::SampleName).string().null())
                    .col(ColumnDef::new(Samples::TotalSequences).big_integer().null())
                    .col(ColumnDef::new(Samples::ProcessingTime).string().null())
                    .col(ColumnDef::new(Samples::AvgConfidence).double().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_samples_job_id")
                    .table(Samples::Table)
                    .col(Samples::JobId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_samples_job_id")
                    .table(Samples::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Samples::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Samples {
    Table,
    Id,
    JobId,
    SampleName,
    TotalSequences,
    ProcessingTime,
    AvgConfidence,
}

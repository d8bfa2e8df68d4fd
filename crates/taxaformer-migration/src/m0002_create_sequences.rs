use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sequences::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sequences::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sequences::JobId).uuid().not_null())
                    .col(ColumnDef::new(Sequences::Accession).string().null())
                    .col(ColumnDef::new(Sequences::Taxonomy).text().null())
                    .col(ColumnDef::new(Sequences::Length).big_integer().null())
                    .col(ColumnDef::new(Sequences::Confidence).double().null())
                    .col(ColumnDef::new(Sequences::Overlap).big_integer().null())
                    .col(ColumnDef::new(Sequences::Cluster).string().null())
                    .col(ColumnDef::new(Sequences::NoveltyScore).double().null())
                    .col(ColumnDef::new(Sequences::Status).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sequences_job_id")
                    .table(Sequences::Table)
                    .col(Sequences::JobId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sequences_job_id")
                    .table(Sequences::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Sequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sequences {
    Table,
    Id,
    JobId,
    Accession,
    Taxonomy,
    Length,
    Confidence,
    Overlap,
    Cluster,
    NoveltyScore,
    Status,
}

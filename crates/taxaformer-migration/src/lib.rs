use sea_orm_migration::prelude::*;

mod m0001_create_analysis_jobs;
mod m0002_create_sequences;
mod m0003_create_samples;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_analysis_jobs::Migration),
            Box::new(m0002_create_sequences::Migration),
            Box::new(m0003_create_samples::Migration),
        ]
    }
}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sequences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub accession: Option<String>,
    pub taxonomy: Option<String>,
    pub length: Option<i64>,
    pub confidence: Option<f64>,
    pub overlap: Option<i64>,
    pub cluster: Option<String>,
    pub novelty_score: Option<f64>,
    pub status: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

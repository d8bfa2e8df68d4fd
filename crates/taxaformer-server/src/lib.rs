pub mod analyze;
pub mod compute;
pub mod config;
pub mod coordinator;
pub mod db_store;
pub mod fingerprint;
pub mod jobs;
pub mod state;
pub mod store;
pub mod visualizations;

pub mod analysis_jobs;
pub mod samples;
pub mod sequences;

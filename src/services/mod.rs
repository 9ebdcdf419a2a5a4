pub mod ai;
pub mod batches;
pub mod checkpoint;
pub mod config;
pub mod consolidate;
pub mod driver;
pub mod encoding;
pub mod pipeline;
pub mod reports;
pub mod response;
pub mod run_id;
pub mod score;
pub mod store;

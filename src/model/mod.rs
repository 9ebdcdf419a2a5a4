pub mod batch;
pub mod classification;
pub mod config;
pub mod report;

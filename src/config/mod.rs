// src/config/mod.rs
pub mod report;

pub use report::{NarrativeConfig, ReportConfig, SourcesConfig};

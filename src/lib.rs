pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod heatmap;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod overview;
pub mod parser;
pub mod report;
pub mod taxonomy;
pub mod timeline;

use crate::config::EngineConfig;
use crate::error::ReportError;
use crate::model::{EventTable, NormalizationReport};

/// Parse then normalize one document.
pub fn load_match(xml: &str, cfg: &EngineConfig) -> Result<(EventTable, NormalizationReport), ReportError> {
    let records = parser::parse_events(xml)?;
    let loaded = normalize::normalize(&records, cfg)?;
    Ok(loaded)
}

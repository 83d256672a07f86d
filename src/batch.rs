use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::InsufficientDataError;
use crate::metrics::{self, Selection, Subject};
use crate::model::{EventTable, NormalizedEvent};
use crate::report::{self, PlayerReport};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub selection: Selection,
    pub error: InsufficientDataError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<PlayerReport>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.reports.is_empty()
    }
}

/// Stats plus panels for one selection.
pub fn build_report(
    table: &EventTable,
    selection: &Selection,
    cfg: &EngineConfig,
) -> Result<PlayerReport, InsufficientDataError> {
    let bundle = metrics::compute(table, selection, cfg)?;
    let subject = Subject::resolve(table, selection)?;
    let events: Vec<&NormalizedEvent> = table.events.iter().filter(|e| subject.includes(e)).collect();
    Ok(report::build_player_report(bundle, &events, cfg))
}

/// Computes every selection against the shared table. Results keep request order and a
/// failing selection never aborts the others.
pub fn run_batch(table: &EventTable, selections: &[Selection], cfg: &EngineConfig) -> BatchOutcome {
    let results: Vec<Result<PlayerReport, BatchFailure>> = with_report_pool(cfg.report_threads, || {
        selections
            .par_iter()
            .map(|selection| {
                build_report(table, selection, cfg).map_err(|error| BatchFailure {
                    selection: selection.clone(),
                    error,
                })
            })
            .collect()
    });

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(failure) => {
                log::warn!(
                    "{}: {}",
                    failure.selection.describe(),
                    failure.error.user_message()
                );
                outcome.failures.push(failure);
            }
        }
    }
    log::info!(
        "Built {} reports ({} failed)",
        outcome.reports.len(),
        outcome.failures.len()
    );
    outcome
}

fn with_report_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 32))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

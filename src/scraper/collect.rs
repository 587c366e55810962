//! Partial-results collection
//!
//! A stage that issues many independent requests keeps every success and
//! records each failure with a label, so one bad page or vacancy never sinks
//! the rest. Cancellation is the only error that stops the stage.

use crate::{HarvestError, Result};
use std::future::Future;

/// One failed unit of work
#[derive(Debug)]
pub struct Failure {
    pub label: String,
    pub error: HarvestError,
}

/// Successes and failures of a stage
#[derive(Debug)]
pub struct Partial<T> {
    pub items: Vec<T>,
    pub failures: Vec<Failure>,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Partial<Vec<T>> {
    /// Concatenates per-unit item lists, keeping the failures
    pub fn flatten(self) -> Partial<T> {
        Partial {
            items: self.items.into_iter().flatten().collect(),
            failures: self.failures,
        }
    }
}

/// Awaits each task in order, keeping successes and labelled failures
///
/// Returns `Err(HarvestError::Cancelled)` as soon as a task reports
/// cancellation; tasks after it are never polled.
pub async fn collect_partial<I, L, F, T>(tasks: I) -> Result<Partial<T>>
where
    I: IntoIterator<Item = (L, F)>,
    L: Into<String>,
    F: Future<Output = Result<T>>,
{
    let mut partial = Partial::default();

    for (label, task) in tasks {
        match task.await {
            Ok(item) => partial.items.push(item),
            Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
            Err(error) => partial.failures.push(Failure {
                label: label.into(),
                error,
            }),
        }
    }

    Ok(partial)
}

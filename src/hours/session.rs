use super::aggregate::{aggregate, AggregateRequest};
use crate::error::{HoursError, Result};
use crate::git::CommitSource;
use crate::model::ResultMatrix;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one in-flight aggregation.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Keeps only the newest aggregation alive.
///
/// Starting a request cancels the one before it, and a result that finishes
/// after being superseded is discarded instead of returned.
#[derive(Debug, Default)]
pub struct RequestTracker {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        debug!(generation, "request started");
        Ticket { generation, token }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Passes `matrix` through only if `ticket` is still the newest request.
    pub fn accept(&self, ticket: &Ticket, matrix: ResultMatrix) -> Result<ResultMatrix> {
        if self.is_current(ticket) && !ticket.token.is_cancelled() {
            Ok(matrix)
        } else {
            debug!(generation = ticket.generation, "discarding stale result");
            Err(HoursError::Superseded)
        }
    }

    /// Runs `request` as the newest request.
    pub async fn run<S: CommitSource + 'static>(
        &self,
        source: Arc<S>,
        request: &AggregateRequest,
        progress: Option<ProgressBar>,
    ) -> Result<ResultMatrix> {
        let ticket = self.begin();
        match aggregate(source, request, ticket.token.clone(), progress).await {
            Ok(matrix) => self.accept(&ticket, matrix),
            Err(HoursError::Cancelled) if !self.is_current(&ticket) => Err(HoursError::Superseded),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeWindow;
    use std::collections::BTreeMap;

    fn empty_matrix() -> ResultMatrix {
        ResultMatrix {
            window: TimeWindow::day(crate::util::today()).unwrap(),
            author: "Ada".to_string(),
            repositories: BTreeMap::new(),
        }
    }

    #[test]
    fn newer_request_cancels_older() {
        let tracker = RequestTracker::new();
        let first = tracker.begin();
        let second = tracker.begin();

        assert!(first.token().is_cancelled());
        assert!(!second.token().is_cancelled());
        assert!(!tracker.is_current(&first));
        assert!(tracker.is_current(&second));
        assert_eq!(second.generation(), first.generation() + 1);
    }

    #[test]
    fn stale_results_are_discarded() {
        let tracker = RequestTracker::new();
        let stale = tracker.begin();
        let fresh = tracker.begin();

        assert!(matches!(tracker.accept(&stale, empty_matrix()), Err(HoursError::Superseded)));
        assert!(tracker.accept(&fresh, empty_matrix()).is_ok());
    }
}

use super::{estimate, rounding, summarize};
use crate::error::{HoursError, Result};
use crate::git::{discover_repositories, CommitSource, RepositoryRef};
use crate::model::{CommitEvent, EstimationConfig, RepositoryResult, ResultMatrix, TimeWindow};
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything one aggregation needs besides the commit source.
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub root: PathBuf,
    /// Author filter; `None` means identity could not be resolved.
    pub identity: Option<String>,
    pub window: TimeWindow,
    pub config: EstimationConfig,
    /// 0 picks min(repository count, CPU count).
    pub workers: usize,
    pub fetch_timeout: Option<Duration>,
}

impl AggregateRequest {
    pub fn new(root: impl Into<PathBuf>, identity: Option<String>, window: TimeWindow, config: EstimationConfig) -> Self {
        Self {
            root: root.into(),
            identity,
            window,
            config,
            workers: 0,
            fetch_timeout: None,
        }
    }
}

fn worker_count(requested: usize, repositories: usize) -> usize {
    let cap = if requested == 0 { num_cpus::get() } else { requested };
    cap.min(repositories).max(1)
}

/// Scans `request.root`, fetches every repository's commits on a bounded
/// worker pool and assembles the repository x date matrix.
///
/// Identity and window problems fail the whole request before any scan; a
/// repository whose fetch fails or times out is left out with a warning.
pub async fn aggregate<S: CommitSource + 'static>(
    source: Arc<S>,
    request: &AggregateRequest,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
) -> Result<ResultMatrix> {
    let author = request
        .identity
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(HoursError::IdentityNotConfigured)?
        .to_string();
    request.window.validate()?;

    let start_time = Instant::now();
    let repositories = {
        let source = Arc::clone(&source);
        let root = request.root.clone();
        spawn_blocking(move || discover_repositories(source.as_ref(), &root))
            .await
            .map_err(|e| HoursError::Task(e.to_string()))??
    };
    info!(root = %request.root.display(), repositories = repositories.len(), "discovered repositories");
    if let Some(pb) = &progress {
        pb.set_length(repositories.len() as u64);
    }

    let max_tasks = worker_count(request.workers, repositories.len());
    let semaphore = Arc::new(Semaphore::new(max_tasks));
    let mut handles = Vec::with_capacity(repositories.len());

    for repository in repositories {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(HoursError::Cancelled),
            permit = Arc::clone(&semaphore).acquire_owned() => permit
                .map_err(|e| HoursError::Task(format!("Failed to acquire semaphore: {e}")))?,
        };

        let source = Arc::clone(&source);
        let window = request.window.clone();
        let author = author.clone();
        let token = cancel.child_token();
        let timeout = request.fetch_timeout;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let outcome = fetch_one(source, &repository, window, author, token, timeout).await;
            (repository, outcome)
        });
        handles.push(handle);
    }

    let mut fetched: Vec<(String, Vec<CommitEvent>)> = Vec::with_capacity(handles.len());
    for handle in handles {
        let (repository, outcome) = tokio::select! {
            _ = cancel.cancelled() => return Err(HoursError::Cancelled),
            joined = handle => joined.map_err(|e| HoursError::Task(e.to_string()))?,
        };
        if let Some(pb) = &progress {
            pb.inc(1);
            pb.set_message(repository.name.clone());
        }
        match outcome {
            Ok(events) => fetched.push((repository.name, events)),
            Err(HoursError::Cancelled) => return Err(HoursError::Cancelled),
            Err(e) => {
                warn!(repository = %repository.path.display(), error = %e, "skipping repository");
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(HoursError::Cancelled);
    }

    let matrix = build_matrix(&request.window, &author, fetched, &request.config);
    debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        workers = max_tasks,
        rows = matrix.repositories.len(),
        "aggregation finished"
    );
    Ok(matrix)
}

async fn fetch_one<S: CommitSource + 'static>(
    source: Arc<S>,
    repository: &RepositoryRef,
    window: TimeWindow,
    author: String,
    token: CancellationToken,
    timeout: Option<Duration>,
) -> Result<Vec<CommitEvent>> {
    let path = repository.path.clone();
    let blocking_token = token.clone();
    let task = spawn_blocking(move || source.fetch_commits(&path, &window, &author, &blocking_token));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                // The walk checks the token between commits and stops soon after.
                token.cancel();
                return Err(HoursError::FetchTimeout {
                    path: repository.path.clone(),
                });
            }
        },
        None => task.await,
    };
    joined.map_err(|e| HoursError::Task(e.to_string()))?
}

/// Pure assembly of per-repository commit lists into the result matrix.
///
/// Commits are split by local calendar date, each date is estimated on its
/// own, dates outside the window are ignored, and repositories without any
/// non-empty cell are dropped. The result depends only on the set of inputs.
pub fn build_matrix(
    window: &TimeWindow,
    author: &str,
    fetched: Vec<(String, Vec<CommitEvent>)>,
    config: &EstimationConfig,
) -> ResultMatrix {
    let mut repositories = BTreeMap::new();

    for (name, events) in fetched {
        let mut by_date: BTreeMap<_, Vec<CommitEvent>> = BTreeMap::new();
        for event in events.into_iter().filter(|e| window.contains_date(&e.date)) {
            by_date.entry(event.date).or_default().push(event);
        }

        let mut results = Vec::new();
        for (date, mut day) in by_date {
            day.sort_by_key(|event| event.timestamp);
            let raw_seconds = estimate(&day, config);
            if raw_seconds == 0 {
                continue;
            }
            let display_seconds = rounding::apply(raw_seconds, config);
            let messages: Vec<&str> = day.iter().map(|event| event.message.as_str()).collect();
            debug!(repository = %name, %date, commits = day.len(), raw_seconds, display_seconds, "estimated cell");

            results.push(RepositoryResult {
                repository_name: name.clone(),
                date,
                raw_seconds,
                display_seconds,
                summary_text: summarize(&messages, config.max_summary_words),
            });
        }

        if !results.is_empty() {
            repositories.insert(name, results);
        }
    }

    ResultMatrix {
        window: window.clone(),
        author: author.to_string(),
        repositories,
    }
}

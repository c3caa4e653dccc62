use super::aggregate::AggregateRequest;
use super::output::{output_json, output_ndjson, output_table, to_output};
use super::session::RequestTracker;
use crate::cache::{CachedSource, DayCache};
use crate::cli::CommonArgs;
use crate::config::{default_config_path, Settings};
use crate::error::HoursError;
use crate::git::{resolve_author, CommitSource, GitSource};
use crate::model::{ResultMatrix, TimeWindow, WindowKind};
use crate::util::{parse_date_arg, today};
use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Json,
    Ndjson,
    Table,
}

/// Settings file merged with command-line overrides.
fn resolve_settings(common: &CommonArgs) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(common.config.as_deref()).context("Failed to load settings")?;
    if let Some(root) = &common.root {
        settings.working_directory = Some(root.clone());
    }
    if let Some(author) = &common.author {
        settings.author = Some(author.clone());
    }
    if let Some(format) = common.format {
        settings.time_format = format;
    }
    if common.no_summary {
        settings.show_summary = false;
    }
    if common.no_cache {
        settings.cache = false;
    }
    Ok(settings)
}

fn working_directory(settings: &Settings) -> anyhow::Result<PathBuf> {
    match &settings.working_directory {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

fn build_window(kind: WindowKind, date: &str) -> anyhow::Result<TimeWindow> {
    let day = parse_date_arg(date, today())?;
    let window = match kind {
        WindowKind::Day => TimeWindow::day(day)?,
        WindowKind::Week => TimeWindow::week_of(day)?,
    };
    Ok(window)
}

fn run_aggregation(
    common: &CommonArgs,
    settings: &Settings,
    root: &Path,
    window: TimeWindow,
    progress: Option<ProgressBar>,
) -> anyhow::Result<ResultMatrix> {
    let mut request = AggregateRequest::new(
        root,
        resolve_author(settings.author.as_deref()),
        window,
        settings.estimation()?,
    );
    request.workers = settings.workers;
    request.fetch_timeout = Some(settings.fetch_timeout()?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let tracker = RequestTracker::new();
    let git = GitSource::new(settings.include_merges);

    let cache = if settings.cache {
        DayCache::new(common.cache.as_deref())
            .map_err(|e| warn!(error = %e, "commit cache unavailable, continuing without it"))
            .ok()
    } else {
        None
    };

    let matrix = match cache {
        Some(cache) => run_with(&runtime, &tracker, CachedSource::new(git, cache, today()), &request, progress),
        None => run_with(&runtime, &tracker, git, &request, progress),
    };
    matrix.map_err(|e| match e {
        HoursError::IdentityNotConfigured => anyhow::Error::new(e),
        other => anyhow::Error::new(other).context("Failed to aggregate working hours"),
    })
}

fn run_with<S: CommitSource + 'static>(
    runtime: &tokio::runtime::Runtime,
    tracker: &RequestTracker,
    source: S,
    request: &AggregateRequest,
    progress: Option<ProgressBar>,
) -> crate::error::Result<ResultMatrix> {
    runtime.block_on(tracker.run(Arc::new(source), request, progress))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Scanning repositories...");
    pb
}

pub fn exec(common: &CommonArgs, kind: WindowKind, date: &str, output: Output) -> anyhow::Result<()> {
    let settings = resolve_settings(common)?;
    let root = working_directory(&settings)?;
    let window = build_window(kind, date).context("Failed to resolve date window")?;

    // Progress goes to stderr and only for human output.
    let progress = (output == Output::Table).then(spinner);
    let matrix = run_aggregation(common, &settings, &root, window, progress.clone());
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let matrix = matrix?;

    let rendered = to_output(&matrix, &root, settings.time_format, settings.show_summary);
    match output {
        Output::Json => output_json(&rendered)?,
        Output::Ndjson => output_ndjson(&rendered)?,
        Output::Table => output_table(&rendered, settings.show_summary)?,
    }
    Ok(())
}

pub fn summary(common: &CommonArgs, folder: &Path, date: &str) -> anyhow::Result<()> {
    let settings = resolve_settings(common)?;
    let repository = working_directory(&settings)?.join(folder);
    if !repository.is_dir() {
        bail!("{} is not a directory", repository.display());
    }
    let window = build_window(WindowKind::Day, date).context("Failed to resolve date window")?;
    let day = window.dates[0];

    let matrix = run_aggregation(common, &settings, &repository, window, None)?;
    let name = repository
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match matrix.cell(&name, day) {
        Some(cell) if !cell.summary_text.is_empty() => println!("{}", cell.summary_text),
        _ => println!("No activity found for this day."),
    }
    Ok(())
}

pub fn config(common: &CommonArgs, init: bool) -> anyhow::Result<()> {
    if init {
        let path = match &common.config {
            Some(path) => path.clone(),
            None => default_config_path().context("No configuration directory available")?,
        };
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, Settings::default().to_toml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    let settings = resolve_settings(common)?;
    print!("{}", settings.to_toml()?);
    Ok(())
}

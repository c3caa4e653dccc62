use crate::error::{HoursError, Result};
use crate::git::CommitSource;
use crate::model::{CommitEvent, TimeWindow};
use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bumped whenever the tables change shape; older caches are rebuilt.
const CACHE_SCHEMA_VERSION: i64 = 2;

/// Identifies one cached fetch: the same repository and author fetched with
/// different source options (merges on or off) are separate entries.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey<'a> {
    pub repository: &'a str,
    pub author: &'a str,
    pub profile: &'a str,
}

/// Commit events of finished days, keyed by [`CacheKey`] and date.
pub struct DayCache {
    conn: Connection,
}

impl DayCache {
    /// Opens `<dir>/cache.db`, defaulting to the user cache directory.
    pub fn new<P: AsRef<Path>>(cache_dir: Option<P>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(path) => path.as_ref().to_path_buf(),
            None => default_cache_dir()?,
        };
        std::fs::create_dir_all(&cache_dir)?;
        let conn = Connection::open(cache_dir.join("cache.db"))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let mut cache = Self { conn };
        cache.initialize()?;
        Ok(cache)
    }

    fn initialize(&mut self) -> Result<()> {
        self.check_schema_version()?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS days (
                repository TEXT NOT NULL,
                author TEXT NOT NULL,
                profile TEXT NOT NULL,
                day TEXT NOT NULL,
                PRIMARY KEY (repository, author, profile, day)
            );
            CREATE TABLE IF NOT EXISTS commits (
                repository TEXT NOT NULL,
                author TEXT NOT NULL,
                profile TEXT NOT NULL,
                day TEXT NOT NULL,
                seq INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                author_name TEXT NOT NULL,
                message TEXT NOT NULL,
                PRIMARY KEY (repository, author, profile, day, seq)
            );
            ",
        )?;
        Ok(())
    }

    /// A cache written by another schema version only holds re-fetchable
    /// data, so it is dropped instead of rejected.
    fn check_schema_version(&mut self) -> Result<()> {
        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;

        if user_version != CACHE_SCHEMA_VERSION {
            if user_version != 0 {
                debug!(found = user_version, expected = CACHE_SCHEMA_VERSION, "rebuilding commit cache");
            }
            self.conn.execute_batch(&format!(
                "DROP TABLE IF EXISTS commits;
                 DROP TABLE IF EXISTS days;
                 PRAGMA user_version = {CACHE_SCHEMA_VERSION};"
            ))?;
        }

        Ok(())
    }

    /// Events stored for one day, or `None` if the day was never fetched.
    pub fn get_day(&self, key: CacheKey<'_>, day: NaiveDate) -> Result<Option<Vec<CommitEvent>>> {
        let day_key = day.to_string();
        let fetched: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM days
             WHERE repository = ? AND author = ? AND profile = ? AND day = ?)",
            params![key.repository, key.author, key.profile, day_key],
            |row| row.get(0),
        )?;
        if !fetched {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT timestamp, author_name, message FROM commits
             WHERE repository = ? AND author = ? AND profile = ? AND day = ?
             ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![key.repository, key.author, key.profile, day_key], |row| {
            let ts: i64 = row.get(0)?;
            let timestamp = Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    0,
                    "timestamp".to_string(),
                    rusqlite::types::Type::Integer,
                )
            })?;
            Ok(CommitEvent {
                timestamp,
                author: row.get(1)?,
                message: row.get(2)?,
                date: day,
            })
        })?;

        let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(events))
    }

    /// Records `days` as fetched, replacing whatever was stored for them.
    pub fn store_days(&mut self, key: CacheKey<'_>, days: &[NaiveDate], events: &[CommitEvent]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let mut insert_day_stmt = tx.prepare(
            "INSERT OR REPLACE INTO days (repository, author, profile, day) VALUES (?, ?, ?, ?)",
        )?;
        let mut delete_commits_stmt = tx.prepare(
            "DELETE FROM commits WHERE repository = ? AND author = ? AND profile = ? AND day = ?",
        )?;
        let mut insert_commit_stmt = tx.prepare(
            "INSERT INTO commits (repository, author, profile, day, seq, timestamp, author_name, message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;

        for day in days {
            let day_key = day.to_string();
            insert_day_stmt.execute(params![key.repository, key.author, key.profile, day_key])?;
            delete_commits_stmt.execute(params![key.repository, key.author, key.profile, day_key])?;

            for (seq, event) in events.iter().filter(|e| e.date == *day).enumerate() {
                insert_commit_stmt.execute(params![
                    key.repository,
                    key.author,
                    key.profile,
                    day_key,
                    seq as i64,
                    event.timestamp.timestamp(),
                    event.author,
                    event.message
                ])?;
            }
        }

        drop(insert_day_stmt);
        drop(delete_commits_stmt);
        drop(insert_commit_stmt);

        tx.commit()?;
        Ok(())
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("githours"))
        .ok_or_else(|| HoursError::Cache("No cache directory available on this platform".to_string()))
}

/// Read-through wrapper: serves a window from the cache when every day of it
/// is stored, otherwise fetches and stores the days that are already over.
pub struct CachedSource<S> {
    inner: S,
    cache: Mutex<DayCache>,
    today: NaiveDate,
}

impl<S: CommitSource> CachedSource<S> {
    pub fn new(inner: S, cache: DayCache, today: NaiveDate) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            today,
        }
    }

    fn lookup(&self, key: CacheKey<'_>, window: &TimeWindow) -> Result<Option<Vec<CommitEvent>>> {
        if window.dates.iter().any(|day| *day >= self.today) {
            return Ok(None);
        }
        let cache = self
            .cache
            .lock()
            .map_err(|_| HoursError::Cache("cache lock poisoned".to_string()))?;

        let mut by_day = BTreeMap::new();
        for day in &window.dates {
            match cache.get_day(key, *day)? {
                Some(events) => {
                    by_day.insert(*day, events);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(by_day.into_values().flatten().collect()))
    }

    fn remember(&self, key: CacheKey<'_>, window: &TimeWindow, events: &[CommitEvent]) -> Result<()> {
        let finished: Vec<NaiveDate> = window.dates.iter().copied().filter(|day| *day < self.today).collect();
        if finished.is_empty() {
            return Ok(());
        }
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| HoursError::Cache("cache lock poisoned".to_string()))?;
        cache.store_days(key, &finished, events)
    }
}

impl<S: CommitSource> CommitSource for CachedSource<S> {
    fn is_repository(&self, path: &Path) -> bool {
        self.inner.is_repository(path)
    }

    fn list_subdirectories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.inner.list_subdirectories(path)
    }

    fn fetch_profile(&self) -> String {
        self.inner.fetch_profile()
    }

    fn fetch_commits(
        &self,
        repository: &Path,
        window: &TimeWindow,
        author: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitEvent>> {
        let repository_key = repository.to_string_lossy().to_string();
        let profile = self.inner.fetch_profile();
        let key = CacheKey {
            repository: &repository_key,
            author,
            profile: &profile,
        };

        match self.lookup(key, window) {
            Ok(Some(events)) => {
                debug!(repository = %repository_key, "serving window from cache");
                return Ok(events);
            }
            Ok(None) => {}
            Err(e) => warn!(repository = %repository_key, error = %e, "cache lookup failed"),
        }

        let events = self.inner.fetch_commits(repository, window, author, cancel)?;
        if let Err(e) = self.remember(key, window, &events) {
            warn!(repository = %repository_key, error = %e, "failed to store commits in cache");
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn event(day: &str, ts: i64, message: &str) -> CommitEvent {
        CommitEvent {
            timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
            author: "Ada".to_string(),
            message: message.to_string(),
            date: date(day),
        }
    }

    fn key(author: &str) -> CacheKey<'_> {
        CacheKey {
            repository: "/r",
            author,
            profile: "",
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        events: Vec<CommitEvent>,
        include_merges: bool,
    }

    impl CountingSource {
        fn new(events: Vec<CommitEvent>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                events,
                include_merges: true,
            }
        }
    }

    impl CommitSource for CountingSource {
        fn is_repository(&self, _path: &Path) -> bool {
            true
        }

        fn list_subdirectories(&self, _path: &Path) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        fn fetch_profile(&self) -> String {
            format!("merges={}", self.include_merges)
        }

        fn fetch_commits(
            &self,
            _repository: &Path,
            _window: &TimeWindow,
            _author: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<CommitEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .events
                .iter()
                .filter(|e| self.include_merges || !e.message.starts_with("Merge"))
                .cloned()
                .collect())
        }
    }

    #[test]
    fn unknown_day_is_none_and_empty_day_is_cached() {
        let mut cache = DayCache::in_memory().unwrap();
        assert_eq!(cache.get_day(key("ada"), date("2024-03-05")).unwrap(), None);

        cache.store_days(key("ada"), &[date("2024-03-05")], &[]).unwrap();
        assert_eq!(cache.get_day(key("ada"), date("2024-03-05")).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn stores_events_per_day_in_order() {
        let mut cache = DayCache::in_memory().unwrap();
        let events = vec![
            event("2024-03-05", 1_709_629_200, "first"),
            event("2024-03-05", 1_709_631_000, "second"),
            event("2024-03-06", 1_709_715_600, "next day"),
        ];
        cache
            .store_days(key("ada"), &[date("2024-03-05"), date("2024-03-06")], &events)
            .unwrap();

        let day = cache.get_day(key("ada"), date("2024-03-05")).unwrap().unwrap();
        assert_eq!(day, events[..2].to_vec());
        assert_eq!(cache.get_day(key("bob"), date("2024-03-05")).unwrap(), None);
    }

    #[test]
    fn past_windows_are_fetched_once() {
        let source = CountingSource::new(vec![event("2024-03-05", 1_709_629_200, "work")]);
        let cached = CachedSource::new(source, DayCache::in_memory().unwrap(), date("2024-04-01"));
        let window = TimeWindow::day(date("2024-03-05")).unwrap();
        let token = CancellationToken::new();

        let first = cached.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();
        let second = cached.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn merge_filtering_gets_its_own_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let today = date("2025-01-01");
        let window = TimeWindow::day(date("2024-03-05")).unwrap();
        let token = CancellationToken::new();
        let events = vec![
            event("2024-03-05", 1_709_629_200, "Start feature"),
            event("2024-03-05", 1_709_630_000, "Merge branch 'feature'"),
            event("2024-03-05", 1_709_631_000, "Finish feature"),
        ];

        let with_merges = CachedSource::new(
            CountingSource::new(events.clone()),
            DayCache::new(Some(dir.path())).unwrap(),
            today,
        );
        let all = with_merges.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();
        assert_eq!(all.len(), 3);

        let mut source = CountingSource::new(events);
        source.include_merges = false;
        let without_merges = CachedSource::new(source, DayCache::new(Some(dir.path())).unwrap(), today);
        let filtered = without_merges.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(without_merges.inner.calls.load(Ordering::SeqCst), 1);

        let again = without_merges.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();
        assert_eq!(again, filtered);
        assert_eq!(without_merges.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn older_cache_schema_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("cache.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE days (repository TEXT, author TEXT, day TEXT);
             PRAGMA user_version = 1;",
        )
        .unwrap();
        drop(conn);

        let mut cache = DayCache::new(Some(dir.path())).unwrap();
        cache.store_days(key("ada"), &[date("2024-03-05")], &[]).unwrap();
        assert_eq!(cache.get_day(key("ada"), date("2024-03-05")).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn windows_touching_today_are_always_fetched() {
        let today = date("2024-03-06");
        let source = CountingSource::new(Vec::new());
        let cached = CachedSource::new(source, DayCache::in_memory().unwrap(), today);
        let window = TimeWindow::week_of(today).unwrap();
        let token = CancellationToken::new();

        cached.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();
        cached.fetch_commits(Path::new("/r"), &window, "ada", &token).unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}

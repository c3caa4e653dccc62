use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HoursError>;

#[derive(Error, Debug)]
pub enum HoursError {
    #[error("Git author is not configured. Set it with: git config --global user.name \"Your Name\"")]
    IdentityNotConfigured,
    #[error("Cannot read directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Request was cancelled")]
    Cancelled,
    #[error("Request was superseded by a newer one")]
    Superseded,
    #[error("Timed out fetching commits from {path}")]
    FetchTimeout { path: PathBuf },
    #[error("Commit in {path} has an out-of-range timestamp: {seconds}")]
    CommitTime { path: PathBuf, seconds: i64 },
    #[error("Worker task failed: {0}")]
    Task(String),
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
}

impl HoursError {
    /// Errors that abort a whole aggregation rather than a single repository.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            HoursError::IdentityNotConfigured
                | HoursError::InvalidWindow(_)
                | HoursError::InvalidConfig(_)
        )
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::open::Error> for HoursError {
    fn from(err: gix::open::Error) -> Self {
        HoursError::Git(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for HoursError {
    fn from(err: gix::object::commit::Error) -> Self {
        HoursError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for HoursError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        HoursError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for HoursError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        HoursError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for HoursError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        HoursError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for HoursError {
    fn from(err: gix::objs::decode::Error) -> Self {
        HoursError::ObjectDecode(Box::new(err))
    }
}

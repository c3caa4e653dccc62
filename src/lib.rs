pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hours;
pub mod model;
pub mod util;

pub use error::{HoursError, Result};
pub use model::{CommitEvent, EstimationConfig, RepositoryResult, ResultMatrix, TimeWindow};

//! Work-time estimation engine.
//!
//! Commit lists flow one way: [`estimate`] turns one repository-day into raw
//! seconds, [`rounding::apply`] turns those into display seconds, [`TimeFormat`]
//! renders them, and [`summarize`] condenses the day's messages. [`aggregate`]
//! drives all of it across repositories and dates.

pub mod aggregate;
pub mod estimator;
pub mod exec;
pub mod format;
pub mod output;
pub mod rounding;
pub mod session;
pub mod summary;

pub use aggregate::{aggregate, build_matrix, AggregateRequest};
pub use estimator::estimate;
pub use format::TimeFormat;
pub use session::{RequestTracker, Ticket};
pub use summary::summarize;

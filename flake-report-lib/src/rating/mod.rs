//! Build rating
//!
//! A build that fails hundreds of tests at once usually tells us that the CI
//! infrastructure had a bad day, not that hundreds of tests are flaky. Such
//! builds would drown the real flakiness signal, so they are scored against the
//! job's own recent history and excluded from the report when they are
//! outliers.
//!
//! # Implementation Model
//!
//! [`BuildRating`] holds the failure count of every build of a job in the
//! rating window, their mean and population standard deviation, and the
//! resulting z-score ("sigma") of each build. A build is excluded when the
//! absolute sigma exceeds the configured threshold.
//!
//! The model degrades instead of failing: with too little history or zero
//! variance it disables itself, every build scores zero and nothing is
//! excluded.

mod build_rating;
mod rating_settings;

pub use build_rating::{BuildData, BuildRating, ExclusionRecord};
pub use rating_settings::RatingSettings;

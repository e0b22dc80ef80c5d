#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for flake-report
//!
//! This library consolidates all functionality for the flake-report tool, which finds
//! flaky tests in the JUnit results of Jenkins builds.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`jenkins`]: Jenkins JSON API client
//! - [`junit`]: JUnit parsing and per-build merging
//! - [`rating`]: Statistical rating of builds by failure count
//! - [`fetch`]: Concurrent per-job fetch pipeline
//! - [`reports`]: Report generation in multiple formats

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod fetch;
#[cfg(not(any(debug_assertions, test)))]
mod fetch;

#[cfg(any(debug_assertions, test))]
pub mod jenkins;
#[cfg(not(any(debug_assertions, test)))]
mod jenkins;

#[cfg(any(debug_assertions, test))]
pub mod junit;
#[cfg(not(any(debug_assertions, test)))]
mod junit;

#[cfg(any(debug_assertions, test))]
pub mod rating;
#[cfg(not(any(debug_assertions, test)))]
mod rating;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};

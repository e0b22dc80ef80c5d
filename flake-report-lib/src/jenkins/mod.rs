//! Job server access
//!
//! The report pipeline only reads from the job server, through the
//! [`JobServer`] trait: list the jobs, list the completed builds of a job and
//! download build artifacts. [`JenkinsClient`] implements the trait against the
//! Jenkins JSON API.
//!
//! All requests of one client share a [`Throttler`], so the number of requests
//! in flight never exceeds the configured connection cap regardless of how
//! many job tasks are running. Requests time out but are never retried.

mod build;
mod client;
mod job_server;
mod throttler;

pub use build::{ArtifactRef, Build};
pub use client::{ClientSettings, JenkinsClient, encode_path_segment};
pub use job_server::JobServer;
pub use throttler::Throttler;

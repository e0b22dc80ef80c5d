//! JUnit test results
//!
//! A single build frequently produces several JUnit documents (sharded test
//! lanes, retried suites, partial dumps). This module parses those documents
//! and merges all documents of one build into a single [`MergedBuildResult`].
//!
//! # Implementation Model
//!
//! - [`parse`] turns the bytes of one artifact into a [`TestSuiteResult`].
//! - [`merge`] unions any number of [`TestSuiteResult`] values by test case
//!   name. A test case that was observed with different outcomes keeps all of
//!   them; the merge never picks a winner. Callers that need a single outcome
//!   use [`MergedBuildResult::effective_outcome`], where the worst outcome wins.
//!
//! Merging is commutative and associative, so the order in which artifacts were
//! downloaded has no influence on the result.

mod merge;
mod parser;
mod test_outcome;
mod test_suite;

pub use merge::{MergeConflict, MergedBuildResult, merge};
pub use parser::parse;
pub use test_outcome::TestOutcome;
pub use test_suite::{TestCase, TestSuiteResult};

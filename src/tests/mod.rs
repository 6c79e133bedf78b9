//! Cross-module test suites.

mod concurrency;
mod helpers;

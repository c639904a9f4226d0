//! Unit tests for the job queue.

mod domain_tests;

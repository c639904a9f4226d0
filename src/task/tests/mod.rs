//! Unit tests for scheduled tasks.

mod domain_tests;

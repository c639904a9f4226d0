//! Unit tests for the worker context.

mod cache_tests;

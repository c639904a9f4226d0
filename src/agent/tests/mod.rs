//! Unit tests for turn execution.

mod template_tests;

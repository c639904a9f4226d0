//! Unit tests for the recording channel adapter.

mod recording_tests;

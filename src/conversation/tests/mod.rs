//! Unit tests for the conversation context.

mod repository_tests;

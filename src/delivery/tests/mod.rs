//! Unit tests for the reply delivery protocol.

//! Integration tests for wbot-bot.
//!
//! These tests verify the interaction between components:
//! - Session lifecycle against a file-backed store
//! - Health aggregation through the remote status endpoint
//! - Application startup and shutdown

pub mod common;

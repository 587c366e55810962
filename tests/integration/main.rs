//! Integration tests for Skill-Harvester
//!
//! These tests run the full pipeline against wiremock servers standing in
//! for the vacancy API and its token endpoint, with statistics written to a
//! temporary SQLite database.

mod auth_tests;
mod common;
mod pipeline_tests;

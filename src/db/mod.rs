//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - Repository layer for deals, scenarios, audit entries and tax rates
//! - Seeding of jurisdiction tax rates from CSV

pub mod migrations;
pub mod repo;
pub mod seed;

pub use migrations::init_db;
pub use repo::Repository;
pub use seed::{load_tax_rates_csv, seed_tax_rates, SeedError};

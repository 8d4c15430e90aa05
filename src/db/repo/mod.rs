//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `deals.rs` - Deal records and workflow state
//! - `scenarios.rs` - Scenario bodies and the field audit log
//! - `tax_rates.rs` - Jurisdiction tax profiles

mod deals;
mod scenarios;
mod tax_rates;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(format!("encode json: {}", e)))
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_helpers_map_failures_to_sqlx_errors() {
        // JSON object keys must be strings
        let bad: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        assert!(matches!(to_json(&bad), Err(sqlx::Error::Protocol(_))));

        assert!(matches!(
            from_json::<Vec<u8>>("not json"),
            Err(sqlx::Error::Decode(_))
        ));
        assert_eq!(to_json(&vec![1u8, 2]).unwrap(), "[1,2]");
    }
}

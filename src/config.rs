use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// CSV of jurisdiction tax rates loaded at startup.
    pub tax_rates_csv: Option<String>,
    pub autosave_debounce_ms: u64,
    /// Lease tax rate used until a jurisdiction profile arrives.
    pub placeholder_tax_rate: Decimal,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let tax_rates_csv = env_map
            .get("TAX_RATES_CSV")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let autosave_debounce_ms = parse_positive_ms(&env_map, "AUTOSAVE_DEBOUNCE_MS", "1000")?;
        let request_timeout_ms = parse_positive_ms(&env_map, "DESK_REQUEST_TIMEOUT_MS", "10000")?;

        let placeholder_tax_rate = env_map
            .get("PLACEHOLDER_TAX_RATE")
            .map(|s| s.as_str())
            .unwrap_or("0.07")
            .parse::<Decimal>()
            .ok()
            .filter(|rate| !rate.is_negative() && *rate < Decimal::one())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PLACEHOLDER_TAX_RATE".to_string(),
                    "must be a decimal fraction in [0, 1)".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            tax_rates_csv,
            autosave_debounce_ms,
            placeholder_tax_rate,
            request_timeout_ms,
        })
    }
}

fn parse_positive_ms(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a positive integer".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.autosave_debounce_ms, 1000);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(
            config.placeholder_tax_rate,
            Decimal::from_str_canonical("0.07").unwrap()
        );
        assert_eq!(config.tax_rates_csv, None);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("AUTOSAVE_DEBOUNCE_MS".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "AUTOSAVE_DEBOUNCE_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_placeholder_rate() {
        for bad in ["abc", "-0.01", "1.5"] {
            let mut env_map = setup_required_env();
            env_map.insert("PLACEHOLDER_TAX_RATE".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PLACEHOLDER_TAX_RATE"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("AUTOSAVE_DEBOUNCE_MS".to_string(), "250".to_string());
        env_map.insert("TAX_RATES_CSV".to_string(), "rates.csv".to_string());
        env_map.insert("PLACEHOLDER_TAX_RATE".to_string(), "0.0825".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.autosave_debounce_ms, 250);
        assert_eq!(config.tax_rates_csv.as_deref(), Some("rates.csv"));
        assert_eq!(
            config.placeholder_tax_rate,
            Decimal::from_str_canonical("0.0825").unwrap()
        );
    }
}

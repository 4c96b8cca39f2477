/// Default request body limit: 32 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 << 20;

/// Binding settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Largest request body read before binding (default: 32 MiB).
    pub max_body_bytes: usize,

    /// Environment: development, production, test
    pub environment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            environment: "development".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables (with .env support).
    pub fn from_env() -> Self {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        Settings {
            max_body_bytes: std::env::var("CHOPIN_BIND_MAX_BODY_BYTES")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_body_bytes, 33_554_432);
        assert!(settings.is_dev());
    }

    #[test]
    fn test_production_is_not_dev() {
        let settings = Settings {
            environment: "production".to_string(),
            ..Settings::default()
        };
        assert!(!settings.is_dev());
    }
}

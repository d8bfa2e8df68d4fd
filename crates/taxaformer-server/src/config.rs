use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

/// Process configuration, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` disables the job cache entirely; the service still analyzes.
    pub database_url: Option<String>,
    pub use_database: bool,
    /// `None` selects the fixture worker.
    pub worker_url: Option<String>,
    pub worker_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let timeout_secs = std::env::var("TAXAFORMER_WORKER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_WORKER_TIMEOUT_SECS)
            .clamp(1, 3600);

        Self {
            port,
            database_url: non_empty(std::env::var("DATABASE_URL").ok()),
            use_database: parse_bool(
                std::env::var("TAXAFORMER_USE_DATABASE").ok().as_deref(),
                true,
            ),
            worker_url: non_empty(std::env::var("TAXAFORMER_WORKER_URL").ok()),
            worker_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        None => default,
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(Some(v), false));
        }
        for v in ["0", "false", "off", "nope"] {
            assert!(!parse_bool(Some(v), true));
        }
        assert!(parse_bool(None, true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn blank_urls_count_as_unset() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(
            non_empty(Some(" http://w ".to_string())),
            Some("http://w".to_string())
        );
        assert_eq!(non_empty(None), None);
    }
}

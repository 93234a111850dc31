use crate::RunMode;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    /// `live` applies recalculated prices to the catalog; `dryrun` logs and
    /// shadows them instead.
    pub mode: RunMode,

    // Reporting API
    pub api_port: u16,

    /// Run both jobs immediately on boot instead of waiting for the first
    /// scheduled tick.
    pub run_on_startup: bool,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let mode = match required_env("REPRICER_MODE").to_lowercase().as_str() {
            "live" => RunMode::Live,
            "dryrun" => RunMode::DryRun,
            other => panic!("ERROR: REPRICER_MODE must be 'live' or 'dryrun', got: '{other}'"),
        };

        Config {
            database_url: required_env("DATABASE_URL"),
            mode,
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            run_on_startup: optional_env("RUN_ON_STARTUP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

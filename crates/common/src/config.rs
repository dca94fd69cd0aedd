/// Process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Paper broker
    pub paper_equity: f64,
    pub paper_slippage_bps: f64,

    // Database
    pub database_url: String,

    // Strategy config file path
    pub strategy_config_path: String,

    /// Path of a JSON-lines tick file, or `-` for stdin.
    pub tick_source: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing or malformed variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            paper_equity: parsed_env("PAPER_EQUITY", 10_000.0),
            paper_slippage_bps: parsed_env("PAPER_SLIPPAGE_BPS", 0.0),
            database_url: required_env("DATABASE_URL"),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            tick_source: optional_env("TICK_SOURCE").unwrap_or_else(|| "-".to_string()),
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

fn parsed_env(key: &str, default: f64) -> f64 {
    match optional_env(key) {
        Some(raw) => {
            let value: f64 = raw
                .trim()
                .parse()
                .unwrap_or_else(|_| panic!("{key} must be a number, got: '{raw}'"));
            if !value.is_finite() || value < 0.0 {
                panic!("{key} must be a non-negative number, got: '{raw}'");
            }
            value
        }
        None => default,
    }
}

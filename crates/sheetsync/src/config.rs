use std::{env, str::FromStr, time::Duration};

use chrono::{Datelike, Utc};

/// Worksheet read when `SHEET_NAME` is not set.
pub const DEFAULT_SHEET_NAME: &str = "календарь new";

const DEFAULT_CORS_ORIGINS: [&str; 10] = [
    "http://localhost:8001",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:8000",
    "http://127.0.0.1:8000",
    "https://web.telegram.org",
    "https://t.me",
    "https://telegram.org",
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google spreadsheet id. `None` serves the built-in demo grid.
    pub spreadsheet_id: Option<String>,
    /// Worksheet (A1 range) to read (default: "календарь new")
    pub sheet_name: String,
    /// API key for the Sheets values endpoint.
    pub google_api_key: Option<String>,
    /// Sheets API base URL (default: "https://sheets.googleapis.com")
    pub sheets_base_url: String,
    /// Year of the first month block in the grid (default: current year)
    pub schedule_year: i32,
    /// Staleness threshold in seconds (default: 600)
    pub max_age_seconds: u64,
    /// Timeout for one fetch from the source in seconds (default: 15)
    pub fetch_timeout_seconds: u64,
    /// Maximum wait for a caller joining a refresh (default: fetch timeout)
    pub join_timeout_seconds: u64,
    /// Kick off a background refresh on start (default: true)
    pub eager_refresh: bool,
    /// Period of the warm-up refresh loop, 0 disables it (default: 0)
    pub refresh_interval_seconds: u64,
    /// Period of the notifier, 0 disables it (default: 300)
    pub notify_interval_seconds: u64,
    /// Telegram bot token. `None` sends notifications to the log.
    pub tg_token: Option<String>,
    /// Chats that receive notifications.
    pub admin_ids: Vec<i64>,
    /// Telegram Bot API base URL (default: "https://api.telegram.org")
    pub telegram_base_url: String,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Request timeout for the HTTP layer (default: join timeout + 5)
    pub http_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SPREADSHEET_ID`, `SHEET_NAME`, `GOOGLE_API_KEY`, `SHEETS_BASE_URL`
    /// - `SCHEDULE_YEAR`, `SCHEDULE_MAX_AGE_SECONDS`
    /// - `FETCH_TIMEOUT_SECONDS`, `JOIN_TIMEOUT_SECONDS`
    /// - `EAGER_REFRESH`, `REFRESH_INTERVAL_SECONDS`
    /// - `NOTIFY_INTERVAL_SECONDS`, `TG_TOKEN`, `ADMIN_IDS`, `TELEGRAM_BASE_URL`
    /// - `CORS_ORIGINS`, `HTTP_TIMEOUT_SECONDS`
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch_timeout_seconds = parsed(&lookup, "FETCH_TIMEOUT_SECONDS", 15);
        let join_timeout_seconds =
            parsed(&lookup, "JOIN_TIMEOUT_SECONDS", fetch_timeout_seconds);

        Self {
            spreadsheet_id: non_empty("SPREADSHEET_ID"),
            sheet_name: non_empty("SHEET_NAME").unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            google_api_key: non_empty("GOOGLE_API_KEY"),
            sheets_base_url: non_empty("SHEETS_BASE_URL")
                .unwrap_or_else(|| "https://sheets.googleapis.com".to_string()),
            schedule_year: parsed(&lookup, "SCHEDULE_YEAR", Utc::now().year()),
            max_age_seconds: parsed(&lookup, "SCHEDULE_MAX_AGE_SECONDS", 600),
            fetch_timeout_seconds,
            join_timeout_seconds,
            eager_refresh: lookup("EAGER_REFRESH")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            refresh_interval_seconds: parsed(&lookup, "REFRESH_INTERVAL_SECONDS", 0),
            notify_interval_seconds: parsed(&lookup, "NOTIFY_INTERVAL_SECONDS", 300),
            tg_token: non_empty("TG_TOKEN"),
            admin_ids: lookup("ADMIN_IDS")
                .map(|v| split_list(&v).filter_map(|id| id.parse().ok()).collect())
                .unwrap_or_default(),
            telegram_base_url: non_empty("TELEGRAM_BASE_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            cors_origins: non_empty("CORS_ORIGINS")
                .map(|v| split_list(&v).map(str::to_string).collect())
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.map(str::to_string).to_vec()),
            http_timeout_seconds: parsed(
                &lookup,
                "HTTP_TIMEOUT_SECONDS",
                join_timeout_seconds.saturating_add(5),
            ),
        }
    }

    /// Get the staleness threshold as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Warm-up refresh period, `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0)
            .then(|| Duration::from_secs(self.refresh_interval_seconds))
    }

    /// Notifier period, `None` when disabled.
    pub fn notify_interval(&self) -> Option<Duration> {
        (self.notify_interval_seconds > 0).then(|| Duration::from_secs(self.notify_interval_seconds))
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

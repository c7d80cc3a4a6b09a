use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{cursor::CursorStart, errors::Error, Result};

/// How candidate messages reach the relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayMode {
    /// Fetch since the cursor every interval.
    #[default]
    Poll,
    /// Backend pushes each new message as it arrives.
    Events,
}

impl RelayMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "poll" | "polling" => Some(Self::Poll),
            "events" | "event" | "push" => Some(Self::Events),
            _ => None,
        }
    }
}

/// Typed process configuration. Loaded once at startup, immutable afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub telegram_bot_token: String,
    pub backend_timeout: Duration,

    // Scheduling
    pub mode: RelayMode,
    pub poll_interval: Duration,
    pub page_limit: usize,
    pub error_cooldown: Duration,
    pub cursor_start: CursorStart,

    // Liveness keeper
    pub liveness_enabled: bool,
    pub liveness_interval: Duration,

    // Startup
    pub startup_summary: bool,

    // Health endpoint
    pub health_enabled: bool,
    pub health_port: u16,

    // Routing
    pub routes_file: PathBuf,
    pub routes: RoutesConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let mode = match env_str("RELAY_MODE") {
            Some(v) => RelayMode::parse(&v)
                .ok_or_else(|| Error::Config(format!("invalid RELAY_MODE: {v}")))?,
            None => RelayMode::default(),
        };
        let cursor_start = match env_str("CURSOR_START") {
            Some(v) => CursorStart::parse(&v)
                .ok_or_else(|| Error::Config(format!("invalid CURSOR_START: {v}")))?,
            None => CursorStart::default(),
        };

        let interval_minutes = env_u64("INTERVAL_MINUTES").unwrap_or(7).max(1);
        let page_limit = env_usize("LAST_MESSAGES_LIMIT").unwrap_or(20).clamp(1, 100);
        let error_cooldown = secs_at_least_one(env_u64("ERROR_COOLDOWN_SECS"), 60);
        let backend_timeout = secs_at_least_one(env_u64("BACKEND_TIMEOUT_SECS"), 30);

        let liveness_enabled = env_bool("LIVENESS_ENABLED").unwrap_or(false);
        let liveness_interval =
            Duration::from_secs(env_u64("LIVENESS_INTERVAL_MINUTES").unwrap_or(30).max(1) * 60);

        let startup_summary = env_bool("STARTUP_SUMMARY").unwrap_or(true);
        let health_enabled = env_bool("HEALTH_ENABLED").unwrap_or(true);
        let health_port = env_str("HEALTH_PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(8000);

        let routes_file =
            PathBuf::from(env_str("ROUTES_FILE").unwrap_or_else(|| "routes.json".to_string()));
        let routes = RoutesConfig::from_file(&routes_file)?;

        Ok(Self {
            telegram_bot_token,
            backend_timeout,
            mode,
            poll_interval: Duration::from_secs(interval_minutes * 60),
            page_limit,
            error_cooldown,
            cursor_start,
            liveness_enabled,
            liveness_interval,
            startup_summary,
            health_enabled,
            health_port,
            routes_file,
            routes,
        })
    }

    pub fn interval_minutes(&self) -> u64 {
        (self.poll_interval.as_secs() / 60).max(1)
    }
}

// ============== Routing file ==============

/// `destinationName -> {destination, sources: {sourceName -> {source, keywords}}}`.
///
/// Names are map keys, so iteration order is alphabetical and stable across runs.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoutesConfig {
    #[serde(alias = "DESTINATIONS")]
    pub destinations: BTreeMap<String, DestinationConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DestinationConfig {
    #[serde(alias = "DESTINATION")]
    pub destination: i64,
    #[serde(alias = "SOURCES", default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(alias = "SOURCE")]
    pub source: i64,
    #[serde(alias = "KEYWORDS", default)]
    pub keywords: Vec<String>,
}

impl RoutesConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read routes file {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let routes: RoutesConfig = serde_json::from_str(raw)?;
        routes.validate()?;
        Ok(routes)
    }

    fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(Error::Config("routes: no destinations configured".to_string()));
        }
        for (dest_name, dest) in &self.destinations {
            for (source_name, source) in &dest.sources {
                if let Some(idx) = source.keywords.iter().position(|k| k.trim().is_empty()) {
                    return Err(Error::Config(format!(
                        "routes: {dest_name}/{source_name} keyword #{idx} is blank"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============== Env helpers ==============

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

/// Durations read in seconds are never zero.
fn secs_at_least_one(raw: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(raw.unwrap_or(default).max(1))
}

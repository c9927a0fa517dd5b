use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use parkbook_catalog::{CatalogClientConfig, RetryPolicy};
use parkbook_contracts::MAX_PAGE_LIMIT;

const DEFAULT_NPS_BASE_URL: &str = "https://developer.nps.gov/api/v1";

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub db_url: String,
    pub nps_api_key: String,
    pub nps_base_url: String,
    pub nps_page_limit: u64,
    pub nps_page_timeout_ms: u64,
    pub nps_walk_timeout_ms: u64,
    pub nps_retry_max_attempts: u32,
    pub nps_retry_base_backoff_ms: u64,
    pub store_timeout_ms: u64,
    pub secret_hash_rounds: u32,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_url", &"<redacted>")
            .field("nps_api_key", &"<redacted>")
            .field("nps_base_url", &self.nps_base_url)
            .field("nps_page_limit", &self.nps_page_limit)
            .field("nps_page_timeout_ms", &self.nps_page_timeout_ms)
            .field("nps_walk_timeout_ms", &self.nps_walk_timeout_ms)
            .field("nps_retry_max_attempts", &self.nps_retry_max_attempts)
            .field("nps_retry_base_backoff_ms", &self.nps_retry_base_backoff_ms)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("secret_hash_rounds", &self.secret_hash_rounds)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl ApiConfig {
    /// Reads `PARKBOOK_CONFIG_PATH` (if set) and overlays the process
    /// environment on top of it.
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("PARKBOOK_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("PARKBOOK_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "PARKBOOK_BIND_ADDR",
        )?;

        let db_url = require_nonempty(kv, "PARKBOOK_DB_URL")?;
        let nps_api_key = require_nonempty(kv, "PARKBOOK_NPS_API_KEY")?;

        let nps_base_url = kv
            .get("PARKBOOK_NPS_BASE_URL")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_NPS_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        if !nps_base_url.starts_with("http://") && !nps_base_url.starts_with("https://") {
            return Err(invalid("PARKBOOK_NPS_BASE_URL must be an http(s) URL"));
        }

        let nps_page_limit = parse_u64(
            kv.get("PARKBOOK_NPS_PAGE_LIMIT"),
            MAX_PAGE_LIMIT,
            "PARKBOOK_NPS_PAGE_LIMIT",
        )?;
        if !(1..=MAX_PAGE_LIMIT).contains(&nps_page_limit) {
            return Err(invalid(format!(
                "PARKBOOK_NPS_PAGE_LIMIT must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        let nps_page_timeout_ms = parse_u64(
            kv.get("PARKBOOK_NPS_PAGE_TIMEOUT_MS"),
            5000,
            "PARKBOOK_NPS_PAGE_TIMEOUT_MS",
        )?;
        let nps_walk_timeout_ms = parse_u64(
            kv.get("PARKBOOK_NPS_WALK_TIMEOUT_MS"),
            60_000,
            "PARKBOOK_NPS_WALK_TIMEOUT_MS",
        )?;
        if nps_page_timeout_ms == 0 || nps_walk_timeout_ms == 0 {
            return Err(invalid("NPS timeouts must be >= 1ms"));
        }

        let nps_retry_max_attempts = parse_u32(
            kv.get("PARKBOOK_NPS_RETRY_MAX_ATTEMPTS"),
            2,
            "PARKBOOK_NPS_RETRY_MAX_ATTEMPTS",
        )?;
        if nps_retry_max_attempts > 10 {
            return Err(invalid("PARKBOOK_NPS_RETRY_MAX_ATTEMPTS must be <= 10"));
        }
        let nps_retry_base_backoff_ms = parse_u64(
            kv.get("PARKBOOK_NPS_RETRY_BASE_BACKOFF_MS"),
            100,
            "PARKBOOK_NPS_RETRY_BASE_BACKOFF_MS",
        )?;

        let store_timeout_ms = parse_u64(
            kv.get("PARKBOOK_STORE_TIMEOUT_MS"),
            2000,
            "PARKBOOK_STORE_TIMEOUT_MS",
        )?;

        let secret_hash_rounds = parse_u32(
            kv.get("PARKBOOK_SECRET_HASH_ROUNDS"),
            10_000,
            "PARKBOOK_SECRET_HASH_ROUNDS",
        )?;
        if secret_hash_rounds == 0 {
            return Err(invalid("PARKBOOK_SECRET_HASH_ROUNDS must be >= 1"));
        }

        Ok(Self {
            bind_addr,
            db_url,
            nps_api_key,
            nps_base_url,
            nps_page_limit,
            nps_page_timeout_ms,
            nps_walk_timeout_ms,
            nps_retry_max_attempts,
            nps_retry_base_backoff_ms,
            store_timeout_ms,
            secret_hash_rounds,
        })
    }

    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        CatalogClientConfig {
            base_url: self.nps_base_url.clone(),
            api_key: self.nps_api_key.clone(),
            page_limit: self.nps_page_limit,
            page_timeout: Duration::from_millis(self.nps_page_timeout_ms),
            walk_timeout: Duration::from_millis(self.nps_walk_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.nps_retry_max_attempts,
            Duration::from_millis(self.nps_retry_base_backoff_ms),
        )
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn invalid(message: impl Into<String>) -> StartupError {
    StartupError {
        code: "ERR_INVALID_CONFIG",
        message: message.into(),
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;
    parse_env_lines(&contents)
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
            });
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    kv.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StartupError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        })
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<SocketAddr>()
            .map_err(|_| invalid(format!("{} must be a valid host:port socket address", key))),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| invalid(format!("{} must be an integer", key))),
    }
}

fn parse_u32(value: Option<&String>, default: u32, key: &'static str) -> Result<u32, StartupError> {
    match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| invalid(format!("{} must be an integer", key))),
    }
}

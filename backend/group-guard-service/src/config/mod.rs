use crate::error::{GuardError, Result};
use crate::models::{UserId, ViolationKind, DEFAULT_WARNING_THRESHOLD};
use crate::policy::DEFAULT_MAX_MENTIONS;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptBackend {
    Memory,
    Redis,
}

impl FromStr for AttemptBackend {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(AttemptBackend::Memory),
            "redis" => Ok(AttemptBackend::Redis),
            other => Err(GuardError::Config(format!(
                "ATTEMPT_BACKEND must be memory or redis, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub health_port: u16,

    // Database configuration
    pub database_url: String,
    pub db_max_connections: u32,

    // Event stream and attempt counters
    pub redis_url: String,
    pub event_stream_key: String,
    pub attempt_backend: AttemptBackend,
    pub attempt_ttl_secs: u64,

    // Messaging bridge
    pub gateway_base_url: String,
    pub gateway_token: Option<String>,
    pub gateway_timeout: Duration,
    pub remediation_delay: Duration,

    // Identities
    pub bot_id: UserId,
    pub bot_owner_id: Option<UserId>,

    // Default policy
    pub default_warning_threshold: u32,
    pub kind_warning_thresholds: Vec<(ViolationKind, u32)>,
    pub max_mentions: usize,
    pub enabled_violations: Vec<ViolationKind>,

    // Service configuration
    pub service_name: String,
    pub environment: String,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| GuardError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GuardError::Config(format!("{} must be set", key)))
}

fn parse_violations(raw: &str) -> Result<Vec<ViolationKind>> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(ViolationKind::ALL.to_vec());
    }

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ViolationKind>().map_err(GuardError::Config))
        .collect()
}

/// `virtex=2,link=6`
fn parse_kind_thresholds(raw: &str) -> Result<Vec<(ViolationKind, u32)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (kind, threshold) = pair.split_once('=').ok_or_else(|| {
                GuardError::Config(format!("KIND_WARNING_THRESHOLDS entry {} is not kind=n", pair))
            })?;
            let kind = kind.parse::<ViolationKind>().map_err(GuardError::Config)?;
            let threshold = threshold.trim().parse::<u32>().map_err(|_| {
                GuardError::Config(format!("KIND_WARNING_THRESHOLDS has an invalid value: {}", pair))
            })?;
            Ok((kind, threshold))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let enabled_violations = match env::var("ENABLED_VIOLATIONS") {
            Ok(raw) => parse_violations(&raw)?,
            Err(_) => ViolationKind::ALL.to_vec(),
        };

        let kind_warning_thresholds = match env::var("KIND_WARNING_THRESHOLDS") {
            Ok(raw) => parse_kind_thresholds(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            health_port: parse_or("HEALTH_PORT", 8090)?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 20)?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            event_stream_key: env::var("EVENT_STREAM_KEY")
                .unwrap_or_else(|_| "group-guard:events".to_string()),
            attempt_backend: parse_or("ATTEMPT_BACKEND", AttemptBackend::Memory)?,
            attempt_ttl_secs: parse_or("ATTEMPT_TTL_SECS", 86_400)?,
            gateway_base_url: required("GATEWAY_BASE_URL")?,
            gateway_token: env::var("GATEWAY_TOKEN").ok().filter(|t| !t.is_empty()),
            gateway_timeout: Duration::from_millis(parse_or("GATEWAY_TIMEOUT_MS", 10_000)?),
            remediation_delay: Duration::from_millis(parse_or("REMEDIATION_DELAY_MS", 1_000)?),
            bot_id: UserId::new(required("BOT_ID")?),
            bot_owner_id: UserId::parse_optional(env::var("BOT_OWNER_ID").ok().as_deref()),
            default_warning_threshold: parse_or(
                "DEFAULT_WARNING_THRESHOLD",
                DEFAULT_WARNING_THRESHOLD,
            )?,
            kind_warning_thresholds,
            max_mentions: parse_or("MAX_MENTIONS", DEFAULT_MAX_MENTIONS)?,
            enabled_violations,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "group-guard-service".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }
}

// Application configuration
// Everything comes from the environment; unset values take defaults

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FALLBACK_IMAGE: &str = "node:20-alpine";
pub const DEFAULT_NODE_BINARY: &str = "node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Fresh container per case, OS-enforced limits
    Docker,
    /// Local `node` subprocess, development only
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSettings {
    pub kind: FallbackKind,
    pub image: String,
    pub node_binary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub redis_url: String,
    pub bind_addr: String,
    pub languages_path: PathBuf,
    /// `None` when JUDGE0_URL is unset: every request goes to the fallback
    pub remote: Option<RemoteSettings>,
    pub fallback: FallbackSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let remote = get("JUDGE0_URL").map(|base_url| RemoteSettings {
            base_url,
            api_key: get("JUDGE0_API_KEY"),
            api_host: get("JUDGE0_API_HOST"),
            poll_attempts: parse_or(get("JUDGE0_POLL_ATTEMPTS"), "JUDGE0_POLL_ATTEMPTS", DEFAULT_POLL_ATTEMPTS),
            poll_interval_ms: parse_or(
                get("JUDGE0_POLL_INTERVAL_MS"),
                "JUDGE0_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            ),
        });

        let kind = match get("FALLBACK_RUNTIME").map(|v| v.to_lowercase()) {
            None => FallbackKind::Docker,
            Some(v) if v == "docker" => FallbackKind::Docker,
            Some(v) if v == "process" => FallbackKind::Process,
            Some(other) => {
                warn!(value = %other, "Unknown FALLBACK_RUNTIME, using docker");
                FallbackKind::Docker
            }
        };

        Self {
            redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            languages_path: PathBuf::from(
                get("LANGUAGES_PATH").unwrap_or_else(|| DEFAULT_LANGUAGES_PATH.to_string()),
            ),
            remote,
            fallback: FallbackSettings {
                kind,
                image: get("FALLBACK_IMAGE").unwrap_or_else(|| DEFAULT_FALLBACK_IMAGE.to_string()),
                node_binary: get("NODE_BINARY").unwrap_or_else(|| DEFAULT_NODE_BINARY.to_string()),
            },
        }
    }
}

fn parse_or<T: FromStr + Copy>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid numeric setting, using default");
            default
        }),
        None => default,
    }
}
